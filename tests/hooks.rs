// ABOUTME: Integration tests for pre-deploy scripts.
// ABOUTME: Scripts run through sh and can rewrite, reject or break the service update.

mod support;

use caravel::deploy::{DeployError, DeploymentCoordinator};
use caravel::hooks::{HookError, PreDeployTransform, ScriptTransform};
use caravel::model::AppDefinition;
use caravel::types::{AppName, ImageRef, Namespace};
use std::sync::Arc;
use std::time::Duration;
use support::FakeEngine;

fn app_with_script(script: &str) -> AppDefinition {
    let mut app = AppDefinition::new(AppName::new("demo").unwrap(), false);
    app.pre_deploy_script = Some(script.to_string());
    app
}

fn coordinator(engine: &Arc<FakeEngine>) -> DeploymentCoordinator<FakeEngine> {
    DeploymentCoordinator::new(
        Arc::clone(engine),
        Namespace::new("captain").unwrap(),
        Arc::new(ScriptTransform::new("sh")),
        None,
        Duration::from_millis(10),
    )
}

const REWRITE_IMAGE: &str = r#"cat > /dev/null
cat <<'EOF'
{"name": "srv-captain--demo", "image": "registry.example.com/override:7", "env": ["FROM_HOOK=1"]}
EOF
"#;

#[tokio::test]
async fn script_output_replaces_the_update() {
    support::init_tracing();
    let engine = Arc::new(FakeEngine::new());

    let reconciled = coordinator(&engine)
        .reconcile(
            &app_with_script(REWRITE_IMAGE),
            &ImageRef::local("img-captain--demo", "0"),
        )
        .await
        .unwrap();

    assert_eq!(reconciled.spec.image, "registry.example.com/override:7");
    assert_eq!(reconciled.spec.env, vec!["FROM_HOOK=1"]);
    let state = engine.state.lock();
    assert_eq!(state.updates.len(), 1);
    assert_eq!(state.updates[0].image, "registry.example.com/override:7");
}

#[tokio::test]
async fn script_sees_app_and_service_name() {
    let engine = Arc::new(FakeEngine::new());
    let script = r#"input=$(cat)
case "$input" in
  *'"draft"'*) ;;
  *) echo "no draft in input" >&2; exit 1 ;;
esac
printf '{"name": "%s", "image": "%s-checked"}' "$CARAVEL_SERVICE" "$CARAVEL_APP"
"#;

    let reconciled = coordinator(&engine)
        .reconcile(
            &app_with_script(script),
            &ImageRef::local("img-captain--demo", "0"),
        )
        .await
        .unwrap();

    assert_eq!(reconciled.spec.name, "srv-captain--demo");
    assert_eq!(reconciled.spec.image, "demo-checked");
}

#[tokio::test]
async fn failing_script_aborts_before_update() {
    let engine = Arc::new(FakeEngine::new());

    let err = coordinator(&engine)
        .reconcile(
            &app_with_script("cat > /dev/null\necho 'refusing to deploy' >&2\nexit 3\n"),
            &ImageRef::local("img-captain--demo", "0"),
        )
        .await
        .unwrap_err();

    match err {
        DeployError::Hook(HookError::Failed { code, stderr }) => {
            assert_eq!(code, Some(3));
            assert_eq!(stderr, "refusing to deploy");
        }
        other => panic!("expected hook failure, got {:?}", other),
    }
    assert!(engine.state.lock().updates.is_empty());
}

#[tokio::test]
async fn renaming_the_service_is_rejected() {
    let script = r#"cat > /dev/null
echo '{"name": "srv-captain--other", "image": "nginx"}'
"#;
    let app = app_with_script(script);
    let draft = caravel::engine::ServiceSpec {
        name: "srv-captain--demo".into(),
        image: "img-captain--demo:0".into(),
        ..Default::default()
    };

    let err = ScriptTransform::new("sh")
        .transform(&app, draft)
        .await
        .unwrap_err();

    assert!(matches!(err, HookError::InvalidOutput(msg) if msg.contains("service name changed")));
}

#[tokio::test]
async fn non_json_output_is_rejected() {
    let app = app_with_script("cat > /dev/null\necho 'not json'\n");
    let draft = caravel::engine::ServiceSpec {
        name: "srv-captain--demo".into(),
        image: "img-captain--demo:0".into(),
        ..Default::default()
    };

    let err = ScriptTransform::new("sh")
        .transform(&app, draft)
        .await
        .unwrap_err();
    assert!(matches!(err, HookError::InvalidOutput(_)));
}
