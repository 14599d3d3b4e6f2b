// ABOUTME: App lifecycle and status commands.
// ABOUTME: register, remove, reload and status against a bootstrapped platform.

use serde::Serialize;

use caravel::Platform;
use caravel::build::BuildStatus;
use caravel::engine::BollardEngine;
use caravel::error::Result;
use caravel::output::Output;
use caravel::types::AppName;

pub async fn register(
    platform: &Platform<BollardEngine>,
    app: &AppName,
    persistent: bool,
    output: Output,
) -> Result<()> {
    platform.register_app(app, persistent).await?;
    output.success(&format!("Registered {}", app));
    Ok(())
}

pub async fn remove(platform: &Platform<BollardEngine>, app: &AppName, output: Output) -> Result<()> {
    platform.remove_app(app).await?;
    output.success(&format!("Removed {}", app));
    Ok(())
}

pub async fn reload(platform: &Platform<BollardEngine>, mut output: Output) -> Result<()> {
    output.start_timer();
    platform.reload_load_balancer().await?;
    output.success("Proxy config regenerated");
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppStatus {
    app: String,
    deployed_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployed_git_hash: Option<String>,
    versions: usize,
    #[serde(flatten)]
    build: BuildStatus,
}

pub async fn status(platform: &Platform<BollardEngine>, app: &AppName, output: Output) -> Result<()> {
    let definition = platform.get_app(app).await?;
    output.value(&AppStatus {
        app: app.to_string(),
        deployed_version: definition.deployed_version,
        deployed_git_hash: definition.deployed().and_then(|v| v.git_hash.clone()),
        versions: definition.versions.len(),
        build: platform.get_build_status(app),
    });
    Ok(())
}
