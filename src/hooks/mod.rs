// ABOUTME: Pre-deploy transform hook for service update payloads.
// ABOUTME: Runs an app's script with the draft as JSON on stdin and reads the new draft from stdout.

use async_trait::async_trait;
use serde::Serialize;
use std::io::Write;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::engine::ServiceSpec;
use crate::model::AppDefinition;

/// Errors from running a pre-deploy transform.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to run pre-deploy script: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("pre-deploy script exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("pre-deploy script returned an invalid payload: {0}")]
    InvalidOutput(String),
}

/// Last chance to change a service update before it is submitted.
#[async_trait]
pub trait PreDeployTransform: Send + Sync {
    async fn transform(
        &self,
        app: &AppDefinition,
        draft: ServiceSpec,
    ) -> Result<ServiceSpec, HookError>;
}

/// Leaves every draft as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransform;

#[async_trait]
impl PreDeployTransform for NoTransform {
    async fn transform(
        &self,
        _app: &AppDefinition,
        draft: ServiceSpec,
    ) -> Result<ServiceSpec, HookError> {
        Ok(draft)
    }
}

#[derive(Serialize)]
struct HookInput<'a> {
    app: &'a AppDefinition,
    draft: &'a ServiceSpec,
}

/// Runs the app's `pre_deploy_script` through an interpreter.
///
/// The script receives `{"app": ..., "draft": ...}` on stdin and must print
/// the (possibly modified) draft as JSON on stdout. Apps without a script
/// pass through unchanged.
#[derive(Debug, Clone)]
pub struct ScriptTransform {
    interpreter: String,
}

impl ScriptTransform {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

#[async_trait]
impl PreDeployTransform for ScriptTransform {
    async fn transform(
        &self,
        app: &AppDefinition,
        draft: ServiceSpec,
    ) -> Result<ServiceSpec, HookError> {
        let Some(script) = app.pre_deploy_script.as_deref() else {
            return Ok(draft);
        };

        let mut file = tempfile::Builder::new()
            .prefix("caravel-pre-deploy-")
            .tempfile()?;
        file.write_all(script.as_bytes())?;
        file.flush()?;

        let input = serde_json::to_vec(&HookInput { app, draft: &draft })
            .map_err(|e| HookError::InvalidOutput(e.to_string()))?;

        tracing::info!(app = %app.name, "running pre-deploy script");

        let mut child = Command::new(&self.interpreter)
            .arg(file.path())
            .env("CARAVEL_APP", app.name.as_str())
            .env("CARAVEL_SERVICE", &draft.name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A script that ignores its input may exit before reading it.
            if let Err(e) = stdin.write_all(&input).await
                && e.kind() != std::io::ErrorKind::BrokenPipe
            {
                return Err(e.into());
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(
                app = %app.name,
                "pre-deploy script failed with exit code {:?}",
                output.status.code()
            );
            return Err(HookError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        let transformed: ServiceSpec = serde_json::from_slice(&output.stdout)
            .map_err(|e| HookError::InvalidOutput(e.to_string()))?;
        if transformed.name != draft.name {
            return Err(HookError::InvalidOutput(format!(
                "service name changed from {} to {}",
                draft.name, transformed.name
            )));
        }

        Ok(transformed)
    }
}
