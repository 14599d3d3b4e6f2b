// ABOUTME: One-shot commands inside a service's running container.
// ABOUTME: Used to signal the reverse proxy; a non-zero exit is surfaced with its stderr.

use super::shared_types::{ExecConfig, ExecResult};
use crate::types::ContainerId;
use async_trait::async_trait;

#[async_trait]
pub trait ExecOps: Send + Sync {
    /// Run `config` attached and collect its output and exit code.
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError>;

    /// Like [`exec`](Self::exec), but a non-zero exit is an error.
    async fn exec_checked(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        let result = self.exec(container, config).await?;
        if result.success() {
            return Ok(result);
        }
        Err(ExecError::NonZeroExit {
            command: config.cmd.join(" "),
            code: result.exit_code,
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// The task was replaced between resolution and exec.
    #[error("container not running: {0}")]
    ContainerNotRunning(String),

    #[error("{command} exited with {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i64,
        stderr: String,
    },

    #[error("exec stream broke: {0}")]
    Stream(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
