// ABOUTME: Error types for service reconciliation.
// ABOUTME: Covers invalid definitions, mode conflicts, engine and hook failures.

use crate::engine::{SecretError, ServiceError};
use crate::hooks::HookError;
use crate::model::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Replica counts only apply to replicated services.
    #[error("service {0} is not in replicated mode and cannot be scaled")]
    NotReplicated(String),

    #[error("service operation failed: {0}")]
    Service(#[from] ServiceError),

    #[error("secret operation failed: {0}")]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Hook(#[from] HookError),
}
