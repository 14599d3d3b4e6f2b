// ABOUTME: Secret operations trait for the container engine.
// ABOUTME: Look up and create orchestrator secrets by name.

use crate::types::SecretId;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait SecretOps: Send + Sync {
    /// Id of the secret with exactly this name, if present.
    async fn find_secret(&self, name: &str) -> Result<Option<SecretId>, SecretError>;

    /// Create a secret holding `data`.
    async fn create_secret(
        &self,
        name: &str,
        data: &[u8],
        labels: &HashMap<String, String>,
    ) -> Result<SecretId, SecretError>;

    /// Find the named secret, creating it if absent.
    async fn ensure_secret(
        &self,
        name: &str,
        data: &[u8],
        labels: &HashMap<String, String>,
    ) -> Result<SecretId, SecretError> {
        if let Some(id) = self.find_secret(name).await? {
            return Ok(id);
        }
        match self.create_secret(name, data, labels).await {
            Err(SecretError::AlreadyExists(_)) => self
                .find_secret(name)
                .await?
                .ok_or_else(|| SecretError::NotFound(name.to_string())),
            other => other,
        }
    }
}

/// Errors from secret operations.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("secret already exists: {0}")]
    AlreadyExists(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
