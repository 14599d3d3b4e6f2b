// ABOUTME: Network operations trait for the container engine.
// ABOUTME: Check for and create overlay networks.

use super::shared_types::NetworkConfig;
use crate::types::NetworkId;
use async_trait::async_trait;

#[async_trait]
pub trait NetworkOps: Send + Sync {
    /// Create a network.
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError>;

    /// Check if a network exists.
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError>;

    /// Create the network unless it already exists.
    async fn ensure_network(&self, config: &NetworkConfig) -> Result<(), NetworkError> {
        if self.network_exists(&config.name).await? {
            return Ok(());
        }
        match self.create_network(config).await {
            // Created between the check and the create.
            Ok(_) | Err(NetworkError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Errors from network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network not found: {0}")]
    NotFound(String),

    #[error("network already exists: {0}")]
    AlreadyExists(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
