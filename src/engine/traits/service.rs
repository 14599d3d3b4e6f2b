// ABOUTME: Orchestrator service operations for the container engine.
// ABOUTME: Create, inspect, update and remove services and list their tasks.

use super::shared_types::{ServiceInfo, ServiceSpec, TaskSummary};
use crate::types::ServiceId;
use async_trait::async_trait;

/// Replica-managed service lifecycle.
#[async_trait]
pub trait ServiceOps: Send + Sync {
    /// Create a service. Returns the new service's id.
    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceId, ServiceError>;

    /// Inspect a service by name. `Ok(None)` when it does not exist.
    async fn inspect_service(&self, name: &str) -> Result<Option<ServiceInfo>, ServiceError>;

    /// Replace a service's spec. `version` must be the index read by
    /// `inspect_service`, so concurrent writers are detected.
    async fn update_service(
        &self,
        id: &ServiceId,
        version: u64,
        spec: &ServiceSpec,
    ) -> Result<(), ServiceError>;

    /// Remove a service. Returns `false` if it did not exist.
    async fn remove_service(&self, name: &str) -> Result<bool, ServiceError>;

    /// Tasks belonging to the named service.
    async fn list_tasks(&self, service: &str) -> Result<Vec<TaskSummary>, ServiceError>;
}

/// Errors from service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("service not found: {0}")]
    NotFound(String),

    #[error("service already exists: {0}")]
    AlreadyExists(String),

    #[error("service was updated concurrently: {0}")]
    OutOfSequence(String),

    #[error("invalid service spec: {0}")]
    InvalidSpec(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
