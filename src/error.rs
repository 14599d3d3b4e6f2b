// ABOUTME: Application-wide error types for caravel.
// ABOUTME: Uses thiserror for ergonomic error handling; component errors convert via From.

use std::path::PathBuf;
use thiserror::Error;

use crate::build::BuildError;
use crate::deploy::DeployError;
use crate::engine::{EngineError, NetworkError, NodeError, ResolveError, ServiceError};
use crate::lock::LockError;
use crate::model::ValidationError;
use crate::proxy::ProxyError;
use crate::store::StoreError;
use crate::types::AppNameError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid name: {0}")]
    InvalidName(#[from] AppNameError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("service operation failed: {0}")]
    Service(#[from] ServiceError),

    #[error("node operation failed: {0}")]
    Node(#[from] NodeError),

    #[error("network operation failed: {0}")]
    Network(#[from] NetworkError),

    #[error("background task failed: {0}")]
    Background(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
