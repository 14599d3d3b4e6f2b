// ABOUTME: Error types for proxy config regeneration.
// ABOUTME: Cloneable so one failed pass can be reported to every waiting caller.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error("template {template}: {message}")]
    Template { template: String, message: String },

    #[error("failed to write {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("failed to load app state: {0}")]
    State(String),

    #[error("proxy reload failed: {0}")]
    Reload(String),

    #[error("reload pass ended without a result")]
    Abandoned,

    #[error("reload pass panicked: {0}")]
    Panicked(String),
}

impl ProxyError {
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        ProxyError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}
