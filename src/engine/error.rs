// ABOUTME: Engine connection error types with SNAFU pattern.
// ABOUTME: Distinguishes socket connection failures from unreachable or non-swarm engines.

use snafu::Snafu;

/// Failure to reach a usable engine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EngineError {
    #[snafu(display("failed to connect to engine socket {socket}: {source}"))]
    Connect {
        socket: String,
        source: bollard::errors::Error,
    },

    #[snafu(display("engine at {socket} is not responding: {source}"))]
    Unreachable {
        socket: String,
        source: bollard::errors::Error,
    },

    #[snafu(display("engine at {socket} is not a swarm manager"))]
    NotManager { socket: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Socket could not be opened.
    ConnectionFailed,
    /// Socket opened but the engine did not answer.
    Unreachable,
    /// Engine answered but cannot run services.
    NotManager,
}

impl EngineError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            EngineError::Connect { .. } => EngineErrorKind::ConnectionFailed,
            EngineError::Unreachable { .. } => EngineErrorKind::Unreachable,
            EngineError::NotManager { .. } => EngineErrorKind::NotManager,
        }
    }

    /// Socket path the failure relates to.
    pub fn socket(&self) -> &str {
        match self {
            EngineError::Connect { socket, .. }
            | EngineError::Unreachable { socket, .. }
            | EngineError::NotManager { socket } => socket,
        }
    }
}
