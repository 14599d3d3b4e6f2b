// ABOUTME: Composable capability traits for the container engine.
// ABOUTME: Defines ServiceOps, NodeOps, ImageOps, SecretOps, NetworkOps, ExecOps and Engine.

mod exec;
mod image;
mod network;
mod node;
mod secret;
mod service;
mod shared_types;

pub use exec::{ExecError, ExecOps};
pub use image::{ImageError, ImageOps};
pub use network::{NetworkError, NetworkOps};
pub use node::{NodeError, NodeOps};
pub use secret::{SecretError, SecretOps};
pub use service::{ServiceError, ServiceOps};
pub use shared_types::*;

/// Every capability the deploy pipeline needs from an engine.
///
/// Implemented automatically for any type implementing all capability traits,
/// so functions can ask for exactly the capabilities they use or for the
/// whole engine.
pub trait Engine: ServiceOps + NodeOps + ImageOps + SecretOps + NetworkOps + ExecOps {}

impl<T> Engine for T where T: ServiceOps + NodeOps + ImageOps + SecretOps + NetworkOps + ExecOps {}
