// ABOUTME: Thin client abstraction over the container engine's remote API.
// ABOUTME: Capability traits, bollard implementation, bounded retry and progress handling.

mod bollard;
mod error;
pub mod progress;
pub mod resolve;
pub mod retry;
pub mod traits;

pub use self::bollard::BollardEngine;
pub use error::{EngineError, EngineErrorKind};
pub use progress::drain_progress;
pub use resolve::{ResolveError, exec_in_service, resolve_container, resolve_node};
pub use retry::{Attempt, RetryPolicy, bounded_retry};
pub use traits::*;
