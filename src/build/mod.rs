// ABOUTME: Image build pipeline with per-app build state and logs.
// ABOUTME: Exports ImagePipeline, BuildRegistry, BuildLog and the build descriptor.

mod context;
mod descriptor;
mod error;
mod log;
mod pipeline;
mod source;
mod state;
pub mod templates;

pub use descriptor::{BUILD_FILE, BuildDescriptor, DESCRIPTOR_FILE};
pub use error::{BuildError, BuildErrorKind};
pub use log::{BuildLog, BuildLogs};
pub use pipeline::{BuiltImage, ImagePipeline, discard_upload};
pub use source::{locate_context, materialize};
pub use state::{BuildGuard, BuildRegistry, BuildStatus};
