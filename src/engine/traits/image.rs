// ABOUTME: Image operations trait for the container engine.
// ABOUTME: Build, push, pull, tag and prune images with streamed progress.

use super::shared_types::{BuildRequest, ProgressStream, RegistryAuth};
use crate::types::ImageRef;
use async_trait::async_trait;

/// Image operations. Long-running calls return a progress stream that ends
/// when the engine closes it; error chunks are part of the stream.
#[async_trait]
pub trait ImageOps: Send + Sync {
    /// Build an image from a tarred build context.
    async fn build_image(&self, request: BuildRequest) -> Result<ProgressStream, ImageError>;

    /// Push an image to its registry.
    async fn push_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<ProgressStream, ImageError>;

    /// Pull an image from a registry.
    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<ProgressStream, ImageError>;

    /// Add `target` as an additional name for `source`.
    async fn tag_image(&self, source: &ImageRef, target: &ImageRef) -> Result<(), ImageError>;

    /// Remove dangling images. Returns reclaimed bytes.
    async fn prune_dangling_images(&self) -> Result<u64, ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("authentication failed for registry: {0}")]
    AuthenticationFailed(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("push failed: {0}")]
    PushFailed(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
