// ABOUTME: Error types for the image build pipeline.
// ABOUTME: Each error maps to a kind so callers can tell bad input from engine failures.

use std::path::PathBuf;

/// Broad category of a build failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildErrorKind {
    /// Bad descriptor or source layout, found before any engine call.
    Validation,
    /// The engine failed to build the image.
    Build,
    /// Retagging or pushing to the default registry failed.
    Push,
    /// The source could not be fetched or unpacked.
    Source,
    /// Local filesystem failure.
    Io,
    /// Another build is already running.
    Busy,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("build descriptor does not exist in {}", .0.display())]
    DescriptorMissing(PathBuf),

    #[error("invalid build descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("unsupported build descriptor schemaVersion {0}, expected 1")]
    UnsupportedSchema(u64),

    #[error("build descriptor must set exactly one of templateId or dockerfileLines")]
    AmbiguousDescriptor,

    #[error("unknown build template: {0}")]
    UnknownTemplate(String),

    #[error("build failed: {0}")]
    Build(String),

    #[error("failed to push {image}: {message}")]
    Push { image: String, message: String },

    #[error("failed to pull {image}: {message}")]
    Pull { image: String, message: String },

    #[error("failed to fetch source: {0}")]
    Source(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("a build is already running for {0}")]
    Busy(String),
}

impl BuildError {
    pub fn kind(&self) -> BuildErrorKind {
        match self {
            BuildError::DescriptorMissing(_)
            | BuildError::InvalidDescriptor(_)
            | BuildError::UnsupportedSchema(_)
            | BuildError::AmbiguousDescriptor
            | BuildError::UnknownTemplate(_) => BuildErrorKind::Validation,
            BuildError::Build(_) => BuildErrorKind::Build,
            BuildError::Push { .. } => BuildErrorKind::Push,
            BuildError::Pull { .. } | BuildError::Source(_) => BuildErrorKind::Source,
            BuildError::Io(_) => BuildErrorKind::Io,
            BuildError::Busy(_) => BuildErrorKind::Busy,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == BuildErrorKind::Validation
    }
}
