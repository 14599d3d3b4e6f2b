// ABOUTME: Packs a build context directory into the tar stream the engine expects.

use bytes::Bytes;
use std::path::{Path, PathBuf};

use super::error::BuildError;

/// Tar the contents of `dir`, paths relative to it.
pub async fn archive(dir: &Path) -> Result<Bytes, BuildError> {
    let dir: PathBuf = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut builder = tar::Builder::new(Vec::new());
        builder.follow_symlinks(false);
        builder.append_dir_all(".", &dir)?;
        Ok::<_, BuildError>(Bytes::from(builder.into_inner()?))
    })
    .await
    .map_err(|e| BuildError::Io(std::io::Error::other(e)))?
}
