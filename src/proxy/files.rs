// ABOUTME: Atomic installation of generated proxy config files.
// ABOUTME: Write `<file>.fut`, keep the previous version as `<file>.bak`, rename into place.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::error::ProxyError;

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Staging file written before the swap.
pub fn staging_path(path: &Path) -> PathBuf {
    sibling(path, ".fut")
}

/// Copy of the config that was live before the swap.
pub fn backup_path(path: &Path) -> PathBuf {
    sibling(path, ".bak")
}

/// Replace `path` with `content` so a reader sees either the old file or the
/// new one, never a partial write.
pub async fn install(path: &Path, content: &str) -> Result<(), ProxyError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ProxyError::io(parent, e))?;
    }

    let staging = staging_path(path);
    tokio::fs::write(&staging, content)
        .await
        .map_err(|e| ProxyError::io(&staging, e))?;

    if tokio::fs::try_exists(path)
        .await
        .map_err(|e| ProxyError::io(path, e))?
    {
        let backup = backup_path(path);
        tokio::fs::copy(path, &backup)
            .await
            .map_err(|e| ProxyError::io(&backup, e))?;
    }

    tokio::fs::rename(&staging, path)
        .await
        .map_err(|e| ProxyError::io(path, e))?;
    tracing::debug!("installed {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_install_creates_file_without_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.d").join("captain.conf");

        install(&path, "server {}\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "server {}\n");
        assert!(!backup_path(&path).exists());
        assert!(!staging_path(&path).exists());
    }

    #[tokio::test]
    async fn reinstall_keeps_previous_as_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captain.conf");

        install(&path, "old").await.unwrap();
        install(&path, "new").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_to_string(backup_path(&path)).unwrap(), "old");
    }

    #[test]
    fn sibling_names_append_suffix() {
        let path = Path::new("/etc/nginx/captain.conf");
        assert_eq!(
            staging_path(path),
            PathBuf::from("/etc/nginx/captain.conf.fut")
        );
        assert_eq!(backup_path(path), PathBuf::from("/etc/nginx/captain.conf.bak"));
    }
}
