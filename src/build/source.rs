// ABOUTME: Materializes a build source into a directory.
// ABOUTME: Unpacks archives, clones git branches, writes inline descriptors and finds the context root.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::descriptor::{BuildDescriptor, DESCRIPTOR_FILE};
use super::error::BuildError;
use crate::model::{GitRepo, Source};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Fill `dir` from `source`. Returns the commit hash for git sources.
pub async fn materialize(source: &Source, dir: &Path) -> Result<Option<String>, BuildError> {
    tokio::fs::create_dir_all(dir).await?;

    match source {
        Source::Archive(path) => {
            let (path, dir) = (path.clone(), dir.to_path_buf());
            blocking(move || extract_archive(&path, &dir)).await?;
            Ok(None)
        }
        Source::Git(repo) => {
            let (repo, dir) = (repo.clone(), dir.to_path_buf());
            blocking(move || clone_branch(&repo, &dir)).await.map(Some)
        }
        Source::Descriptor(content) => {
            tokio::fs::write(dir.join(DESCRIPTOR_FILE), content).await?;
            Ok(None)
        }
        Source::Image(image) => {
            let descriptor = BuildDescriptor::from_image(image);
            tokio::fs::write(dir.join(DESCRIPTOR_FILE), descriptor.to_json()).await?;
            Ok(None)
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T, BuildError>
where
    F: FnOnce() -> Result<T, BuildError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BuildError::Source(format!("source task failed: {}", e)))?
}

/// Unpack a tar archive, gzipped or not.
fn extract_archive(path: &Path, dir: &Path) -> Result<(), BuildError> {
    let mut file = File::open(path)
        .map_err(|e| BuildError::Source(format!("cannot open {}: {}", path.display(), e)))?;

    let mut magic = [0u8; 2];
    let read = file.read(&mut magic)?;
    let file = File::open(path)?;

    let reader: Box<dyn Read> = if read == 2 && magic == GZIP_MAGIC {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    tar::Archive::new(reader)
        .unpack(dir)
        .map_err(|e| BuildError::Source(format!("cannot extract {}: {}", path.display(), e)))
}

fn clone_branch(repo: &GitRepo, dir: &Path) -> Result<String, BuildError> {
    let cloned = git2::build::RepoBuilder::new()
        .branch(&repo.branch)
        .clone(&repo.authenticated_url(), dir)
        .map_err(|e| {
            BuildError::Source(format!(
                "cannot clone branch {} of {}: {}",
                repo.branch,
                repo.repo,
                e.message()
            ))
        })?;

    let head = cloned
        .head()
        .and_then(|head| head.peel_to_commit())
        .map_err(|e| BuildError::Source(format!("cannot read HEAD: {}", e.message())))?;
    Ok(head.id().to_string())
}

/// Find the directory holding the build descriptor.
///
/// Archives often wrap their content in one extra directory. If the
/// descriptor is not at `dir` itself and `dir` has exactly one entry, a
/// directory holding the descriptor, that directory is the context root.
pub fn locate_context(dir: &Path) -> Result<PathBuf, BuildError> {
    if dir.join(DESCRIPTOR_FILE).is_file() {
        return Ok(dir.to_path_buf());
    }

    let entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    if let [only] = entries.as_slice() {
        let child = only.path();
        if child.is_dir() && child.join(DESCRIPTOR_FILE).is_file() {
            return Ok(child);
        }
    }

    Err(BuildError::DescriptorMissing(dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_descriptor(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(DESCRIPTOR_FILE),
            r#"{"schemaVersion":1,"dockerfileLines":["FROM nginx"]}"#,
        )
        .unwrap();
    }

    #[test]
    fn descriptor_at_root_used_directly() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(tmp.path());
        assert_eq!(locate_context(tmp.path()).unwrap(), tmp.path());
    }

    #[test]
    fn single_wrapping_directory_is_promoted() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(&tmp.path().join("app-main"));
        assert_eq!(
            locate_context(tmp.path()).unwrap(),
            tmp.path().join("app-main")
        );
    }

    #[test]
    fn two_children_fail() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(&tmp.path().join("app-main"));
        fs::create_dir(tmp.path().join("docs")).unwrap();
        let err = locate_context(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("descriptor does not exist"));
    }

    #[test]
    fn two_levels_deep_fails() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(&tmp.path().join("outer").join("inner"));
        assert!(matches!(
            locate_context(tmp.path()),
            Err(BuildError::DescriptorMissing(_))
        ));
    }

    #[tokio::test]
    async fn gzipped_archive_is_extracted() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("upload.tar.gz");

        let encoder =
            flate2::write::GzEncoder::new(File::create(&archive).unwrap(), Default::default());
        let mut builder = tar::Builder::new(encoder);
        let content = br#"{"schemaVersion":1,"dockerfileLines":["FROM nginx"]}"#;
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("wrapped/{}", DESCRIPTOR_FILE), &content[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let out = tmp.path().join("out");
        let hash = materialize(&Source::Archive(archive), &out).await.unwrap();
        assert!(hash.is_none());
        assert_eq!(locate_context(&out).unwrap(), out.join("wrapped"));
    }
}
