// ABOUTME: The image pipeline: source to versioned, optionally pushed image.
// ABOUTME: Materialize, locate context, resolve build file, build, push, clean up.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::context;
use super::descriptor::{BUILD_FILE, BuildDescriptor, DESCRIPTOR_FILE};
use super::error::BuildError;
use super::source;
use super::state::{BuildGuard, BuildRegistry};
use crate::engine::{BuildRequest, ImageOps, drain_progress};
use crate::model::Source;
use crate::registry::RegistryResolver;
use crate::types::{AppName, ImageRef, Namespace};

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    /// Reference deployments should use: the pushed name when a default
    /// push registry exists, the local one otherwise.
    pub image: ImageRef,
    /// Commit the image was built from, for git sources.
    pub git_hash: Option<String>,
}

pub struct ImagePipeline<E: ?Sized> {
    engine: Arc<E>,
    registries: Arc<dyn RegistryResolver>,
    builds: Arc<BuildRegistry>,
    namespace: Namespace,
    work_dir: PathBuf,
}

impl<E> ImagePipeline<E>
where
    E: ImageOps + ?Sized,
{
    pub fn new(
        engine: Arc<E>,
        registries: Arc<dyn RegistryResolver>,
        builds: Arc<BuildRegistry>,
        namespace: Namespace,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            registries,
            builds,
            namespace,
            work_dir: work_dir.into(),
        }
    }

    pub fn builds(&self) -> &Arc<BuildRegistry> {
        &self.builds
    }

    /// Image reference a given version of `app` is deployed from.
    pub fn image_for(&self, app: &AppName, version: u32) -> ImageRef {
        let local = ImageRef::local(self.namespace.image_base(app), version.to_string());
        match self.registries.default_push() {
            Some(target) => target.image_for(&local),
            None => local,
        }
    }

    /// Build `source` into image version `version` of `app`.
    ///
    /// The app is marked as building for the whole call and its log is
    /// cleared first. Scratch files and uploaded archives are removed on every
    /// path; a failing cleanup never hides the build result.
    pub async fn build_and_publish(
        &self,
        app: &AppName,
        source: Source,
        version: u32,
    ) -> Result<BuiltImage, BuildError> {
        let guard = self.begin(app, &source).await?;
        self.publish(guard, source, version).await
    }

    /// Claim the build slot for `app`. Fails while any other build runs, in
    /// which case an uploaded archive is discarded.
    pub async fn begin(&self, app: &AppName, source: &Source) -> Result<BuildGuard, BuildError> {
        match self.builds.begin(app) {
            Ok(guard) => Ok(guard),
            Err(e) => {
                discard_upload(source).await;
                Err(e)
            }
        }
    }

    /// Run a build whose slot is already held by `guard`.
    pub async fn publish(
        &self,
        guard: BuildGuard,
        source: Source,
        version: u32,
    ) -> Result<BuiltImage, BuildError> {
        let app = guard.app().clone();
        let scratch = self.work_dir.join(format!(
            "{}--{}--{}",
            self.namespace,
            app,
            uuid::Uuid::new_v4().simple()
        ));

        tracing::info!(app = %app, version, source = source.kind(), "building image");
        let result = self.run(&guard, &source, &scratch, version).await;

        remove_dir(&scratch).await;
        discard_upload(&source).await;

        match &result {
            Ok(built) => {
                guard.log(&format!("Build has finished successfully: {}", built.image));
                tracing::info!(app = %app, image = %built.image, "image ready");
            }
            Err(e) => {
                guard.fail(&e.to_string());
                tracing::error!(app = %app, error = %e, "build failed");
            }
        }
        result
    }

    async fn run(
        &self,
        guard: &BuildGuard,
        source: &Source,
        scratch: &Path,
        version: u32,
    ) -> Result<BuiltImage, BuildError> {
        let app = guard.app();

        if let Source::Image(image) = source {
            self.pull_external(guard, image).await?;
        }

        guard.log(&format!("Fetching {} source", source.kind()));
        let git_hash = source::materialize(source, scratch).await?;
        if let Some(ref hash) = git_hash {
            guard.log(&format!("Checked out commit {}", hash));
        }

        let root = source::locate_context(scratch)?;
        let descriptor = tokio::fs::read_to_string(root.join(DESCRIPTOR_FILE)).await?;
        let build_file = BuildDescriptor::parse(&descriptor)?.build_file()?;
        tokio::fs::write(root.join(BUILD_FILE), &build_file).await?;

        let context = context::archive(&root).await?;
        let local = ImageRef::local(self.namespace.image_base(app), version.to_string());

        guard.log(&format!("Building {}", local));
        let request = BuildRequest {
            tag: local.to_string(),
            dockerfile: BUILD_FILE.to_string(),
            context,
            registry_auth: self.registries.all_auth(),
        };
        let stream = self
            .engine
            .build_image(request)
            .await
            .map_err(|e| BuildError::Build(e.to_string()))?;
        drain_progress(stream, |line| guard.log(line))
            .await
            .map_err(|text| BuildError::Build(text.trim().to_string()))?;

        let image = match self.registries.default_push() {
            Some(target) => {
                let pushed = target.image_for(&local);
                let push_err = |message: String| BuildError::Push {
                    image: pushed.to_string(),
                    message,
                };

                guard.log(&format!("Pushing {}", pushed));
                self.engine
                    .tag_image(&local, &pushed)
                    .await
                    .map_err(|e| push_err(e.to_string()))?;
                let stream = self
                    .engine
                    .push_image(&pushed, Some(&target.auth))
                    .await
                    .map_err(|e| push_err(e.to_string()))?;
                drain_progress(stream, |line| guard.log(line))
                    .await
                    .map_err(|text| push_err(text.trim().to_string()))?;
                pushed
            }
            None => local,
        };

        Ok(BuiltImage { image, git_hash })
    }

    /// Pull an external image with registry credentials so the build can use it.
    async fn pull_external(&self, guard: &BuildGuard, image: &str) -> Result<(), BuildError> {
        let reference = ImageRef::parse(image).map_err(|e| BuildError::Pull {
            image: image.to_string(),
            message: e.to_string(),
        })?;
        let auth = self.registries.auth_for_image(&reference);
        let pull_err = |message: String| BuildError::Pull {
            image: reference.to_string(),
            message,
        };

        guard.log(&format!("Pulling {}", reference));
        let stream = self
            .engine
            .pull_image(&reference, auth.as_ref())
            .await
            .map_err(|e| pull_err(e.to_string()))?;
        drain_progress(stream, |line| guard.log(line))
            .await
            .map_err(|text| pull_err(text.trim().to_string()))
    }
}

async fn remove_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("failed to remove build directory {}: {}", dir.display(), e),
    }
}

/// Uploaded archives are single-use; remove one once its request is over.
pub async fn discard_upload(source: &Source) {
    if let Source::Archive(path) = source
        && let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!("failed to remove upload {}: {}", path.display(), e);
    }
}
