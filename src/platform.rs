// ABOUTME: Process root that owns every registry and wires the deploy pipeline.
// ABOUTME: Lock, build, reconcile, reload; plus app registration, removal and status.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::build::{BuildGuard, BuildRegistry, BuildStatus, ImagePipeline, discard_upload};
use crate::config::Config;
use crate::deploy::{DeploymentCoordinator, Reconciled};
use crate::engine::{
    BollardEngine, Engine, NetworkConfig, NetworkOps, NodeInfo, NodeOps, RetryPolicy, ServiceOps,
    resolve_node,
};
use crate::error::{Error, Result};
use crate::hooks::ScriptTransform;
use crate::lock::{NamespaceGuard, NamespaceLocks};
use crate::model::{AppDefinition, Source};
use crate::proxy::{LoadBalancer, ProxySnapshot, ProxyTarget};
use crate::registry::ConfiguredRegistries;
use crate::store::{AppStore, StoreError, YamlStore};
use crate::types::{AppName, ImageRef, Namespace, NodeId};

/// What a deploy request returns.
#[derive(Debug)]
pub struct DeployOutcome {
    pub version: u32,
    pub rollout: Rollout,
}

#[derive(Debug)]
pub enum Rollout {
    /// The image is built and the service updated.
    Done(ImageRef),
    /// Build and rollout continue in the background.
    Detached(JoinHandle<Result<ImageRef>>),
}

impl DeployOutcome {
    /// Deployed image, once known.
    pub fn image(&self) -> Option<&ImageRef> {
        match &self.rollout {
            Rollout::Done(image) => Some(image),
            Rollout::Detached(_) => None,
        }
    }

    /// Wait for a detached rollout to finish.
    pub async fn wait(self) -> Result<ImageRef> {
        match self.rollout {
            Rollout::Done(image) => Ok(image),
            Rollout::Detached(task) => task
                .await
                .map_err(|e| Error::Background(e.to_string()))?,
        }
    }
}

/// One namespace's control plane.
pub struct Platform<E: ?Sized> {
    namespace: Namespace,
    root_domain: String,
    engine: Arc<E>,
    store: Arc<dyn AppStore>,
    pipeline: ImagePipeline<E>,
    coordinator: DeploymentCoordinator<E>,
    load_balancer: LoadBalancer,
    locks: Arc<NamespaceLocks>,
    retry: RetryPolicy,
}

impl Platform<BollardEngine> {
    /// Connect to the local engine, make sure it can run services and open the store.
    pub async fn bootstrap(config: &Config) -> Result<Arc<Self>> {
        let engine = BollardEngine::connect(&config.engine.socket)?;
        engine.verify().await?;

        let network = NetworkConfig::overlay(config.engine.network.clone());
        engine.ensure_network(&network).await?;

        let store = YamlStore::open(config.store.path.clone())?;
        let platform = Self::new(config, Arc::new(engine), Arc::new(store))?;

        let leader = platform.leader().await?;
        tracing::info!(
            leader = %leader.hostname,
            node = %leader.id,
            address = %leader.address,
            "cluster leader"
        );
        Ok(Arc::new(platform))
    }
}

impl<E> Platform<E>
where
    E: Engine + ?Sized + 'static,
{
    pub fn new(config: &Config, engine: Arc<E>, store: Arc<dyn AppStore>) -> Result<Self> {
        let namespace = config.namespace.clone();
        let registries = Arc::new(ConfiguredRegistries::from_config(&config.registries)?);
        let builds = Arc::new(BuildRegistry::new(config.build.log_capacity));

        let pipeline = ImagePipeline::new(
            Arc::clone(&engine),
            registries,
            Arc::clone(&builds),
            namespace.clone(),
            config.build.work_dir.clone(),
        );
        let coordinator = DeploymentCoordinator::new(
            Arc::clone(&engine),
            namespace.clone(),
            Arc::new(ScriptTransform::new(config.hooks.interpreter.clone())),
            Some(config.engine.network.clone()),
            config.build.prune_delay,
        );
        let load_balancer = LoadBalancer::new(
            Arc::clone(&engine),
            ProxyTarget {
                config: config.proxy.clone(),
                namespace_file: config.namespace_proxy_config(),
                retry: config.engine.retry,
            },
        );

        Ok(Self {
            namespace,
            root_domain: config.root_domain.clone(),
            engine,
            store,
            pipeline,
            coordinator,
            load_balancer,
            locks: Arc::new(NamespaceLocks::new(builds)),
            retry: config.engine.retry,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn locks(&self) -> &Arc<NamespaceLocks> {
        &self.locks
    }

    pub async fn get_app(&self, app: &AppName) -> Result<AppDefinition> {
        Ok(self.store.get_app(app).await?)
    }

    pub async fn list_apps(&self) -> Result<Vec<AppDefinition>> {
        Ok(self.store.list_apps().await?)
    }

    /// Register a new app with default settings.
    pub async fn register_app(
        &self,
        app: &AppName,
        has_persistent_data: bool,
    ) -> Result<AppDefinition> {
        let _lock = self
            .locks
            .acquire(&self.namespace, &format!("register {}", app))?;

        let definition = AppDefinition::new(app.clone(), has_persistent_data);
        definition.validate()?;
        self.store.insert_app(definition.clone()).await?;
        tracing::info!(app = %app, "registered app");
        Ok(definition)
    }

    /// Replace an app's settings and roll them out.
    ///
    /// Apps that have been deployed are reconciled against their current
    /// version; the proxy is regenerated either way.
    pub async fn update_app(&self, definition: AppDefinition) -> Result<()> {
        let _lock = self
            .locks
            .acquire(&self.namespace, &format!("update {}", definition.name))?;

        definition.validate()?;
        let name = definition.name.clone();
        self.store.update_app(definition).await?;

        match self.store.get_app(&name).await?.deployed_version {
            Some(version) => {
                self.reconcile(&name, version).await?;
            }
            None => self.reload_load_balancer().await?,
        }
        Ok(())
    }

    /// Build `source` into a new version of `app` and roll it out.
    ///
    /// With `detached` the build and rollout continue in the background
    /// after this returns; progress is visible through
    /// [`get_build_status`](Self::get_build_status).
    pub async fn deploy(
        self: &Arc<Self>,
        app: &AppName,
        source: Source,
        detached: bool,
    ) -> Result<DeployOutcome> {
        // Until the pipeline takes the source, a rejected request still owns the upload.
        let (_lock, guard, version) = match self.claim_build(app, &source).await {
            Ok(claimed) => claimed,
            Err(e) => {
                discard_upload(&source).await;
                return Err(e);
            }
        };

        if detached {
            let platform = Arc::clone(self);
            let app = app.clone();
            let task = tokio::spawn(async move {
                let result = platform.build_and_roll_out(guard, source, version).await;
                if let Err(e) = &result {
                    tracing::error!(app = %app, version, "detached deploy failed: {}", e);
                }
                result
            });
            return Ok(DeployOutcome {
                version,
                rollout: Rollout::Detached(task),
            });
        }

        let image = self.build_and_roll_out(guard, source, version).await?;
        Ok(DeployOutcome {
            version,
            rollout: Rollout::Done(image),
        })
    }

    async fn claim_build(
        &self,
        app: &AppName,
        source: &Source,
    ) -> Result<(NamespaceGuard, BuildGuard, u32)> {
        let lock = self
            .locks
            .acquire(&self.namespace, &format!("deploy {}", app))?;

        self.store.get_app(app).await?;
        let guard = self.pipeline.begin(app, source).await?;
        let version = self.store.reserve_version(app).await?;
        Ok((lock, guard, version))
    }

    async fn build_and_roll_out(
        &self,
        guard: BuildGuard,
        source: Source,
        version: u32,
    ) -> Result<ImageRef> {
        let app = guard.app().clone();
        let built = self.pipeline.publish(guard, source, version).await?;
        if let Some(hash) = built.git_hash {
            self.store.set_git_hash(&app, version, hash).await?;
        }
        self.reconcile(&app, version).await?;
        Ok(built.image)
    }

    /// Point `app`'s service at the image of `version` and apply its settings.
    pub async fn reconcile(&self, app: &AppName, version: u32) -> Result<Reconciled> {
        let definition = self.store.get_app(app).await?;
        if !definition.versions.iter().any(|v| v.version == version) {
            return Err(StoreError::UnknownVersion {
                app: app.to_string(),
                version,
            }
            .into());
        }

        let image = self.pipeline.image_for(app, version);
        let reconciled = self.coordinator.reconcile(&definition, &image).await?;
        self.store.set_deployed_version(app, version).await?;
        tracing::info!(app = %app, version, image = %image, "deployed");

        self.reload_load_balancer().await?;
        Ok(reconciled)
    }

    pub fn get_build_status(&self, app: &AppName) -> BuildStatus {
        self.pipeline.builds().status(app)
    }

    /// The app whose build is running, if any.
    pub fn is_any_build_running(&self) -> Option<AppName> {
        self.pipeline.builds().running()
    }

    /// Regenerate proxy config from the stored apps and reload the proxy.
    pub async fn reload_load_balancer(&self) -> Result<()> {
        let snapshot = ProxySnapshot {
            namespace: self.namespace.clone(),
            root_domain: self.root_domain.clone(),
            apps: self.store.list_apps().await?,
        };
        self.load_balancer.request_reload(snapshot).await?;
        Ok(())
    }

    /// Delete `app`'s service and definition.
    pub async fn remove_app(&self, app: &AppName) -> Result<()> {
        let _lock = self
            .locks
            .acquire(&self.namespace, &format!("remove {}", app))?;

        let service = self.namespace.service_name(app);
        if !self.engine.remove_service(&service).await? {
            tracing::debug!("service {} was not running", service);
        }
        if !self.store.remove_app(app).await? {
            return Err(StoreError::NotFound(app.to_string()).into());
        }
        self.pipeline.builds().forget(app);
        tracing::info!(app = %app, "removed app");

        self.reload_load_balancer().await
    }

    /// The cluster's current manager leader.
    pub async fn leader(&self) -> Result<NodeInfo> {
        Ok(self.engine.leader_node().await?)
    }

    /// Node currently running `app`'s only task.
    pub async fn running_node(&self, app: &AppName) -> Result<NodeId> {
        let service = self.namespace.service_name(app);
        Ok(resolve_node(self.engine.as_ref(), &service, self.retry).await?)
    }
}
