// ABOUTME: Brings an app's orchestrator service in line with its definition.
// ABOUTME: Create if missing, then always update; prunes dangling images afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{Engine, SecretReference, ServiceSpec};
use crate::hooks::PreDeployTransform;
use crate::model::AppDefinition;
use crate::types::{ImageRef, Namespace, ServiceId};

use super::draft::{APP_LABEL, NAMESPACE_LABEL, ServiceDraft};
use super::error::DeployError;
use super::state::{NotRunning, Observed, Reconciliation};

/// Outcome of a reconcile.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub service_id: ServiceId,
    /// Spec submitted in the update.
    pub spec: ServiceSpec,
    /// Whether the service had to be created first.
    pub created: bool,
}

pub struct DeploymentCoordinator<E: ?Sized> {
    engine: Arc<E>,
    namespace: Namespace,
    hooks: Arc<dyn PreDeployTransform>,
    /// Overlay network every service joins.
    network: Option<String>,
    prune_delay: Duration,
}

impl<E> DeploymentCoordinator<E>
where
    E: Engine + ?Sized + 'static,
{
    pub fn new(
        engine: Arc<E>,
        namespace: Namespace,
        hooks: Arc<dyn PreDeployTransform>,
        network: Option<String>,
        prune_delay: Duration,
    ) -> Self {
        Self {
            engine,
            namespace,
            hooks,
            network,
            prune_delay,
        }
    }

    pub fn service_name(&self, app: &AppDefinition) -> String {
        self.namespace.service_name(&app.name)
    }

    /// Reconcile the service for `app` to run `image`.
    pub async fn reconcile(
        &self,
        app: &AppDefinition,
        image: &ImageRef,
    ) -> Result<Reconciled, DeployError> {
        app.validate()?;

        let engine = self.engine.as_ref();
        let service = self.service_name(app);

        let observed = Reconciliation::<NotRunning>::observe(engine, &service).await?;
        let (running, created) = match observed {
            Observed::Running(running) => (running, false),
            Observed::NotRunning(missing) => {
                let initial = ServiceSpec {
                    name: service.clone(),
                    image: image.to_string(),
                    labels: [
                        (NAMESPACE_LABEL.to_string(), self.namespace.to_string()),
                        (APP_LABEL.to_string(), app.name.to_string()),
                    ]
                    .into_iter()
                    .collect(),
                    ..Default::default()
                };
                (missing.create(engine, initial).await?, true)
            }
        };

        let secrets = self.ensure_secrets(app).await?;

        let draft = ServiceDraft::from_live(running.live().spec.clone())
            .image(&image.to_string())
            .labels(&self.namespace, &app.name)
            .replicas(app.instance_count)?
            .placement(app.node_id.as_deref())
            .env(&app.env_vars)
            .ports(&app.ports)
            .volumes(&self.namespace, &app.volumes, app.has_persistent_data)?
            .networks(self.network.iter().cloned().chain(app.networks.iter().cloned()))
            .secrets(secrets)
            .force_update();

        let mut spec = draft.into_spec();
        if app.pre_deploy_script.is_some() {
            spec = self.hooks.transform(app, spec).await?;
        }

        let (service_id, spec) = running.update(engine, spec).await?.finish();
        self.schedule_prune();

        Ok(Reconciled {
            service_id,
            spec,
            created,
        })
    }

    /// Create missing secrets and return references for all of the app's secrets.
    async fn ensure_secrets(
        &self,
        app: &AppDefinition,
    ) -> Result<Vec<SecretReference>, DeployError> {
        let labels: HashMap<String, String> = [
            (NAMESPACE_LABEL.to_string(), self.namespace.to_string()),
            (APP_LABEL.to_string(), app.name.to_string()),
        ]
        .into_iter()
        .collect();

        let mut references = Vec::with_capacity(app.secrets.len());
        for secret in &app.secrets {
            let name = self.namespace.secret_name(&secret.name);
            let id = self
                .engine
                .ensure_secret(&name, secret.value.as_bytes(), &labels)
                .await?;
            references.push(SecretReference {
                secret_id: id,
                file_name: secret.target.clone().unwrap_or_else(|| secret.name.clone()),
                secret_name: name,
            });
        }
        Ok(references)
    }

    /// Prune dangling images after a short delay. Failures are only logged.
    fn schedule_prune(&self) {
        let engine = Arc::clone(&self.engine);
        let delay = self.prune_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match engine.prune_dangling_images().await {
                Ok(reclaimed) => {
                    tracing::debug!("pruned dangling images, {} bytes reclaimed", reclaimed)
                }
                Err(e) => tracing::warn!("failed to prune dangling images: {}", e),
            }
        });
    }
}
