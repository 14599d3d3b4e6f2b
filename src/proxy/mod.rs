// ABOUTME: Reverse proxy config regeneration and reload signalling.
// ABOUTME: Renders per-namespace and root configs, swaps them in, then reloads the proxy.

mod error;
mod files;
mod queue;
mod render;
mod template;

pub use error::ProxyError;
pub use files::{backup_path, install, staging_path};
pub use queue::ReloadQueue;
pub use render::{
    DEFAULT_APP_TEMPLATE, REGISTRY_SERVICE, ROOT_TEMPLATE, ProxySnapshot, RenderedConfig,
};
pub use template::{Template, Vars};

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::engine::{Engine, RetryPolicy, exec_in_service};

/// Where a namespace's generated config goes and how the proxy is told.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub config: ProxyConfig,
    /// `<config_dir>/<namespace>.conf`
    pub namespace_file: PathBuf,
    pub retry: RetryPolicy,
}

/// The load balancer's reload queue, bound to an engine and target.
#[derive(Clone)]
pub struct LoadBalancer {
    queue: ReloadQueue<ProxySnapshot>,
}

impl LoadBalancer {
    pub fn new<E>(engine: Arc<E>, target: ProxyTarget) -> Self
    where
        E: Engine + ?Sized + 'static,
    {
        let target = Arc::new(target);
        let queue = ReloadQueue::new(move |snapshot: ProxySnapshot| {
            let engine = Arc::clone(&engine);
            let target = Arc::clone(&target);
            async move { regenerate(engine.as_ref(), &target, snapshot).await }
        });
        Self { queue }
    }

    /// Regenerate proxy config from `snapshot` and reload the proxy.
    ///
    /// Concurrent callers share passes; see [`ReloadQueue`].
    pub async fn request_reload(&self, snapshot: ProxySnapshot) -> Result<(), ProxyError> {
        self.queue.request(snapshot).await
    }

    pub fn is_reloading(&self) -> bool {
        self.queue.is_running()
    }
}

/// One regeneration pass.
async fn regenerate<E>(
    engine: &E,
    target: &ProxyTarget,
    snapshot: ProxySnapshot,
) -> Result<(), ProxyError>
where
    E: Engine + ?Sized,
{
    let app_template = match &target.config.app_template {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProxyError::io(path, e))?,
        None => DEFAULT_APP_TEMPLATE.to_string(),
    };

    let rendered = snapshot.render(&target.config, &app_template)?;
    tracing::info!(
        namespace = %snapshot.namespace,
        apps = snapshot.apps.len(),
        "installing proxy config"
    );
    install(&target.namespace_file, &rendered.namespace_config).await?;
    install(&target.config.root_config, &rendered.root_config).await?;

    let Some(service) = target.config.service.as_deref() else {
        return Ok(());
    };
    let cmd: Vec<String> = target.config.reload_command.iter().cloned().collect();
    exec_in_service(engine, service, &cmd, target.retry)
        .await
        .map_err(|e| ProxyError::Reload(e.to_string()))?;
    tracing::debug!("proxy {} reloaded", service);
    Ok(())
}
