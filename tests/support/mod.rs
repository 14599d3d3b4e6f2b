// ABOUTME: Test support utilities.
// ABOUTME: In-memory FakeEngine implementing every engine trait, plus config fixtures.

use async_trait::async_trait;
use caravel::config::Config;
use caravel::engine::{
    BuildRequest, ExecConfig, ExecError, ExecOps, ExecResult, ImageError, ImageOps, NetworkConfig,
    NetworkError, NetworkOps, NodeError, NodeInfo, NodeOps, ProgressChunk, ProgressStream,
    RegistryAuth, SecretError, SecretOps, ServiceError, ServiceInfo, ServiceMode, ServiceOps,
    ServiceSpec, TaskState, TaskSummary,
};
use caravel::types::{ContainerId, ImageRef, NetworkId, NodeId, SecretId, ServiceId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("caravel=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Control-plane config writing everything below `dir`, with the proxy
/// reloaded through the `caravel-nginx` service.
#[allow(dead_code)]
pub fn test_config(dir: &Path) -> Config {
    let yaml = format!(
        r#"
namespace: captain
root_domain: apps.example.com
engine:
  retry:
    attempts: 2
    delay: 0s
build:
  work_dir: {dir}/builds
  log_capacity: 50
  prune_delay: 10ms
proxy:
  config_dir: {dir}/nginx/conf.d
  root_config: {dir}/nginx/root.conf
  certs_dir: {dir}/certs
  service: caravel-nginx
store:
  path: {dir}/apps.yml
"#,
        dir = dir.display()
    );
    Config::from_yaml(&yaml).unwrap()
}

/// Everything the fake engine has been asked to do.
#[derive(Default)]
#[allow(dead_code)]
pub struct FakeState {
    pub services: BTreeMap<String, ServiceInfo>,
    pub created: Vec<ServiceSpec>,
    pub updates: Vec<ServiceSpec>,
    pub removed: Vec<String>,
    pub builds: Vec<BuildRequest>,
    pub tags: Vec<(String, String)>,
    pub pushes: Vec<String>,
    pub pulls: Vec<String>,
    pub prunes: usize,
    pub secrets: BTreeMap<String, SecretId>,
    pub networks: Vec<String>,
    pub execs: Vec<(String, Vec<String>)>,
    /// Extra running tasks keyed by service, e.g. for the proxy.
    pub tasks: BTreeMap<String, Vec<TaskSummary>>,
    pub build_error: Option<String>,
    pub push_error: Option<String>,
    pub exec_exit_code: i64,
    pub build_delay: Option<Duration>,
    /// The cluster is mid-election: no manager reports as leader.
    pub leaderless: bool,
    next_id: u64,
}

/// In-memory engine. Services get one running task on node `node-1`.
#[derive(Default)]
pub struct FakeEngine {
    pub state: Mutex<FakeState>,
}

#[allow(dead_code)]
impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that also runs the proxy service used by [`test_config`].
    pub fn with_proxy() -> Self {
        let engine = Self::new();
        engine.add_task("caravel-nginx", running_task("proxy-task", "node-1", "proxy-ctr"));
        engine
    }

    pub fn add_task(&self, service: &str, task: TaskSummary) {
        self.state
            .lock()
            .tasks
            .entry(service.to_string())
            .or_default()
            .push(task);
    }

    pub fn service(&self, name: &str) -> Option<ServiceInfo> {
        self.state.lock().services.get(name).cloned()
    }

    /// Insert a live service directly, as if created outside the pipeline.
    pub fn insert_service(&self, spec: ServiceSpec) {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = ServiceId::new(format!("svc-{}", state.next_id));
        state.services.insert(
            spec.name.clone(),
            ServiceInfo {
                id,
                version: 1,
                spec,
            },
        );
    }

    pub fn fail_builds(&self, message: &str) {
        self.state.lock().build_error = Some(message.to_string());
    }

    pub fn fail_pushes(&self, message: &str) {
        self.state.lock().push_error = Some(message.to_string());
    }

    pub fn slow_builds(&self, delay: Duration) {
        self.state.lock().build_delay = Some(delay);
    }

    pub fn build_count(&self) -> usize {
        self.state.lock().builds.len()
    }
}

#[allow(dead_code)]
pub fn running_task(id: &str, node: &str, container: &str) -> TaskSummary {
    TaskSummary {
        id: id.to_string(),
        node_id: Some(NodeId::new(node.to_string())),
        container_id: Some(ContainerId::new(container.to_string())),
        state: TaskState::Running,
        desired_running: true,
    }
}

fn stream(chunks: Vec<ProgressChunk>) -> ProgressStream {
    Box::pin(futures::stream::iter(chunks.into_iter().map(Ok)))
}

#[async_trait]
impl ServiceOps for FakeEngine {
    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceId, ServiceError> {
        let mut state = self.state.lock();
        if state.services.contains_key(&spec.name) {
            return Err(ServiceError::AlreadyExists(spec.name.clone()));
        }
        state.next_id += 1;
        let id = ServiceId::new(format!("svc-{}", state.next_id));
        state.created.push(spec.clone());
        state.services.insert(
            spec.name.clone(),
            ServiceInfo {
                id: id.clone(),
                version: 1,
                spec: spec.clone(),
            },
        );
        Ok(id)
    }

    async fn inspect_service(&self, name: &str) -> Result<Option<ServiceInfo>, ServiceError> {
        Ok(self.state.lock().services.get(name).cloned())
    }

    async fn update_service(
        &self,
        id: &ServiceId,
        version: u64,
        spec: &ServiceSpec,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        let live = state
            .services
            .values_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
        if live.version != version {
            return Err(ServiceError::OutOfSequence(id.to_string()));
        }
        live.version += 1;
        live.spec = spec.clone();
        state.updates.push(spec.clone());
        Ok(())
    }

    async fn remove_service(&self, name: &str) -> Result<bool, ServiceError> {
        let mut state = self.state.lock();
        state.removed.push(name.to_string());
        Ok(state.services.remove(name).is_some())
    }

    async fn list_tasks(&self, service: &str) -> Result<Vec<TaskSummary>, ServiceError> {
        let state = self.state.lock();
        if let Some(tasks) = state.tasks.get(service) {
            return Ok(tasks.clone());
        }
        Ok(match state.services.get(service) {
            Some(info) => vec![running_task(
                &format!("{}-task", info.id),
                "node-1",
                &format!("{}-ctr", info.id),
            )],
            None => Vec::new(),
        })
    }
}

#[async_trait]
impl NodeOps for FakeEngine {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, NodeError> {
        let leaderless = self.state.lock().leaderless;
        Ok(vec![
            NodeInfo {
                id: NodeId::new("node-1".to_string()),
                hostname: "manager".to_string(),
                address: "10.0.0.1".to_string(),
                is_manager: true,
                is_leader: !leaderless,
                ready: true,
            },
            NodeInfo {
                id: NodeId::new("node-2".to_string()),
                hostname: "worker".to_string(),
                address: "10.0.0.2".to_string(),
                is_manager: false,
                is_leader: false,
                ready: true,
            },
        ])
    }
}

#[async_trait]
impl ImageOps for FakeEngine {
    async fn build_image(&self, request: BuildRequest) -> Result<ProgressStream, ImageError> {
        let (delay, error) = {
            let mut state = self.state.lock();
            state.builds.push(request.clone());
            (state.build_delay, state.build_error.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut chunks = vec![ProgressChunk::Log(format!(
            "Step 1/1 : building {}\n",
            request.tag
        ))];
        match error {
            Some(message) => chunks.push(ProgressChunk::Error(message)),
            None => chunks.push(ProgressChunk::Log(format!(
                "Successfully tagged {}\n",
                request.tag
            ))),
        }
        Ok(stream(chunks))
    }

    async fn push_image(
        &self,
        reference: &ImageRef,
        _auth: Option<&RegistryAuth>,
    ) -> Result<ProgressStream, ImageError> {
        let mut state = self.state.lock();
        state.pushes.push(reference.to_string());
        Ok(match state.push_error.clone() {
            Some(message) => stream(vec![ProgressChunk::Error(message)]),
            None => stream(vec![ProgressChunk::Log(format!("pushed {}\n", reference))]),
        })
    }

    async fn pull_image(
        &self,
        reference: &ImageRef,
        _auth: Option<&RegistryAuth>,
    ) -> Result<ProgressStream, ImageError> {
        self.state.lock().pulls.push(reference.to_string());
        Ok(stream(vec![ProgressChunk::Log(format!(
            "pulled {}\n",
            reference
        ))]))
    }

    async fn tag_image(&self, source: &ImageRef, target: &ImageRef) -> Result<(), ImageError> {
        self.state
            .lock()
            .tags
            .push((source.to_string(), target.to_string()));
        Ok(())
    }

    async fn prune_dangling_images(&self) -> Result<u64, ImageError> {
        self.state.lock().prunes += 1;
        Ok(0)
    }
}

#[async_trait]
impl SecretOps for FakeEngine {
    async fn find_secret(&self, name: &str) -> Result<Option<SecretId>, SecretError> {
        Ok(self.state.lock().secrets.get(name).cloned())
    }

    async fn create_secret(
        &self,
        name: &str,
        _data: &[u8],
        _labels: &HashMap<String, String>,
    ) -> Result<SecretId, SecretError> {
        let mut state = self.state.lock();
        if state.secrets.contains_key(name) {
            return Err(SecretError::AlreadyExists(name.to_string()));
        }
        let id = SecretId::new(format!("secret-{}", name));
        state.secrets.insert(name.to_string(), id.clone());
        Ok(id)
    }
}

#[async_trait]
impl NetworkOps for FakeEngine {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        self.state.lock().networks.push(config.name.clone());
        Ok(NetworkId::new(format!("net-{}", config.name)))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        Ok(self.state.lock().networks.iter().any(|n| n == name))
    }
}

#[async_trait]
impl ExecOps for FakeEngine {
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        let mut state = self.state.lock();
        state
            .execs
            .push((container.to_string(), config.cmd.clone()));
        let exit_code = state.exec_exit_code;
        Ok(ExecResult {
            exit_code,
            stdout: Vec::new(),
            stderr: if exit_code == 0 {
                Vec::new()
            } else {
                b"nginx: [emerg] invalid config".to_vec()
            },
        })
    }
}

/// Global-mode service spec, which cannot be scaled.
#[allow(dead_code)]
pub fn global_spec(name: &str) -> ServiceSpec {
    ServiceSpec {
        name: name.to_string(),
        image: "nginx:latest".to_string(),
        mode: ServiceMode::Global,
        ..Default::default()
    }
}
