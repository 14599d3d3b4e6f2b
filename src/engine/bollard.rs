// ABOUTME: Bollard-based engine implementation.
// ABOUTME: Talks to a Docker engine in swarm mode through its remote API socket.

use crate::engine::error::{ConnectSnafu, EngineError, NotManagerSnafu, UnreachableSnafu};
use crate::engine::traits::{
    BuildRequest, ExecConfig, ExecError, ExecOps, ExecResult, ImageError, ImageOps, MountKind,
    NetworkConfig, NetworkError, NetworkOps, NodeError, NodeInfo, NodeOps, ProgressChunk,
    ProgressStream, Protocol, PublishedPort, RegistryAuth, SecretError, SecretOps,
    SecretReference, ServiceError, ServiceInfo, ServiceMode, ServiceMount, ServiceOps,
    ServiceSpec, TaskState, TaskSummary,
};
use crate::types::{ContainerId, ImageRef, NetworkId, NodeId, SecretId, ServiceId};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::models::{
    EndpointPortConfig, EndpointPortConfigProtocolEnum, EndpointSpec, Mount, MountTypeEnum,
    NetworkAttachmentConfig, NetworkCreateRequest, SecretSpec, ServiceSpecMode,
    ServiceSpecModeReplicated, TaskSpec, TaskSpecContainerSpec, TaskSpecContainerSpecFile,
    TaskSpecContainerSpecSecrets, TaskSpecPlacement,
};
use bollard::query_parameters::{
    BuildImageOptions, CreateImageOptions, InspectNetworkOptions, InspectServiceOptions,
    ListNodesOptions, ListSecretsOptions, ListTasksOptions, PruneImagesOptions, PushImageOptions,
    TagImageOptions, UpdateServiceOptions,
};
use futures::StreamExt;
use serde::Serialize;
use snafu::ResultExt;
use std::collections::HashMap;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn status_of(e: &bollard::errors::Error) -> Option<(u16, &str)> {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.as_str())),
        _ => None,
    }
}

fn map_service_error(e: bollard::errors::Error, service: &str) -> ServiceError {
    match status_of(&e) {
        Some((404, _)) => ServiceError::NotFound(service.to_string()),
        Some((409, message)) if message.contains("update out of sequence") => {
            ServiceError::OutOfSequence(message.to_string())
        }
        Some((409, message)) => ServiceError::AlreadyExists(message.to_string()),
        Some((400, message)) => ServiceError::InvalidSpec(message.to_string()),
        _ => ServiceError::Runtime(format!("{}: {}", service, e)),
    }
}

fn map_node_error(e: bollard::errors::Error) -> NodeError {
    match status_of(&e) {
        Some((503, message)) => NodeError::NotInCluster(message.to_string()),
        _ => NodeError::Runtime(e.to_string()),
    }
}

fn map_image_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match status_of(&e) {
        Some((404, _)) => ImageError::NotFound(image_name.to_string()),
        Some((401, _)) | Some((403, _)) => {
            ImageError::AuthenticationFailed(image_name.to_string())
        }
        _ => ImageError::Runtime(format!("{}: {}", image_name, e)),
    }
}

fn map_secret_error(e: bollard::errors::Error, name: &str) -> SecretError {
    match status_of(&e) {
        Some((404, _)) => SecretError::NotFound(name.to_string()),
        Some((409, _)) => SecretError::AlreadyExists(name.to_string()),
        _ => SecretError::Runtime(format!("{}: {}", name, e)),
    }
}

fn map_network_create_error(e: bollard::errors::Error) -> NetworkError {
    match status_of(&e) {
        Some((409, message)) => NetworkError::AlreadyExists(message.to_string()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_exec_error(e: bollard::errors::Error) -> ExecError {
    match status_of(&e) {
        Some((404, message)) => ExecError::ContainerNotFound(message.to_string()),
        Some((409, message)) => ExecError::ContainerNotRunning(message.to_string()),
        _ => ExecError::Runtime(e.to_string()),
    }
}

fn credentials(auth: &RegistryAuth) -> DockerCredentials {
    DockerCredentials {
        username: Some(auth.username.clone()),
        password: Some(auth.password.clone()),
        serveraddress: auth.server.clone(),
        ..Default::default()
    }
}

// =============================================================================
// Progress Normalization
// =============================================================================

/// Normalize one streamed build/push/pull message.
///
/// Messages are read through their JSON form (`stream`, `status`, `error`,
/// `errorDetail`) so build, push and pull info share one code path.
fn progress_chunk<T: Serialize>(info: &T) -> Option<ProgressChunk> {
    let value = serde_json::to_value(info).ok()?;
    let text = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let detail = value
        .get("errorDetail")
        .and_then(|d| d.get("message"))
        .and_then(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if let Some(error) = detail.or_else(|| text("error")) {
        return Some(ProgressChunk::Error(error));
    }

    if let Some(stream) = text("stream") {
        return Some(ProgressChunk::Log(stream));
    }

    // Per-layer progress bars are noise; keep only status lines without them.
    let status = text("status")?;
    match (text("id"), text("progress")) {
        (_, Some(_)) => None,
        (Some(id), None) => Some(ProgressChunk::Log(format!("{}: {}\n", id, status))),
        (None, None) => Some(ProgressChunk::Log(format!("{}\n", status))),
    }
}

fn into_progress<S, T>(stream: S) -> ProgressStream
where
    S: futures::Stream<Item = Result<T, bollard::errors::Error>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    Box::pin(stream.filter_map(|item| async move {
        match item {
            Ok(info) => progress_chunk(&info).map(Ok),
            Err(bollard::errors::Error::DockerStreamError { error }) => {
                Some(Ok(ProgressChunk::Error(error)))
            }
            Err(e) => Some(Err(e.to_string())),
        }
    }))
}

// =============================================================================
// Spec Conversion
// =============================================================================

fn task_state(state: Option<bollard::models::TaskState>) -> TaskState {
    use bollard::models::TaskState as S;
    match state {
        Some(S::RUNNING) => TaskState::Running,
        Some(S::NEW) | Some(S::PENDING) | Some(S::ASSIGNED) | Some(S::ACCEPTED)
        | Some(S::PREPARING) | Some(S::READY) | Some(S::STARTING) => TaskState::Pending,
        Some(S::COMPLETE) => TaskState::Complete,
        Some(S::FAILED) | Some(S::REJECTED) => TaskState::Failed,
        Some(S::SHUTDOWN) => TaskState::Shutdown,
        _ => TaskState::Other,
    }
}

fn to_engine_protocol(protocol: Protocol) -> EndpointPortConfigProtocolEnum {
    match protocol {
        Protocol::Tcp => EndpointPortConfigProtocolEnum::TCP,
        Protocol::Udp => EndpointPortConfigProtocolEnum::UDP,
    }
}

/// Read the fields we manage out of an engine spec.
fn from_engine_spec(spec: bollard::models::ServiceSpec) -> ServiceSpec {
    let task = spec.task_template.unwrap_or_default();
    let container = task.container_spec.unwrap_or_default();

    let mode = match spec.mode {
        Some(ServiceSpecMode {
            global: Some(_), ..
        }) => ServiceMode::Global,
        Some(ServiceSpecMode {
            replicated: Some(replicated),
            ..
        }) => ServiceMode::Replicated {
            replicas: replicated.replicas.unwrap_or(1).max(0) as u64,
        },
        _ => ServiceMode::default(),
    };

    let ports = spec
        .endpoint_spec
        .and_then(|e| e.ports)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| {
            Some(PublishedPort {
                target: u16::try_from(p.target_port?).ok()?,
                published: u16::try_from(p.published_port?).ok()?,
                protocol: match p.protocol {
                    Some(EndpointPortConfigProtocolEnum::UDP) => Protocol::Udp,
                    _ => Protocol::Tcp,
                },
            })
        })
        .collect();

    let mounts = container
        .mounts
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| {
            let kind = match m.typ {
                Some(MountTypeEnum::BIND) => MountKind::Bind,
                Some(MountTypeEnum::VOLUME) => MountKind::Volume,
                _ => return None,
            };
            Some(ServiceMount {
                kind,
                source: m.source?,
                target: m.target?,
            })
        })
        .collect();

    let secrets = container
        .secrets
        .unwrap_or_default()
        .into_iter()
        .filter_map(|s| {
            let secret_name = s.secret_name?;
            Some(SecretReference {
                secret_id: SecretId::new(s.secret_id?),
                file_name: s
                    .file
                    .and_then(|f| f.name)
                    .unwrap_or_else(|| secret_name.clone()),
                secret_name,
            })
        })
        .collect();

    let networks = task
        .networks
        .or(spec.networks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|n| n.target)
        .collect();

    ServiceSpec {
        name: spec.name.unwrap_or_default(),
        image: container.image.unwrap_or_default(),
        labels: spec.labels.unwrap_or_default().into_iter().collect(),
        container_labels: container.labels.unwrap_or_default().into_iter().collect(),
        mode,
        env: container.env.unwrap_or_default(),
        constraints: task
            .placement
            .and_then(|p| p.constraints)
            .unwrap_or_default(),
        ports,
        mounts,
        networks,
        secrets,
    }
}

/// Write the fields we manage onto an engine spec, leaving everything else
/// (resources, restart policy, update config, ...) as the engine has it.
fn apply_to_engine_spec(
    target: &mut bollard::models::ServiceSpec,
    spec: &ServiceSpec,
) -> Result<(), ServiceError> {
    target.name = Some(spec.name.clone());
    target.labels = Some(spec.labels.clone().into_iter().collect());

    if let ServiceMode::Replicated { replicas } = spec.mode {
        let replicas = i64::try_from(replicas).map_err(|_| {
            ServiceError::InvalidSpec(format!("{} replicas for {}", replicas, spec.name))
        })?;
        target.mode = Some(ServiceSpecMode {
            replicated: Some(ServiceSpecModeReplicated {
                replicas: Some(replicas),
            }),
            ..Default::default()
        });
    }

    let mut endpoint = target.endpoint_spec.take().unwrap_or_default();
    endpoint.ports = Some(
        spec.ports
            .iter()
            .map(|p| EndpointPortConfig {
                protocol: Some(to_engine_protocol(p.protocol)),
                target_port: Some(p.target as i64),
                published_port: Some(p.published as i64),
                ..Default::default()
            })
            .collect(),
    );
    target.endpoint_spec = Some(endpoint);

    // Networks live on the task template; the service-level field is deprecated.
    target.networks = None;

    let task = target.task_template.get_or_insert_with(TaskSpec::default);
    task.networks = Some(
        spec.networks
            .iter()
            .map(|name| NetworkAttachmentConfig {
                target: Some(name.clone()),
                ..Default::default()
            })
            .collect(),
    );

    let placement = task.placement.get_or_insert_with(TaskSpecPlacement::default);
    placement.constraints = Some(spec.constraints.clone());

    let container = task
        .container_spec
        .get_or_insert_with(TaskSpecContainerSpec::default);
    container.image = Some(spec.image.clone());
    container.labels = Some(spec.container_labels.clone().into_iter().collect());
    container.env = Some(spec.env.clone());
    container.mounts = Some(
        spec.mounts
            .iter()
            .map(|m| Mount {
                typ: Some(match m.kind {
                    MountKind::Bind => MountTypeEnum::BIND,
                    MountKind::Volume => MountTypeEnum::VOLUME,
                }),
                source: Some(m.source.clone()),
                target: Some(m.target.clone()),
                ..Default::default()
            })
            .collect(),
    );
    container.secrets = Some(
        spec.secrets
            .iter()
            .map(|s| TaskSpecContainerSpecSecrets {
                file: Some(TaskSpecContainerSpecFile {
                    name: Some(s.file_name.clone()),
                    uid: Some("0".to_string()),
                    gid: Some("0".to_string()),
                    mode: Some(0o444),
                }),
                secret_id: Some(s.secret_id.to_string()),
                secret_name: Some(s.secret_name.clone()),
            })
            .collect(),
    );
    Ok(())
}

// =============================================================================
// BollardEngine
// =============================================================================

/// Engine implementation using bollard.
pub struct BollardEngine {
    client: Docker,
    socket_path: String,
}

impl BollardEngine {
    /// Create a new engine client from an existing Docker client.
    pub fn new(client: Docker, socket_path: impl Into<String>) -> Self {
        Self {
            client,
            socket_path: socket_path.into(),
        }
    }

    /// Connect to the engine listening on a unix socket.
    pub fn connect(socket_path: &str) -> Result<Self, EngineError> {
        let client = Docker::connect_with_unix(socket_path, 120, bollard::API_DEFAULT_VERSION)
            .context(ConnectSnafu {
                socket: socket_path,
            })?;
        Ok(Self::new(client, socket_path))
    }

    /// Check that the engine answers and manages a swarm.
    pub async fn verify(&self) -> Result<(), EngineError> {
        let info = self.client.info().await.context(UnreachableSnafu {
            socket: self.socket_path.clone(),
        })?;
        let is_manager = info
            .swarm
            .and_then(|swarm| swarm.control_available)
            .unwrap_or(false);
        if !is_manager {
            return NotManagerSnafu {
                socket: self.socket_path.clone(),
            }
            .fail();
        }
        Ok(())
    }

    async fn inspect_raw(
        &self,
        name: &str,
    ) -> Result<Option<bollard::models::Service>, ServiceError> {
        match self
            .client
            .inspect_service(name, None::<InspectServiceOptions>)
            .await
        {
            Ok(service) => Ok(Some(service)),
            Err(e) if matches!(status_of(&e), Some((404, _))) => Ok(None),
            Err(e) => Err(map_service_error(e, name)),
        }
    }
}

#[async_trait]
impl ServiceOps for BollardEngine {
    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceId, ServiceError> {
        let mut engine_spec = bollard::models::ServiceSpec::default();
        apply_to_engine_spec(&mut engine_spec, spec)?;

        self.client
            .create_service(engine_spec, None)
            .await
            .map_err(|e| map_service_error(e, &spec.name))?;

        // Read the id back by name; the create response shape differs across API versions.
        let created = self
            .inspect_raw(&spec.name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(spec.name.clone()))?;
        ServiceId::from_engine(created.id).ok_or_else(|| {
            ServiceError::Runtime(format!("engine returned no id for {}", spec.name))
        })
    }

    async fn inspect_service(&self, name: &str) -> Result<Option<ServiceInfo>, ServiceError> {
        let Some(service) = self.inspect_raw(name).await? else {
            return Ok(None);
        };
        Ok(Some(ServiceInfo {
            id: ServiceId::new(service.id.unwrap_or_default()),
            version: service.version.and_then(|v| v.index).unwrap_or(0),
            spec: from_engine_spec(service.spec.unwrap_or_default()),
        }))
    }

    async fn update_service(
        &self,
        id: &ServiceId,
        version: u64,
        spec: &ServiceSpec,
    ) -> Result<(), ServiceError> {
        let live = self
            .inspect_raw(id.as_str())
            .await?
            .ok_or_else(|| ServiceError::NotFound(spec.name.clone()))?;
        let mut engine_spec = live.spec.unwrap_or_default();
        apply_to_engine_spec(&mut engine_spec, spec)?;

        let opts = UpdateServiceOptions {
            version: version as i32,
            ..Default::default()
        };

        self.client
            .update_service(id.as_str(), engine_spec, opts, None)
            .await
            .map_err(|e| map_service_error(e, &spec.name))?;
        Ok(())
    }

    async fn remove_service(&self, name: &str) -> Result<bool, ServiceError> {
        match self.client.delete_service(name).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(status_of(&e), Some((404, _))) => Ok(false),
            Err(e) => Err(map_service_error(e, name)),
        }
    }

    async fn list_tasks(&self, service: &str) -> Result<Vec<TaskSummary>, ServiceError> {
        let mut filters = HashMap::new();
        filters.insert("service".to_string(), vec![service.to_string()]);
        let opts = ListTasksOptions {
            filters: Some(filters),
        };

        let tasks = self
            .client
            .list_tasks(Some(opts))
            .await
            .map_err(|e| map_service_error(e, service))?;

        Ok(tasks
            .into_iter()
            .map(|task| {
                let status = task.status.unwrap_or_default();
                TaskSummary {
                    id: task.id.unwrap_or_default(),
                    node_id: NodeId::from_engine(task.node_id),
                    container_id: ContainerId::from_engine(
                        status.container_status.and_then(|c| c.container_id),
                    ),
                    state: task_state(status.state),
                    desired_running: task_state(task.desired_state) == TaskState::Running,
                }
            })
            .collect())
    }
}

#[async_trait]
impl NodeOps for BollardEngine {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, NodeError> {
        let nodes = self
            .client
            .list_nodes(None::<ListNodesOptions>)
            .await
            .map_err(map_node_error)?;

        Ok(nodes
            .into_iter()
            .map(|node| {
                let status = node.status.unwrap_or_default();
                let manager = node.manager_status;
                NodeInfo {
                    id: NodeId::new(node.id.unwrap_or_default()),
                    hostname: node
                        .description
                        .and_then(|d| d.hostname)
                        .unwrap_or_default(),
                    address: status.addr.clone().unwrap_or_default(),
                    is_manager: manager.is_some(),
                    is_leader: manager.and_then(|m| m.leader).unwrap_or(false),
                    ready: status.state == Some(bollard::models::NodeState::READY),
                }
            })
            .collect())
    }
}

#[async_trait]
impl ImageOps for BollardEngine {
    async fn build_image(&self, request: BuildRequest) -> Result<ProgressStream, ImageError> {
        let opts = BuildImageOptions {
            dockerfile: request.dockerfile.clone(),
            t: Some(request.tag.clone()),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let auth: HashMap<String, DockerCredentials> = request
            .registry_auth
            .iter()
            .map(|(server, auth)| (server.clone(), credentials(auth)))
            .collect();

        tracing::debug!("building {} ({} byte context)", request.tag, request.context.len());
        let stream = self.client.build_image(
            opts,
            if auth.is_empty() { None } else { Some(auth) },
            Some(bollard::body_full(request.context)),
        );
        Ok(into_progress(stream))
    }

    async fn push_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<ProgressStream, ImageError> {
        let opts = PushImageOptions {
            tag: reference.tag().map(str::to_string),
            ..Default::default()
        };
        let stream =
            self.client
                .push_image(&reference.repository(), Some(opts), auth.map(credentials));
        Ok(into_progress(stream))
    }

    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<ProgressStream, ImageError> {
        let opts = CreateImageOptions {
            from_image: Some(reference.to_string()),
            ..Default::default()
        };
        let stream = self
            .client
            .create_image(Some(opts), None, auth.map(credentials));
        Ok(into_progress(stream))
    }

    async fn tag_image(&self, source: &ImageRef, target: &ImageRef) -> Result<(), ImageError> {
        let opts = TagImageOptions {
            repo: Some(target.repository()),
            tag: target.tag().map(str::to_string),
        };
        self.client
            .tag_image(&source.to_string(), Some(opts))
            .await
            .map_err(|e| map_image_error(e, &source.to_string()))
    }

    async fn prune_dangling_images(&self) -> Result<u64, ImageError> {
        let mut filters = HashMap::new();
        filters.insert("dangling".to_string(), vec!["true".to_string()]);
        let opts = PruneImagesOptions {
            filters: Some(filters),
        };
        let response = self
            .client
            .prune_images(Some(opts))
            .await
            .map_err(|e| ImageError::Runtime(e.to_string()))?;
        Ok(response.space_reclaimed.unwrap_or(0).max(0) as u64)
    }
}

#[async_trait]
impl SecretOps for BollardEngine {
    async fn find_secret(&self, name: &str) -> Result<Option<SecretId>, SecretError> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![name.to_string()]);
        let opts = ListSecretsOptions {
            filters: Some(filters),
        };

        let secrets = self
            .client
            .list_secrets(Some(opts))
            .await
            .map_err(|e| map_secret_error(e, name))?;

        // The name filter matches prefixes, so compare exactly.
        Ok(secrets
            .into_iter()
            .find(|s| s.spec.as_ref().and_then(|spec| spec.name.as_deref()) == Some(name))
            .and_then(|s| s.id)
            .map(SecretId::new))
    }

    async fn create_secret(
        &self,
        name: &str,
        data: &[u8],
        labels: &HashMap<String, String>,
    ) -> Result<SecretId, SecretError> {
        let spec = SecretSpec {
            name: Some(name.to_string()),
            labels: Some(labels.clone()),
            data: Some(STANDARD.encode(data)),
            ..Default::default()
        };
        let response = self
            .client
            .create_secret(spec)
            .await
            .map_err(|e| map_secret_error(e, name))?;
        Ok(SecretId::new(response.id))
    }
}

#[async_trait]
impl NetworkOps for BollardEngine {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let opts = NetworkCreateRequest {
            name: config.name.clone(),
            driver: config.driver.clone(),
            attachable: Some(config.attachable),
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            ..Default::default()
        };

        let response = self
            .client
            .create_network(opts)
            .await
            .map_err(map_network_create_error)?;

        Ok(NetworkId::new(response.id))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        match self
            .client
            .inspect_network(name, None::<InspectNetworkOptions>)
            .await
        {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(NetworkError::Runtime(e.to_string())),
        }
    }
}

#[async_trait]
impl ExecOps for BollardEngine {
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        let opts = bollard::models::ExecConfig {
            cmd: Some(config.cmd.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let created = self
            .client
            .create_exec(container.as_str(), opts)
            .await
            .map_err(map_exec_error)?;

        let started = self
            .client
            .start_exec(
                &created.id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_exec_error)?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        if let StartExecResults::Attached { mut output, .. } = started {
            while let Some(item) = output.next().await {
                match item {
                    Ok(bollard::container::LogOutput::StdOut { message }) => {
                        stdout.extend(message);
                    }
                    Ok(bollard::container::LogOutput::StdErr { message }) => {
                        stderr.extend(message);
                    }
                    Ok(_) => {}
                    Err(e) => return Err(ExecError::Stream(e.to_string())),
                }
            }
        }

        let details = self
            .client
            .inspect_exec(&created.id)
            .await
            .map_err(map_exec_error)?;

        Ok(ExecResult {
            exit_code: details.exit_code.unwrap_or(0),
            stdout,
            stderr,
        })
    }
}
