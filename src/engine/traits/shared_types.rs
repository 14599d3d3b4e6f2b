// ABOUTME: Shared types used across engine trait definitions.
// ABOUTME: ServiceSpec, TaskSummary, NodeInfo, BuildRequest, progress streams, exec types.

use crate::types::{ContainerId, NodeId, SecretId, ServiceId};
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;

/// Engine-neutral view of an orchestrator service spec.
///
/// This is also the payload handed to pre-deploy transforms, so it is
/// serializable and every field uses plain data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service name.
    pub name: String,
    /// Image reference the tasks run.
    pub image: String,
    /// Labels on the service object.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Labels on the task containers. Changing them replaces the tasks.
    #[serde(default)]
    pub container_labels: BTreeMap<String, String>,
    /// Scheduling mode.
    #[serde(default)]
    pub mode: ServiceMode,
    /// Environment as `KEY=value` entries.
    #[serde(default)]
    pub env: Vec<String>,
    /// Placement constraints, e.g. `node.id==abc`.
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Published ports.
    #[serde(default)]
    pub ports: Vec<PublishedPort>,
    /// Mounts.
    #[serde(default)]
    pub mounts: Vec<ServiceMount>,
    /// Attached network names.
    #[serde(default)]
    pub networks: Vec<String>,
    /// Attached secrets.
    #[serde(default)]
    pub secrets: Vec<SecretReference>,
}

/// Service scheduling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    Replicated { replicas: u64 },
    Global,
}

impl Default for ServiceMode {
    fn default() -> Self {
        ServiceMode::Replicated { replicas: 1 }
    }
}

/// Network protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

/// Port published by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublishedPort {
    /// Port inside the container.
    pub target: u16,
    /// Port on the cluster.
    pub published: u16,
    pub protocol: Protocol,
}

/// Kind of a service mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    Bind,
    Volume,
}

/// Mount attached to a service's containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMount {
    pub kind: MountKind,
    /// Host path or volume name.
    pub source: String,
    /// Path in the container.
    pub target: String,
}

/// Secret attached to a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReference {
    pub secret_id: SecretId,
    pub secret_name: String,
    /// File name under `/run/secrets`.
    pub file_name: String,
}

/// Live service as reported by the engine.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub id: ServiceId,
    /// Object version index, required for updates.
    pub version: u64,
    pub spec: ServiceSpec,
}

/// Observed task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Complete,
    Failed,
    Shutdown,
    Other,
}

/// One task (scheduled container) of a service.
#[derive(Debug, Clone)]
pub struct TaskSummary {
    pub id: String,
    pub node_id: Option<NodeId>,
    pub container_id: Option<ContainerId>,
    pub state: TaskState,
    /// Whether the orchestrator wants this task running.
    pub desired_running: bool,
}

/// Cluster node.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub hostname: String,
    pub address: String,
    pub is_manager: bool,
    pub is_leader: bool,
    pub ready: bool,
}

/// Configuration for creating a network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name.
    pub name: String,
    /// Network driver (bridge, overlay, etc.).
    pub driver: Option<String>,
    /// Whether standalone containers may attach.
    pub attachable: bool,
    /// Labels.
    pub labels: HashMap<String, String>,
}

impl NetworkConfig {
    /// Attachable overlay network, as used for app-to-app traffic.
    pub fn overlay(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: Some("overlay".to_string()),
            attachable: true,
            labels: HashMap::new(),
        }
    }
}

/// Registry authentication credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    /// Username.
    pub username: String,
    /// Password or token.
    pub password: String,
    /// Registry server (e.g., "ghcr.io").
    pub server: Option<String>,
}

/// Image build request.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Tag applied to the result, e.g. `img-captain--demo:3`.
    pub tag: String,
    /// Build file path inside the context.
    pub dockerfile: String,
    /// Tar archive of the build context.
    pub context: Bytes,
    /// Credentials for base images, keyed by registry server.
    pub registry_auth: HashMap<String, RegistryAuth>,
}

/// A normalized chunk of build/push/pull output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressChunk {
    /// Log output, possibly several lines.
    Log(String),
    /// Error reported inside the stream.
    Error(String),
}

/// Stream of progress chunks; transport failures surface as `Err`.
pub type ProgressStream =
    Pin<Box<dyn Stream<Item = Result<ProgressChunk, String>> + Send + 'static>>;

/// Command run attached inside a container.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub cmd: Vec<String>,
}

impl ExecConfig {
    pub fn command(cmd: &[String]) -> Self {
        Self { cmd: cmd.to_vec() }
    }
}

/// Result of an exec operation.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Exit code.
    pub exit_code: i64,
    /// Standard output.
    pub stdout: Vec<u8>,
    /// Standard error.
    pub stderr: Vec<u8>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
