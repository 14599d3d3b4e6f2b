// ABOUTME: Application definition, version records and their invariants.
// ABOUTME: Values owned by the persistence layer and passed through the deploy pipeline.

mod source;

pub use source::{GitRepo, Source};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::types::AppName;

/// Violations of [`AppDefinition`] invariants. Raised before any side effect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("duplicate environment variable: {0}")]
    DuplicateEnvKey(String),

    #[error("environment variable key cannot be empty")]
    EmptyEnvKey,

    #[error("volume {0} must set either a host path or a volume name, not both")]
    AmbiguousVolume(String),

    #[error("volume {0} must set a host path or a volume name")]
    IncompleteVolume(String),

    #[error("volumes require an app with persistent data")]
    VolumesWithoutPersistentData,

    #[error("force SSL requires at least one domain with SSL enabled")]
    ForceSslWithoutSsl,

    #[error("node pinning requires an app with persistent data")]
    NodePinWithoutPersistentData,

    #[error("instance count {0} exceeds what the orchestrator accepts")]
    TooManyReplicas(u64),

    #[error("duplicate secret: {0}")]
    DuplicateSecret(String),
}

/// Environment variable entry. Keys are unique within a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

/// Volume mount: either a bind of `host_path` or a named volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub container_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
}

/// Where a volume's data comes from on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeSource<'a> {
    Bind(&'a str),
    Named(&'a str),
}

impl VolumeSpec {
    pub fn source(&self) -> Result<VolumeSource<'_>, ValidationError> {
        match (self.host_path.as_deref(), self.volume_name.as_deref()) {
            (Some(_), Some(_)) => Err(ValidationError::AmbiguousVolume(
                self.container_path.clone(),
            )),
            (Some(path), None) if !path.is_empty() => Ok(VolumeSource::Bind(path)),
            (None, Some(name)) if !name.is_empty() => Ok(VolumeSource::Named(name)),
            _ => Err(ValidationError::IncompleteVolume(self.container_path.clone())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    Tcp,
    Udp,
}

/// Published port. Without a protocol both tcp and udp are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub container_port: u16,
    pub host_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<PortProtocol>,
}

/// Custom domain attached to an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDomain {
    pub domain: String,
    #[serde(default)]
    pub ssl: bool,
}

/// Secret material mounted into the app's containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSecret {
    pub name: String,
    pub value: String,
    /// File name under `/run/secrets`; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Push-webhook credentials, stored encrypted by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushWebhook {
    pub token_version: String,
    pub encrypted_repo_info: String,
}

/// One build attempt. The number is reserved before the build runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn default_replicas() -> u64 {
    1
}

fn default_container_http_port() -> u16 {
    80
}

/// Desired state of one deployed application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDefinition {
    pub name: AppName,
    #[serde(default = "default_replicas")]
    pub instance_count: u64,
    #[serde(default)]
    pub env_vars: Vec<EnvVar>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    #[serde(default)]
    pub has_persistent_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub secrets: Vec<AppSecret>,
    #[serde(default = "default_container_http_port")]
    pub container_http_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_nginx_config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_deploy_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_webhook: Option<PushWebhook>,
    #[serde(default)]
    pub has_default_subdomain_ssl: bool,
    #[serde(default)]
    pub force_ssl: bool,
    #[serde(default)]
    pub custom_domains: Vec<AppDomain>,
    #[serde(default)]
    pub versions: Vec<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_version: Option<u32>,
}

impl AppDefinition {
    /// Fresh definition with defaults, as created on registration.
    pub fn new(name: AppName, has_persistent_data: bool) -> Self {
        Self {
            name,
            instance_count: default_replicas(),
            env_vars: Vec::new(),
            volumes: Vec::new(),
            ports: Vec::new(),
            has_persistent_data,
            node_id: None,
            networks: Vec::new(),
            secrets: Vec::new(),
            container_http_port: default_container_http_port(),
            custom_nginx_config: None,
            pre_deploy_script: None,
            push_webhook: None,
            has_default_subdomain_ssl: false,
            force_ssl: false,
            custom_domains: Vec::new(),
            versions: Vec::new(),
            deployed_version: None,
        }
    }

    /// Check every invariant of the definition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if i64::try_from(self.instance_count).is_err() {
            return Err(ValidationError::TooManyReplicas(self.instance_count));
        }

        let mut keys = HashSet::new();
        for env in &self.env_vars {
            if env.key.is_empty() {
                return Err(ValidationError::EmptyEnvKey);
            }
            if !keys.insert(env.key.as_str()) {
                return Err(ValidationError::DuplicateEnvKey(env.key.clone()));
            }
        }

        if !self.volumes.is_empty() && !self.has_persistent_data {
            return Err(ValidationError::VolumesWithoutPersistentData);
        }
        for volume in &self.volumes {
            volume.source()?;
        }

        if self.node_id.is_some() && !self.has_persistent_data {
            return Err(ValidationError::NodePinWithoutPersistentData);
        }

        if self.force_ssl && !self.any_ssl() {
            return Err(ValidationError::ForceSslWithoutSsl);
        }

        let mut secrets = HashSet::new();
        for secret in &self.secrets {
            if !secrets.insert(secret.name.as_str()) {
                return Err(ValidationError::DuplicateSecret(secret.name.clone()));
            }
        }

        Ok(())
    }

    /// Whether any attached domain (default subdomain included) serves SSL.
    pub fn any_ssl(&self) -> bool {
        self.has_default_subdomain_ssl || self.custom_domains.iter().any(|d| d.ssl)
    }

    /// The version record currently deployed, if any.
    pub fn deployed(&self) -> Option<&Version> {
        let deployed = self.deployed_version?;
        self.versions.iter().find(|v| v.version == deployed)
    }

    /// Next version number; numbers are never reused, even for failed builds.
    pub fn next_version_number(&self) -> u32 {
        self.versions
            .iter()
            .map(|v| v.version + 1)
            .max()
            .unwrap_or(0)
    }
}
