// ABOUTME: Builder for service update payloads.
// ABOUTME: Starts from the live spec and applies one field-level transform per app setting.

use crate::engine::{
    MountKind, Protocol, PublishedPort, SecretReference, ServiceMode, ServiceMount, ServiceSpec,
};
use crate::model::{EnvVar, PortProtocol, PortSpec, ValidationError, VolumeSource, VolumeSpec};
use crate::types::{AppName, Namespace, NodeId};

use super::error::DeployError;

pub const APP_LABEL: &str = "caravel.app";
pub const NAMESPACE_LABEL: &str = "caravel.namespace";
/// Container label set to a fresh value on every update so tasks are replaced.
pub const FORCE_UPDATE_LABEL: &str = "caravel.force-update";

const NODE_ID_CONSTRAINT: &str = "node.id";

/// Orchestrator ports for app port mappings. A mapping without a protocol
/// is published for both tcp and udp.
pub fn expand_ports(ports: &[PortSpec]) -> Vec<PublishedPort> {
    ports
        .iter()
        .flat_map(|port| {
            let protocols: &[Protocol] = match port.protocol {
                Some(PortProtocol::Tcp) => &[Protocol::Tcp],
                Some(PortProtocol::Udp) => &[Protocol::Udp],
                None => &[Protocol::Tcp, Protocol::Udp],
            };
            protocols.iter().map(move |&protocol| PublishedPort {
                target: port.container_port,
                published: port.host_port,
                protocol,
            })
        })
        .collect()
}

fn is_node_pin(constraint: &str) -> bool {
    let compact: String = constraint.chars().filter(|c| !c.is_whitespace()).collect();
    compact.starts_with(&format!("{}==", NODE_ID_CONSTRAINT))
}

/// Service spec being prepared for an update.
#[derive(Debug, Clone)]
pub struct ServiceDraft {
    spec: ServiceSpec,
}

impl ServiceDraft {
    pub fn from_live(spec: ServiceSpec) -> Self {
        Self { spec }
    }

    pub fn image(mut self, image: &str) -> Self {
        self.spec.image = image.to_string();
        self
    }

    pub fn labels(mut self, namespace: &Namespace, app: &AppName) -> Self {
        self.spec
            .labels
            .insert(NAMESPACE_LABEL.to_string(), namespace.to_string());
        self.spec
            .labels
            .insert(APP_LABEL.to_string(), app.to_string());
        self
    }

    pub fn replicas(mut self, count: u64) -> Result<Self, DeployError> {
        match self.spec.mode {
            ServiceMode::Replicated { .. } => {
                self.spec.mode = ServiceMode::Replicated { replicas: count };
                Ok(self)
            }
            ServiceMode::Global => Err(DeployError::NotReplicated(self.spec.name)),
        }
    }

    /// Replace any node pin; other constraints are kept.
    pub fn placement(mut self, node_id: Option<&str>) -> Self {
        self.spec.constraints.retain(|c| !is_node_pin(c));
        if let Some(node) = node_id.filter(|n| !n.is_empty()) {
            self.spec.constraints.push(NodeId::new(node).constraint());
        }
        self
    }

    pub fn env(mut self, vars: &[EnvVar]) -> Self {
        self.spec.env = vars
            .iter()
            .map(|v| format!("{}={}", v.key, v.value))
            .collect();
        self
    }

    pub fn ports(mut self, ports: &[PortSpec]) -> Self {
        self.spec.ports = expand_ports(ports);
        self
    }

    /// Named volumes are prefixed with the namespace.
    pub fn volumes(
        mut self,
        namespace: &Namespace,
        volumes: &[VolumeSpec],
        has_persistent_data: bool,
    ) -> Result<Self, DeployError> {
        if !volumes.is_empty() && !has_persistent_data {
            return Err(ValidationError::VolumesWithoutPersistentData.into());
        }

        self.spec.mounts = volumes
            .iter()
            .map(|volume| {
                let (kind, source) = match volume.source()? {
                    VolumeSource::Bind(path) => (MountKind::Bind, path.to_string()),
                    VolumeSource::Named(name) => (MountKind::Volume, namespace.volume_name(name)),
                };
                Ok(ServiceMount {
                    kind,
                    source,
                    target: volume.container_path.clone(),
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Ok(self)
    }

    /// Replace the network list, dropping duplicates but keeping order.
    pub fn networks<I, S>(mut self, networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for network in networks {
            let network = network.into();
            if !list.contains(&network) {
                list.push(network);
            }
        }
        self.spec.networks = list;
        self
    }

    /// Update attached secrets by id and append new ones.
    pub fn secrets(mut self, secrets: Vec<SecretReference>) -> Self {
        for secret in secrets {
            match self
                .spec
                .secrets
                .iter_mut()
                .find(|s| s.secret_id == secret.secret_id)
            {
                Some(existing) => *existing = secret,
                None => self.spec.secrets.push(secret),
            }
        }
        self
    }

    /// Make the spec differ from the live one so the orchestrator replaces tasks.
    pub fn force_update(mut self) -> Self {
        self.spec.container_labels.insert(
            FORCE_UPDATE_LABEL.to_string(),
            uuid::Uuid::new_v4().to_string(),
        );
        self
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    pub fn into_spec(self) -> ServiceSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SecretId;
    use proptest::prelude::*;

    fn live() -> ServiceSpec {
        ServiceSpec {
            name: "srv-captain--demo".into(),
            image: "img-captain--demo:0".into(),
            constraints: vec!["node.role==worker".into(), "node.id == old".into()],
            ..Default::default()
        }
    }

    #[test]
    fn explicit_protocol_is_not_expanded() {
        let ports = expand_ports(&[PortSpec {
            container_port: 53,
            host_port: 5353,
            protocol: Some(PortProtocol::Udp),
        }]);
        assert_eq!(
            ports,
            vec![PublishedPort {
                target: 53,
                published: 5353,
                protocol: Protocol::Udp
            }]
        );
    }

    #[test]
    fn placement_replaces_only_node_pin() {
        let spec = ServiceDraft::from_live(live())
            .placement(Some("abc"))
            .into_spec();
        assert_eq!(spec.constraints, vec!["node.role==worker", "node.id==abc"]);

        let spec = ServiceDraft::from_live(live()).placement(None).into_spec();
        assert_eq!(spec.constraints, vec!["node.role==worker"]);
    }

    #[test]
    fn global_services_cannot_be_scaled() {
        let mut spec = live();
        spec.mode = ServiceMode::Global;
        assert!(matches!(
            ServiceDraft::from_live(spec).replicas(2),
            Err(DeployError::NotReplicated(_))
        ));
    }

    #[test]
    fn named_volumes_are_namespaced() {
        let ns = Namespace::new("captain").unwrap();
        let spec = ServiceDraft::from_live(live())
            .volumes(
                &ns,
                &[
                    VolumeSpec {
                        container_path: "/data".into(),
                        host_path: None,
                        volume_name: Some("data".into()),
                    },
                    VolumeSpec {
                        container_path: "/logs".into(),
                        host_path: Some("/srv/logs".into()),
                        volume_name: None,
                    },
                ],
                true,
            )
            .unwrap()
            .into_spec();

        assert_eq!(spec.mounts[0].kind, MountKind::Volume);
        assert_eq!(spec.mounts[0].source, "captain--data");
        assert_eq!(spec.mounts[1].kind, MountKind::Bind);
        assert_eq!(spec.mounts[1].source, "/srv/logs");
    }

    #[test]
    fn volumes_need_persistent_data() {
        let ns = Namespace::new("captain").unwrap();
        let result = ServiceDraft::from_live(live()).volumes(
            &ns,
            &[VolumeSpec {
                container_path: "/data".into(),
                host_path: None,
                volume_name: Some("data".into()),
            }],
            false,
        );
        assert!(matches!(
            result,
            Err(DeployError::Validation(
                ValidationError::VolumesWithoutPersistentData
            ))
        ));
    }

    #[test]
    fn secrets_merge_by_id() {
        let secret = |id: &str, file: &str| SecretReference {
            secret_id: SecretId::new(id.to_string()),
            secret_name: format!("captain--{id}"),
            file_name: file.into(),
        };
        let mut spec = live();
        spec.secrets = vec![secret("a", "old"), secret("b", "b")];

        let spec = ServiceDraft::from_live(spec)
            .secrets(vec![secret("a", "new"), secret("c", "c")])
            .into_spec();

        let files: Vec<_> = spec.secrets.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(files, vec!["new", "b", "c"]);
    }

    #[test]
    fn force_update_changes_container_labels() {
        let first = ServiceDraft::from_live(live()).force_update().into_spec();
        let second = ServiceDraft::from_live(first.clone())
            .force_update()
            .into_spec();
        assert_ne!(
            first.container_labels.get(FORCE_UPDATE_LABEL),
            second.container_labels.get(FORCE_UPDATE_LABEL)
        );
    }

    fn protocol() -> impl Strategy<Value = Option<PortProtocol>> {
        prop_oneof![
            Just(None),
            Just(Some(PortProtocol::Tcp)),
            Just(Some(PortProtocol::Udp)),
        ]
    }

    proptest! {
        #[test]
        fn every_mapping_is_published_once_per_protocol(
            specs in proptest::collection::vec((any::<u16>(), any::<u16>(), protocol()), 0..8)
        ) {
            let ports: Vec<PortSpec> = specs
                .iter()
                .map(|&(container_port, host_port, protocol)| PortSpec {
                    container_port,
                    host_port,
                    protocol,
                })
                .collect();
            let published = expand_ports(&ports);

            let expected: usize = ports
                .iter()
                .map(|p| if p.protocol.is_some() { 1 } else { 2 })
                .sum();
            prop_assert_eq!(published.len(), expected);
            for port in &ports {
                prop_assert!(published
                    .iter()
                    .any(|p| p.target == port.container_port && p.published == port.host_port));
            }
        }
    }
}
