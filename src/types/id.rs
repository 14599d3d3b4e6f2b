// ABOUTME: Opaque identifiers the orchestrator hands out for services, nodes, containers, secrets and networks.
// ABOUTME: One newtype per object kind so a node id can never be passed where a secret id belongs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the abbreviated form the engine CLI prints.
const SHORT_LEN: usize = 12;

macro_rules! engine_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        #[must_use]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Id from an engine response field; absent and empty both mean "none yet".
            pub fn from_engine(value: Option<String>) -> Option<Self> {
                value.filter(|v| !v.is_empty()).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First twelve characters, for log lines.
            pub fn short(&self) -> &str {
                match self.0.char_indices().nth(SHORT_LEN) {
                    Some((end, _)) => &self.0[..end],
                    None => &self.0,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short())
            }
        }
    };
}

engine_id!(
    /// Orchestrator service id; updates address the service by it.
    ServiceId
);
engine_id!(
    /// Cluster node id, as used in `node.id==` placement constraints.
    NodeId
);
engine_id!(ContainerId);
engine_id!(SecretId);
engine_id!(NetworkId);

impl NodeId {
    /// Placement constraint pinning tasks to this node.
    pub fn constraint(&self) -> String {
        format!("node.id=={}", self.0)
    }
}
