// ABOUTME: Container engine connection configuration.
// ABOUTME: Socket path, lookup retry policy and the overlay network apps join.

use crate::engine::RetryPolicy;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_socket")]
    pub socket: String,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Overlay network every app service is attached to.
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_socket() -> String {
    "/var/run/docker.sock".to_string()
}

fn default_network() -> String {
    "caravel-overlay".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            socket: default_socket(),
            retry: RetryPolicy::default(),
            network: default_network(),
        }
    }
}
