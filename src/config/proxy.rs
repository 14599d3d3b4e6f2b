// ABOUTME: Reverse proxy configuration.
// ABOUTME: Where generated config lands, where certificates live and how the proxy reloads.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::PathBuf;

use super::deserialize::{deserialize_command, deserialize_optional_path};

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Per-namespace files are written as `<config_dir>/<namespace>.conf`.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    #[serde(default = "default_root_config")]
    pub root_config: PathBuf,

    #[serde(default = "default_certs_dir")]
    pub certs_dir: PathBuf,

    /// Orchestrator service running the proxy. No reload signal is sent when unset.
    #[serde(default = "default_service")]
    pub service: Option<String>,

    #[serde(
        default = "default_reload_command",
        deserialize_with = "deserialize_command"
    )]
    pub reload_command: NonEmpty<String>,

    /// Template file for per-app server blocks; a built-in one is used when unset.
    #[serde(default, deserialize_with = "deserialize_optional_path")]
    pub app_template: Option<PathBuf>,

    /// Sub-domain of the root domain that fronts the registry, if any.
    #[serde(default)]
    pub registry_subdomain: Option<String>,

    /// Whether the root domain itself serves SSL.
    #[serde(default)]
    pub root_ssl: bool,
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("/etc/caravel/nginx/conf.d")
}

fn default_root_config() -> PathBuf {
    PathBuf::from("/etc/caravel/nginx/root.conf")
}

fn default_certs_dir() -> PathBuf {
    PathBuf::from("/etc/caravel/certs")
}

fn default_service() -> Option<String> {
    Some("caravel-nginx".to_string())
}

fn default_reload_command() -> NonEmpty<String> {
    NonEmpty::from((
        "nginx".to_string(),
        vec!["-s".to_string(), "reload".to_string()],
    ))
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            config_dir: default_config_dir(),
            root_config: default_root_config(),
            certs_dir: default_certs_dir(),
            service: default_service(),
            reload_command: default_reload_command(),
            app_template: None,
            registry_subdomain: None,
            root_ssl: false,
        }
    }
}
