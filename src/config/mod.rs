// ABOUTME: Configuration types and parsing for caravel.yml.
// ABOUTME: Handles YAML parsing, discovery, env var interpolation and section defaults.

mod build;
mod deserialize;
mod engine;
mod env_value;
mod init;
mod proxy;
mod registry;

pub use build::BuildConfig;
pub use engine::EngineConfig;
pub use env_value::EnvValue;
pub use init::init_config;
pub use proxy::ProxyConfig;
pub use registry::RegistryConfig;

use crate::error::{Error, Result};
use crate::types::Namespace;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "caravel.yml";
pub const CONFIG_FILENAME_ALT: &str = "caravel.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".caravel/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub namespace: Namespace,

    pub root_domain: String,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub registries: Vec<RegistryConfig>,

    #[serde(default)]
    pub hooks: HooksConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/var/lib/caravel/apps.yml")
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HooksConfig {
    /// Interpreter pre-deploy scripts are run with.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

fn default_interpreter() -> String {
    "sh".to_string()
}

impl Default for HooksConfig {
    fn default() -> Self {
        HooksConfig {
            interpreter: default_interpreter(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.root_domain.trim().is_empty() {
            return Err(Error::InvalidConfig("root_domain cannot be empty".into()));
        }

        let mut names = HashSet::new();
        for registry in &self.registries {
            if !names.insert(registry.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate registry name: {}",
                    registry.name
                )));
            }
        }

        let default_push = self.registries.iter().filter(|r| r.default_push).count();
        if default_push > 1 {
            return Err(Error::InvalidConfig(
                "at most one registry can be the default push target".into(),
            ));
        }

        if self.build.log_capacity == 0 {
            return Err(Error::InvalidConfig(
                "build.log_capacity must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Per-namespace proxy config file.
    pub fn namespace_proxy_config(&self) -> PathBuf {
        self.proxy
            .config_dir
            .join(format!("{}.conf", self.namespace))
    }
}
