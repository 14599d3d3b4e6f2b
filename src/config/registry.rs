// ABOUTME: Container registry entries.
// ABOUTME: Credentials for pulls and the optional default push target.

use serde::Deserialize;

use super::EnvValue;

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub name: String,

    /// Registry host, e.g. `registry.example.com` or `ghcr.io`.
    pub domain: String,

    /// Path prepended to pushed image names.
    #[serde(default)]
    pub prefix: Option<String>,

    pub username: String,

    pub password: EnvValue,

    /// Built images are retagged and pushed here.
    #[serde(default)]
    pub default_push: bool,
}
