// ABOUTME: Registry resolution for image pulls and pushes.
// ABOUTME: Maps image names to credentials and exposes the default push registry.

use std::collections::HashMap;

use crate::config::RegistryConfig;
use crate::engine::RegistryAuth;
use crate::error::Result;
use crate::types::ImageRef;

/// Host Docker Hub images resolve to when they name no registry.
const DOCKER_HUB: &str = "docker.io";
const DOCKER_HUB_ALIASES: &[&str] = &["docker.io", "index.docker.io", "registry-1.docker.io"];

/// Registry that receives every built image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub domain: String,
    pub prefix: Option<String>,
    pub auth: RegistryAuth,
}

impl PushTarget {
    /// Name a locally built image gets in this registry.
    pub fn image_for(&self, local: &ImageRef) -> ImageRef {
        local.pushed_to(&self.domain, self.prefix.as_deref())
    }
}

/// Credential lookup used by the build pipeline.
pub trait RegistryResolver: Send + Sync {
    /// Credentials for pulling `image`, if a registry matches its host.
    fn auth_for_image(&self, image: &ImageRef) -> Option<RegistryAuth>;

    /// Credentials for every known registry keyed by host, as build base-image auth.
    fn all_auth(&self) -> HashMap<String, RegistryAuth>;

    fn default_push(&self) -> Option<PushTarget>;
}

#[derive(Debug, Clone)]
struct Registry {
    domain: String,
    prefix: Option<String>,
    auth: RegistryAuth,
    default_push: bool,
}

/// Registries from the control-plane configuration, passwords resolved.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredRegistries {
    registries: Vec<Registry>,
}

fn normalize_host(host: &str) -> &str {
    if DOCKER_HUB_ALIASES.contains(&host) {
        DOCKER_HUB
    } else {
        host
    }
}

impl ConfiguredRegistries {
    pub fn from_config(entries: &[RegistryConfig]) -> Result<Self> {
        let registries = entries
            .iter()
            .map(|entry| {
                let domain = entry.domain.trim_end_matches('/').to_string();
                Ok(Registry {
                    auth: RegistryAuth {
                        username: entry.username.clone(),
                        password: entry.password.resolve()?,
                        server: Some(domain.clone()),
                    },
                    domain,
                    prefix: entry.prefix.clone().filter(|p| !p.is_empty()),
                    default_push: entry.default_push,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { registries })
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}

impl RegistryResolver for ConfiguredRegistries {
    fn auth_for_image(&self, image: &ImageRef) -> Option<RegistryAuth> {
        let host = normalize_host(image.registry().unwrap_or(DOCKER_HUB));
        self.registries
            .iter()
            .find(|r| normalize_host(&r.domain) == host)
            .map(|r| r.auth.clone())
    }

    fn all_auth(&self) -> HashMap<String, RegistryAuth> {
        self.registries
            .iter()
            .map(|r| (r.domain.clone(), r.auth.clone()))
            .collect()
    }

    fn default_push(&self) -> Option<PushTarget> {
        self.registries
            .iter()
            .find(|r| r.default_push)
            .map(|r| PushTarget {
                domain: r.domain.clone(),
                prefix: r.prefix.clone(),
                auth: r.auth.clone(),
            })
    }
}
