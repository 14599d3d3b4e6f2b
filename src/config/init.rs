// ABOUTME: Config scaffolding for new control planes.
// ABOUTME: Creates a caravel.yml template file.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Namespace;

use super::CONFIG_FILENAME;

pub fn init_config(
    dir: &Path,
    namespace: Option<&str>,
    root_domain: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let namespace = match namespace {
        Some(ns) => Namespace::new(ns).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        None => Namespace::new("captain").map_err(|e| Error::InvalidConfig(e.to_string()))?,
    };
    let root_domain = root_domain.unwrap_or("apps.example.com");
    if root_domain.trim().is_empty() {
        return Err(Error::InvalidConfig("root domain cannot be empty".into()));
    }

    std::fs::write(&config_path, generate_template_yaml(&namespace, root_domain))?;

    Ok(())
}

fn generate_template_yaml(namespace: &Namespace, root_domain: &str) -> String {
    format!(
        r#"namespace: {}
root_domain: {}

engine:
  socket: /var/run/docker.sock
  retry:
    attempts: 3
    delay: 3s
  network: caravel-overlay

build:
  work_dir: /var/lib/caravel/builds
  log_capacity: 50

proxy:
  config_dir: /etc/caravel/nginx/conf.d
  root_config: /etc/caravel/nginx/root.conf
  certs_dir: /etc/caravel/certs
  service: caravel-nginx
  reload_command: [nginx, -s, reload]
  # registry_subdomain: registry

store:
  path: /var/lib/caravel/apps.yml

# registries:
#   - name: main
#     domain: registry.example.com
#     prefix: team
#     username: admin
#     password: {{ env: REGISTRY_PASSWORD }}
#     default_push: true
"#,
        namespace, root_domain
    )
}
