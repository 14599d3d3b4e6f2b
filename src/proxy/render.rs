// ABOUTME: Renders proxy config from the current set of apps and their domains.
// ABOUTME: One server block per attached domain plus the cluster-root config.

use std::path::Path;

use crate::config::ProxyConfig;
use crate::model::AppDefinition;
use crate::types::Namespace;

use super::error::ProxyError;
use super::template::{Template, Vars};

/// Built-in per-domain server block.
pub const DEFAULT_APP_TEMPLATE: &str = r#"server {
    listen 80;
{{#if ssl}}
    listen 443 ssl;
    ssl_certificate {{cert_path}};
    ssl_certificate_key {{key_path}};
{{/if}}
    server_name {{domain}};
{{#if force_ssl}}
    if ($scheme = http) {
        return 301 https://$host$request_uri;
    }
{{/if}}
    client_max_body_size 500m;

    location / {
        resolver 127.0.0.11 valid=5s;
        set $upstream http://{{service_name}}:{{container_http_port}};
        proxy_pass $upstream;
        proxy_http_version 1.1;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
    }
}
"#;

/// Root-domain and registry blocks.
pub const ROOT_TEMPLATE: &str = r#"server {
    listen 80 default_server;
{{#if root_ssl}}
    listen 443 ssl default_server;
    ssl_certificate {{cert_path}};
    ssl_certificate_key {{key_path}};
{{/if}}
    server_name {{root_domain}};

    location / {
        return 404;
    }
}
{{#if has_registry}}
server {
    listen 80;
{{#if root_ssl}}
    listen 443 ssl;
    ssl_certificate {{registry_cert_path}};
    ssl_certificate_key {{registry_key_path}};
{{/if}}
    server_name {{registry_domain}};
    client_max_body_size 0;
    chunked_transfer_encoding on;

    location / {
        proxy_pass http://{{registry_service}}:5000;
        proxy_set_header Host $http_host;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_read_timeout 900;
    }
}
{{/if}}
"#;

/// Service the registry sub-domain forwards to.
pub const REGISTRY_SERVICE: &str = "caravel-registry";

/// Apps and domains a reload pass renders.
#[derive(Debug, Clone)]
pub struct ProxySnapshot {
    pub namespace: Namespace,
    pub root_domain: String,
    pub apps: Vec<AppDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    /// Contents of `<config_dir>/<namespace>.conf`.
    pub namespace_config: String,
    /// Contents of the cluster-root config.
    pub root_config: String,
}

/// A domain served by an app.
#[derive(Debug, Clone)]
struct ServerBlock<'a> {
    app: &'a AppDefinition,
    domain: String,
    ssl: bool,
}

impl ProxySnapshot {
    /// Default subdomain first, then custom domains in attachment order.
    fn server_blocks(&self) -> Vec<ServerBlock<'_>> {
        let mut blocks = Vec::new();
        for app in &self.apps {
            blocks.push(ServerBlock {
                app,
                domain: format!("{}.{}", app.name, self.root_domain),
                ssl: app.has_default_subdomain_ssl,
            });
            blocks.extend(app.custom_domains.iter().map(|d| ServerBlock {
                app,
                domain: d.domain.clone(),
                ssl: d.ssl,
            }));
        }
        blocks
    }

    pub fn render(
        &self,
        config: &ProxyConfig,
        app_template: &str,
    ) -> Result<RenderedConfig, ProxyError> {
        let default = Template::parse(app_template).map_err(|message| ProxyError::Template {
            template: "app".to_string(),
            message,
        })?;

        let mut namespace_config = String::new();
        for block in self.server_blocks() {
            let custom;
            let template = match block.app.custom_nginx_config.as_deref() {
                Some(source) => {
                    custom = Template::parse(source).map_err(|message| {
                        ProxyError::Template {
                            template: block.app.name.to_string(),
                            message,
                        }
                    })?;
                    &custom
                }
                None => &default,
            };

            let rendered = template
                .render(&self.block_vars(&block, &config.certs_dir))
                .map_err(|message| ProxyError::Template {
                    template: block.app.name.to_string(),
                    message,
                })?;
            namespace_config.push_str(&rendered);
            namespace_config.push('\n');
        }

        let root_config = self.render_root(config)?;
        Ok(RenderedConfig {
            namespace_config,
            root_config,
        })
    }

    fn block_vars(&self, block: &ServerBlock<'_>, certs_dir: &Path) -> Vars {
        let app = block.app;
        Vars::new()
            .set("app", &app.name)
            .set("domain", &block.domain)
            .set("service_name", self.namespace.service_name(&app.name))
            .set("container_http_port", app.container_http_port)
            .flag("ssl", block.ssl)
            .flag("force_ssl", block.ssl && app.force_ssl)
            .set("cert_path", cert_path(certs_dir, &block.domain).display())
            .set("key_path", key_path(certs_dir, &block.domain).display())
    }

    fn render_root(&self, config: &ProxyConfig) -> Result<String, ProxyError> {
        let registry_domain = config
            .registry_subdomain
            .as_deref()
            .map(|sub| format!("{}.{}", sub, self.root_domain))
            .unwrap_or_default();

        let vars = Vars::new()
            .set("root_domain", &self.root_domain)
            .flag("root_ssl", config.root_ssl)
            .set(
                "cert_path",
                cert_path(&config.certs_dir, &self.root_domain).display(),
            )
            .set(
                "key_path",
                key_path(&config.certs_dir, &self.root_domain).display(),
            )
            .flag("has_registry", !registry_domain.is_empty())
            .set(
                "registry_cert_path",
                cert_path(&config.certs_dir, &registry_domain).display(),
            )
            .set(
                "registry_key_path",
                key_path(&config.certs_dir, &registry_domain).display(),
            )
            .set("registry_domain", &registry_domain)
            .set("registry_service", REGISTRY_SERVICE);

        Template::parse(ROOT_TEMPLATE)
            .and_then(|t| t.render(&vars))
            .map_err(|message| ProxyError::Template {
                template: "root".to_string(),
                message,
            })
    }
}

fn cert_path(certs_dir: &Path, domain: &str) -> std::path::PathBuf {
    certs_dir.join(format!("{}.crt", domain))
}

fn key_path(certs_dir: &Path, domain: &str) -> std::path::PathBuf {
    certs_dir.join(format!("{}.key", domain))
}
