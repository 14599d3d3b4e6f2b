// ABOUTME: Tenant namespace identifier.
// ABOUTME: Scopes services, images, volumes, secrets and proxy config files.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::app_name::{AppName, AppNameError, validate_label};

/// Top-level isolation unit. Uses the same label rules as [`AppName`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        validate_label(value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Orchestrator service name for an app in this namespace.
    pub fn service_name(&self, app: &AppName) -> String {
        format!("srv-{}--{}", self.0, app)
    }

    /// Image repository (without tag) for an app built in this namespace.
    pub fn image_base(&self, app: &AppName) -> String {
        format!("img-{}--{}", self.0, app)
    }

    /// Named volumes are prefixed so tenants never share storage.
    pub fn volume_name(&self, volume: &str) -> String {
        format!("{}--{}", self.0, volume)
    }

    /// Secrets are prefixed the same way as volumes.
    pub fn secret_name(&self, secret: &str) -> String {
        format!("{}--{}", self.0, secret)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Namespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Namespace::new(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names_are_namespaced() {
        let ns = Namespace::new("captain").unwrap();
        let app = AppName::new("demo").unwrap();
        assert_eq!(ns.service_name(&app), "srv-captain--demo");
        assert_eq!(ns.image_base(&app), "img-captain--demo");
        assert_eq!(ns.volume_name("data"), "captain--data");
    }
}
