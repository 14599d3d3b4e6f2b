// ABOUTME: Persistence of app definitions and their version records.
// ABOUTME: AppStore trait with in-memory and YAML-file backed implementations.

mod memory;
mod yaml;

pub use memory::MemoryStore;
pub use yaml::YamlStore;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::model::{AppDefinition, Version};
use crate::types::AppName;

/// Errors from the app store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("app not found: {0}")]
    NotFound(String),

    #[error("app already exists: {0}")]
    AlreadyExists(String),

    #[error("version {version} not found for app {app}")]
    UnknownVersion { app: String, version: u32 },

    #[error("failed to access store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Where app definitions live. Every mutation is applied atomically per call.
#[async_trait]
pub trait AppStore: Send + Sync {
    async fn get_app(&self, name: &AppName) -> Result<AppDefinition, StoreError>;

    /// All apps, ordered by name.
    async fn list_apps(&self) -> Result<Vec<AppDefinition>, StoreError>;

    async fn insert_app(&self, app: AppDefinition) -> Result<(), StoreError>;

    /// Replace an existing definition. Version history is kept from the stored copy.
    async fn update_app(&self, app: AppDefinition) -> Result<(), StoreError>;

    /// Returns whether the app existed.
    async fn remove_app(&self, name: &AppName) -> Result<bool, StoreError>;

    /// Append a new version record and return its number.
    async fn reserve_version(&self, name: &AppName) -> Result<u32, StoreError>;

    async fn set_git_hash(
        &self,
        name: &AppName,
        version: u32,
        hash: String,
    ) -> Result<(), StoreError>;

    async fn set_deployed_version(&self, name: &AppName, version: u32)
    -> Result<(), StoreError>;
}

/// The mutations shared by every store, applied to an in-memory map.
#[derive(Debug, Default)]
pub(crate) struct Apps(BTreeMap<AppName, AppDefinition>);

impl Apps {
    pub(crate) fn from_list(apps: Vec<AppDefinition>) -> Self {
        Self(apps.into_iter().map(|a| (a.name.clone(), a)).collect())
    }

    pub(crate) fn to_list(&self) -> Vec<AppDefinition> {
        self.0.values().cloned().collect()
    }

    pub(crate) fn get(&self, name: &AppName) -> Result<&AppDefinition, StoreError> {
        self.0
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn get_mut(&mut self, name: &AppName) -> Result<&mut AppDefinition, StoreError> {
        self.0
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    pub(crate) fn insert(&mut self, app: AppDefinition) -> Result<(), StoreError> {
        if self.0.contains_key(&app.name) {
            return Err(StoreError::AlreadyExists(app.name.to_string()));
        }
        self.0.insert(app.name.clone(), app);
        Ok(())
    }

    pub(crate) fn update(&mut self, mut app: AppDefinition) -> Result<(), StoreError> {
        let current = self.get_mut(&app.name)?;
        app.versions = std::mem::take(&mut current.versions);
        app.deployed_version = current.deployed_version;
        *current = app;
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &AppName) -> bool {
        self.0.remove(name).is_some()
    }

    pub(crate) fn reserve_version(&mut self, name: &AppName) -> Result<u32, StoreError> {
        let app = self.get_mut(name)?;
        let version = app.next_version_number();
        app.versions.push(Version {
            version,
            git_hash: None,
            created_at: Utc::now(),
        });
        Ok(version)
    }

    fn version_mut(&mut self, name: &AppName, version: u32) -> Result<&mut Version, StoreError> {
        self.get_mut(name)?
            .versions
            .iter_mut()
            .find(|v| v.version == version)
            .ok_or_else(|| StoreError::UnknownVersion {
                app: name.to_string(),
                version,
            })
    }

    pub(crate) fn set_git_hash(
        &mut self,
        name: &AppName,
        version: u32,
        hash: String,
    ) -> Result<(), StoreError> {
        self.version_mut(name, version)?.git_hash = Some(hash);
        Ok(())
    }

    pub(crate) fn set_deployed_version(
        &mut self,
        name: &AppName,
        version: u32,
    ) -> Result<(), StoreError> {
        self.version_mut(name, version)?;
        self.get_mut(name)?.deployed_version = Some(version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apps_with_demo() -> (Apps, AppName) {
        let name = AppName::new("demo").unwrap();
        let mut apps = Apps::default();
        apps.insert(AppDefinition::new(name.clone(), false)).unwrap();
        (apps, name)
    }

    #[test]
    fn insert_twice_rejected() {
        let (mut apps, name) = apps_with_demo();
        let err = apps.insert(AppDefinition::new(name, false)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn reserved_versions_are_sequential() {
        let (mut apps, name) = apps_with_demo();
        assert_eq!(apps.reserve_version(&name).unwrap(), 0);
        assert_eq!(apps.reserve_version(&name).unwrap(), 1);
        assert_eq!(apps.get(&name).unwrap().versions.len(), 2);
    }

    #[test]
    fn update_keeps_version_history() {
        let (mut apps, name) = apps_with_demo();
        apps.reserve_version(&name).unwrap();
        apps.set_deployed_version(&name, 0).unwrap();

        let mut changed = AppDefinition::new(name.clone(), false);
        changed.instance_count = 3;
        apps.update(changed).unwrap();

        let stored = apps.get(&name).unwrap();
        assert_eq!(stored.instance_count, 3);
        assert_eq!(stored.versions.len(), 1);
        assert_eq!(stored.deployed_version, Some(0));
    }

    #[test]
    fn deploying_unknown_version_rejected() {
        let (mut apps, name) = apps_with_demo();
        let err = apps.set_deployed_version(&name, 7).unwrap_err();
        assert!(matches!(err, StoreError::UnknownVersion { version: 7, .. }));
    }
}
