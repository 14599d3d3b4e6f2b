// ABOUTME: App store persisted to a single YAML file.
// ABOUTME: The whole file is rewritten through a temp file and rename on every mutation.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{AppStore, Apps, StoreError};
use crate::model::AppDefinition;
use crate::types::AppName;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    apps: Vec<AppDefinition>,
}

#[derive(Debug)]
pub struct YamlStore {
    path: PathBuf,
    apps: Mutex<Apps>,
}

impl YamlStore {
    /// Open the store, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let apps = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let file: StoreFile =
                    serde_yaml::from_str(&content).map_err(|source| StoreError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                Apps::from_list(file.apps)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Apps::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            apps: Mutex::new(apps),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a mutation and persist the result. Nothing is kept in memory if
    /// the write fails.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Apps) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut apps = self.apps.lock();
        let mut next = Apps::from_list(apps.to_list());
        let value = op(&mut next)?;
        self.persist(&next)?;
        *apps = next;
        Ok(value)
    }

    fn persist(&self, apps: &Apps) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let file = StoreFile {
            apps: apps.to_list(),
        };
        let content = serde_yaml::to_string(&file).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl AppStore for YamlStore {
    async fn get_app(&self, name: &AppName) -> Result<AppDefinition, StoreError> {
        self.apps.lock().get(name).cloned()
    }

    async fn list_apps(&self) -> Result<Vec<AppDefinition>, StoreError> {
        Ok(self.apps.lock().to_list())
    }

    async fn insert_app(&self, app: AppDefinition) -> Result<(), StoreError> {
        self.mutate(|apps| apps.insert(app))
    }

    async fn update_app(&self, app: AppDefinition) -> Result<(), StoreError> {
        self.mutate(|apps| apps.update(app))
    }

    async fn remove_app(&self, name: &AppName) -> Result<bool, StoreError> {
        self.mutate(|apps| Ok(apps.remove(name)))
    }

    async fn reserve_version(&self, name: &AppName) -> Result<u32, StoreError> {
        self.mutate(|apps| apps.reserve_version(name))
    }

    async fn set_git_hash(
        &self,
        name: &AppName,
        version: u32,
        hash: String,
    ) -> Result<(), StoreError> {
        self.mutate(|apps| apps.set_git_hash(name, version, hash))
    }

    async fn set_deployed_version(
        &self,
        name: &AppName,
        version: u32,
    ) -> Result<(), StoreError> {
        self.mutate(|apps| apps.set_deployed_version(name, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("apps.yml");
        let name = AppName::new("demo").unwrap();

        let store = YamlStore::open(&path).unwrap();
        store
            .insert_app(AppDefinition::new(name.clone(), true))
            .await
            .unwrap();
        let version = store.reserve_version(&name).await.unwrap();
        store.set_deployed_version(&name, version).await.unwrap();

        let reopened = YamlStore::open(&path).unwrap();
        let app = reopened.get_app(&name).await.unwrap();
        assert!(app.has_persistent_data);
        assert_eq!(app.deployed_version, Some(0));
    }

    #[tokio::test]
    async fn failed_mutation_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlStore::open(dir.path().join("apps.yml")).unwrap();
        let name = AppName::new("ghost").unwrap();

        assert!(store.reserve_version(&name).await.is_err());
        assert!(store.list_apps().await.unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apps.yml");
        std::fs::write(&path, "apps: [ {").unwrap();
        assert!(matches!(
            YamlStore::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
