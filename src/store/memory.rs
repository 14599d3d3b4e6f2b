// ABOUTME: In-memory app store.
// ABOUTME: Used by tests and by callers that keep state elsewhere.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{AppStore, Apps, StoreError};
use crate::model::AppDefinition;
use crate::types::AppName;

#[derive(Debug, Default)]
pub struct MemoryStore {
    apps: Mutex<Apps>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_apps(apps: Vec<AppDefinition>) -> Self {
        Self {
            apps: Mutex::new(Apps::from_list(apps)),
        }
    }
}

#[async_trait]
impl AppStore for MemoryStore {
    async fn get_app(&self, name: &AppName) -> Result<AppDefinition, StoreError> {
        self.apps.lock().get(name).cloned()
    }

    async fn list_apps(&self) -> Result<Vec<AppDefinition>, StoreError> {
        Ok(self.apps.lock().to_list())
    }

    async fn insert_app(&self, app: AppDefinition) -> Result<(), StoreError> {
        self.apps.lock().insert(app)
    }

    async fn update_app(&self, app: AppDefinition) -> Result<(), StoreError> {
        self.apps.lock().update(app)
    }

    async fn remove_app(&self, name: &AppName) -> Result<bool, StoreError> {
        Ok(self.apps.lock().remove(name))
    }

    async fn reserve_version(&self, name: &AppName) -> Result<u32, StoreError> {
        self.apps.lock().reserve_version(name)
    }

    async fn set_git_hash(
        &self,
        name: &AppName,
        version: u32,
        hash: String,
    ) -> Result<(), StoreError> {
        self.apps.lock().set_git_hash(name, version, hash)
    }

    async fn set_deployed_version(
        &self,
        name: &AppName,
        version: u32,
    ) -> Result<(), StoreError> {
        self.apps.lock().set_deployed_version(name, version)
    }
}
