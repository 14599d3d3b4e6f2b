// ABOUTME: Per-app build state: in-progress flag and rolling log.
// ABOUTME: BuildRegistry admits one build cluster-wide; BuildGuard clears the flag on drop.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::BuildError;
use super::log::{BuildLog, BuildLogs};
use crate::types::AppName;

/// What status pollers see for one app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    pub is_app_building: bool,
    pub logs: BuildLogs,
    pub is_build_failed: bool,
}

#[derive(Debug)]
struct AppBuild {
    building: bool,
    log: BuildLog,
}

type Slot = Arc<Mutex<AppBuild>>;

/// Build state for every app, owned by the process root.
#[derive(Debug)]
pub struct BuildRegistry {
    log_capacity: usize,
    apps: Mutex<HashMap<AppName, Slot>>,
}

impl BuildRegistry {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            log_capacity,
            apps: Mutex::new(HashMap::new()),
        }
    }

    /// Mark `app` as building and clear its log.
    ///
    /// Fails if any app is building; only one build runs at a time.
    pub fn begin(&self, app: &AppName) -> Result<BuildGuard, BuildError> {
        let mut apps = self.apps.lock();

        if let Some(running) = apps
            .iter()
            .find(|(_, slot)| slot.lock().building)
            .map(|(name, _)| name)
        {
            return Err(BuildError::Busy(running.to_string()));
        }

        let slot = apps
            .entry(app.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(AppBuild {
                    building: false,
                    log: BuildLog::new(self.log_capacity),
                }))
            })
            .clone();

        {
            let mut state = slot.lock();
            state.building = true;
            state.log.clear();
        }

        Ok(BuildGuard {
            app: app.clone(),
            slot,
        })
    }

    pub fn status(&self, app: &AppName) -> BuildStatus {
        let slot = self.apps.lock().get(app).cloned();
        match slot {
            Some(slot) => {
                let state = slot.lock();
                BuildStatus {
                    is_app_building: state.building,
                    logs: state.log.snapshot(),
                    is_build_failed: state.log.is_failed(),
                }
            }
            None => BuildStatus {
                is_app_building: false,
                logs: BuildLog::new(self.log_capacity).snapshot(),
                is_build_failed: false,
            },
        }
    }

    /// The app currently building, if any.
    pub fn running(&self) -> Option<AppName> {
        self.apps
            .lock()
            .iter()
            .find(|(_, slot)| slot.lock().building)
            .map(|(name, _)| name.clone())
    }

    /// Drop state for a removed app. Ignored while it is building.
    pub fn forget(&self, app: &AppName) {
        let mut apps = self.apps.lock();
        if apps.get(app).is_some_and(|slot| !slot.lock().building) {
            apps.remove(app);
        }
    }
}

/// A running build. Dropping it clears the in-progress flag.
#[derive(Debug)]
pub struct BuildGuard {
    app: AppName,
    slot: Slot,
}

impl BuildGuard {
    pub fn app(&self) -> &AppName {
        &self.app
    }

    pub fn log(&self, line: &str) {
        tracing::debug!(app = %self.app, "{}", line);
        self.slot.lock().log.push(line);
    }

    pub fn fail(&self, message: &str) {
        self.slot.lock().log.mark_failed(message);
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        self.slot.lock().building = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> AppName {
        AppName::new(s).unwrap()
    }

    #[test]
    fn only_one_build_at_a_time() {
        let registry = BuildRegistry::new(10);
        let guard = registry.begin(&name("one")).unwrap();

        let err = registry.begin(&name("two")).unwrap_err();
        assert!(matches!(err, BuildError::Busy(ref app) if app == "one"));
        assert_eq!(registry.running(), Some(name("one")));

        drop(guard);
        assert_eq!(registry.running(), None);
        assert!(registry.begin(&name("two")).is_ok());
    }

    #[test]
    fn new_build_clears_previous_log() {
        let registry = BuildRegistry::new(10);
        let app = name("demo");

        let guard = registry.begin(&app).unwrap();
        guard.log("Step 1/1 : FROM nginx");
        guard.fail("boom");
        drop(guard);

        let status = registry.status(&app);
        assert!(!status.is_app_building);
        assert!(status.is_build_failed);

        let _guard = registry.begin(&app).unwrap();
        let status = registry.status(&app);
        assert!(status.is_app_building);
        assert!(!status.is_build_failed);
        assert!(status.logs.lines.is_empty());
    }

    #[test]
    fn status_serializes_with_poller_field_names() {
        let registry = BuildRegistry::new(10);
        let json = serde_json::to_value(registry.status(&name("demo"))).unwrap();
        assert_eq!(json["isAppBuilding"], false);
        assert_eq!(json["isBuildFailed"], false);
        assert_eq!(json["logs"]["firstLineNumber"], 0);
    }
}
