// ABOUTME: Per-namespace gate for mutating requests.
// ABOUTME: Rejects a second request while one is in flight, or while any build runs.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::build::BuildRegistry;
use crate::types::{AppName, Namespace};

/// Who holds a namespace lock.
#[derive(Debug, Clone, Serialize)]
pub struct LockInfo {
    /// Hostname of the control-plane process.
    pub holder: String,
    pub pid: u32,
    /// Operation that took the lock, e.g. `deploy demo`.
    pub operation: String,
    pub started_at: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(operation: &str) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            operation: operation.to_string(),
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "another operation still in progress for namespace {namespace}: {} (held by {}:{} since {})",
        .info.operation, .info.holder, .info.pid, .info.started_at
    )]
    InProgress { namespace: Namespace, info: LockInfo },

    #[error("build still in progress for app {0}, try again when it finishes")]
    BuildRunning(AppName),
}

/// Namespace locks for the whole process.
#[derive(Debug)]
pub struct NamespaceLocks {
    held: Mutex<HashMap<Namespace, LockInfo>>,
    builds: Arc<BuildRegistry>,
}

impl NamespaceLocks {
    pub fn new(builds: Arc<BuildRegistry>) -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            builds,
        }
    }

    /// Lock `namespace` for `operation` until the guard drops.
    pub fn acquire(
        self: &Arc<Self>,
        namespace: &Namespace,
        operation: &str,
    ) -> Result<NamespaceGuard, LockError> {
        let mut held = self.held.lock();

        if let Some(info) = held.get(namespace) {
            return Err(LockError::InProgress {
                namespace: namespace.clone(),
                info: info.clone(),
            });
        }
        if let Some(app) = self.builds.running() {
            return Err(LockError::BuildRunning(app));
        }

        held.insert(namespace.clone(), LockInfo::new(operation));
        tracing::debug!(namespace = %namespace, "acquired lock for {}", operation);

        Ok(NamespaceGuard {
            locks: Arc::clone(self),
            namespace: namespace.clone(),
        })
    }

    /// Current holder of `namespace`, if locked.
    pub fn holder(&self, namespace: &Namespace) -> Option<LockInfo> {
        self.held.lock().get(namespace).cloned()
    }

    fn release(&self, namespace: &Namespace) {
        if self.held.lock().remove(namespace).is_some() {
            tracing::debug!(namespace = %namespace, "released lock");
        }
    }
}

/// A held namespace lock. Released on drop, whatever the exit path.
pub struct NamespaceGuard {
    locks: Arc<NamespaceLocks>,
    namespace: Namespace,
}

impl NamespaceGuard {
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

impl std::fmt::Debug for NamespaceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceGuard")
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl Drop for NamespaceGuard {
    fn drop(&mut self) {
        self.locks.release(&self.namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locks() -> Arc<NamespaceLocks> {
        Arc::new(NamespaceLocks::new(Arc::new(BuildRegistry::new(10))))
    }

    #[test]
    fn other_namespaces_are_independent() {
        let locks = locks();
        let a = Namespace::new("alpha").unwrap();
        let b = Namespace::new("beta").unwrap();

        let _held = locks.acquire(&a, "deploy web").unwrap();
        assert!(locks.acquire(&b, "deploy web").is_ok());
    }

    #[test]
    fn holder_reports_operation() {
        let locks = locks();
        let ns = Namespace::new("captain").unwrap();
        let guard = locks.acquire(&ns, "remove demo").unwrap();

        let info = locks.holder(&ns).unwrap();
        assert_eq!(info.operation, "remove demo");
        assert_eq!(info.pid, std::process::id());

        drop(guard);
        assert!(locks.holder(&ns).is_none());
    }
}
