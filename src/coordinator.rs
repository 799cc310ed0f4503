use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::registry::ResourceRegistry;

/// MutationCoordinator
///
/// One lock per registered resource. A mutation and the list refresh that
/// follows it run under the write side; plain list reads take the read side,
/// so a refresh never interleaves with a concurrent mutation of the same
/// resource. Different resources never contend.
#[derive(Debug, Clone)]
pub struct MutationCoordinator {
    locks: Arc<HashMap<String, Arc<RwLock<()>>>>,
}

impl MutationCoordinator {
    pub fn new(registry: &ResourceRegistry) -> Self {
        let locks = registry
            .names()
            .map(|name| (name.to_string(), Arc::new(RwLock::new(()))))
            .collect();
        Self {
            locks: Arc::new(locks),
        }
    }

    /// `None` for a resource that is not registered.
    pub async fn read(&self, resource: &str) -> Option<OwnedRwLockReadGuard<()>> {
        let lock = self.locks.get(resource)?.clone();
        Some(lock.read_owned().await)
    }

    /// `None` for a resource that is not registered.
    pub async fn write(&self, resource: &str) -> Option<OwnedRwLockWriteGuard<()>> {
        let lock = self.locks.get(resource)?.clone();
        Some(lock.write_owned().await)
    }
}
