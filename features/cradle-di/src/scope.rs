//! Bean scopes and the singleton cache.
//!
//! - [`Scope::Singleton`]: one instance per container, created at most once
//! - [`Scope::Prototype`]: a new instance on every request, never cached
//!
//! The [`ScopeManager`] owns every singleton from the moment it is committed until
//! shutdown. Construction is serialised per construction group (see
//! [`InstantiationPlan`](crate::sorter::InstantiationPlan)): the first caller builds while
//! holding the group lock, everybody else waits and then reads the cache.

use std::{fmt, sync::OnceLock};

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::{errors::InstantiationError, registry::BeanId, sorter::GroupId, types::Instance};

/// Defines the lifetime of a bean within the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// One instance shared by every consumer, lives until shutdown
    #[default]
    Singleton,
    /// A new instance on every request, owned by the caller
    Prototype,
}
impl Scope {
    pub fn is_singleton(&self) -> bool {
        matches!(self, Scope::Singleton)
    }
}
impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => write!(f, "singleton"),
            Scope::Prototype => write!(f, "prototype"),
        }
    }
}

pub struct ScopeManager {
    /// Committed singletons, indexed by [`BeanId`]
    slots: Vec<RwLock<Option<Instance>>>,
    /// Definitions whose construction failed, for any scope
    failures: Vec<OnceLock<InstantiationError>>,
    /// One lock per construction group
    groups: Vec<Mutex<()>>,
    /// Commit order of singletons
    created: Mutex<Vec<BeanId>>,
}

impl ScopeManager {
    pub(crate) fn new(bean_count: usize, group_count: usize) -> Self {
        Self {
            slots: (0..bean_count).map(|_| RwLock::new(None)).collect(),
            failures: (0..bean_count).map(|_| OnceLock::new()).collect(),
            groups: (0..group_count).map(|_| Mutex::new(())).collect(),
            created: Mutex::new(Vec::new()),
        }
    }

    /// The committed singleton, if it exists
    pub fn cached(&self, id: BeanId) -> Option<Instance> {
        self.slots.get(id.index())?.read().clone()
    }

    /// The error which poisoned the definition
    pub fn failure(&self, id: BeanId) -> Option<&InstantiationError> {
        self.failures.get(id.index())?.get()
    }

    /// Marks a definition as failed, returns the error that is now stored
    ///
    /// The first error wins, later calls return it unchanged.
    pub(crate) fn poison(&self, id: BeanId, error: InstantiationError) -> InstantiationError {
        let Some(slot) = self.failures.get(id.index()) else {
            return error;
        };
        if slot.set(error.clone()).is_ok() {
            tracing::error!("Bean '{}' is poisoned: {}", error.bean, error);
        }
        slot.get().cloned().unwrap_or(error)
    }

    /// Serialises construction within a group
    pub(crate) fn lock_group(&self, group: GroupId) -> Option<MutexGuard<'_, ()>> {
        self.groups.get(group.index()).map(|lock| lock.lock())
    }

    /// Publishes a fully wired singleton
    pub(crate) fn commit(&self, id: BeanId, instance: Instance) {
        let Some(slot) = self.slots.get(id.index()) else {
            return;
        };
        *slot.write() = Some(instance);
        self.created.lock().push(id);
    }

    /// Singletons in the order they were committed
    pub fn creation_order(&self) -> Vec<BeanId> {
        self.created.lock().clone()
    }

    /// Empties the cache, returning singletons in reverse creation order
    pub(crate) fn take_for_teardown(&self) -> Vec<(BeanId, Instance)> {
        let created = std::mem::take(&mut *self.created.lock());
        created
            .into_iter()
            .rev()
            .filter_map(|id| {
                let instance = self.slots.get(id.index())?.write().take()?;
                Some((id, instance))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{errors::Stage, types::BeanKey};

    fn failure(message: &str) -> InstantiationError {
        InstantiationError {
            bean: BeanKey::of::<u8>(),
            stage: Stage::Constructor,
            error: Arc::new(message.to_string().into()),
        }
    }

    #[test]
    fn first_poison_wins() {
        let scopes = ScopeManager::new(1, 1);
        let id = BeanId::new(0);

        scopes.poison(id, failure("first"));
        let stored = scopes.poison(id, failure("second"));

        assert_eq!(stored.error.to_string(), "first");
        assert_eq!(scopes.failure(id).unwrap().error.to_string(), "first");
    }

    #[test]
    fn teardown_reverses_commit_order() {
        let scopes = ScopeManager::new(3, 3);
        scopes.commit(BeanId::new(2), Instance::new(2_u8));
        scopes.commit(BeanId::new(0), Instance::new(0_u8));
        scopes.commit(BeanId::new(1), Instance::new(1_u8));

        let order: Vec<_> = scopes
            .take_for_teardown()
            .into_iter()
            .map(|(id, _)| id.index())
            .collect();

        assert_eq!(order, vec![1, 0, 2]);
        assert!(scopes.cached(BeanId::new(0)).is_none());
        assert!(scopes.creation_order().is_empty());
    }
}
