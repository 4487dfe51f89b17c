use std::{any::type_name, fmt, ops::Deref, sync::Arc, sync::OnceLock};

use crate::types::Injectable;

/// Late bound dependency, written by the container after the owning bean was allocated.
///
/// Used for setter and field injection. Field injection writes the slot directly,
/// setters usually forward to [`Late::set`].
///
/// ### Panics
///
/// Dereferencing before the dependency was wired panics.
/// Inside the container this only happens if a constructor, or a bean taking part in the
/// same cycle, reads the slot while the cycle is still being wired.
pub struct Late<T: Injectable> {
    once: OnceLock<Arc<T>>,
}

/// The slot was already filled
#[derive(thiserror::Error, Debug, Clone)]
#[error("Late dependency '{0}' was already wired")]
pub struct AlreadyWired(pub &'static str);

impl<T: Injectable> Late<T> {
    pub const fn new() -> Self {
        Self {
            once: OnceLock::new(),
        }
    }

    /// Accesses the late dependency
    ///
    /// # Panics
    /// - When accessed before the dependency was wired
    pub fn get(&self) -> &Arc<T> {
        match self.once.get() {
            Some(value) => value,
            None => panic!(
                "Late dependency '{}' accessed before it was wired",
                type_name::<T>()
            ),
        }
    }

    /// Try to access the late dependency
    pub fn try_get(&self) -> Option<&Arc<T>> {
        self.once.get()
    }

    pub fn is_wired(&self) -> bool {
        self.once.get().is_some()
    }

    /// Wire the dependency, a slot can only be written once
    pub fn set(&self, value: Arc<T>) -> Result<(), AlreadyWired> {
        self.once
            .set(value)
            .map_err(|_| AlreadyWired(type_name::<T>()))
    }
}

impl<T: Injectable> Default for Late<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Injectable> Deref for Late<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

// Never print the target: late slots are how cycles are closed
impl<T: Injectable> fmt::Debug for Late<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_wired() { "wired" } else { "unwired" };
        f.debug_tuple("Late")
            .field(&type_name::<T>())
            .field(&state)
            .finish()
    }
}
