//! Registries of listener callbacks.

use std::fmt::Debug;

use parking_lot::Mutex;
use tracing::debug;

/// An ordered set of callback values.
///
/// Registering a callback twice is a no-op, as is removing one that was never
/// registered. Dispatch goes through [`Listeners::snapshot`] so that a
/// listener may register or remove listeners while it is being invoked.
pub struct Listeners<T> {
    name: &'static str,
    entries: Mutex<Vec<T>>,
}

impl<T: Copy + PartialEq + Debug> Listeners<T> {
    /// Create an empty registry. `name` only appears in logs.
    pub fn new(name: &'static str) -> Self {
        Self { name, entries: Mutex::new(Vec::new()) }
    }

    /// Add `listener`, returning `false` if it was already present.
    pub fn add(&self, listener: T) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains(&listener) {
            return false;
        }
        entries.push(listener);
        debug!("Added {} listener {listener:?}", self.name);
        true
    }

    /// Remove `listener`, returning `false` if it was not present.
    pub fn remove(&self, listener: T) -> bool {
        let mut entries = self.entries.lock();
        let Some(index) = entries.iter().position(|l| *l == listener) else {
            return false;
        };
        entries.remove(index);
        debug!("Removed {} listener {listener:?}", self.name);
        true
    }

    /// Register or unregister depending on `remove`.
    pub fn update(&self, listener: T, remove: bool) -> bool {
        if remove {
            self.remove(listener)
        } else {
            self.add(listener)
        }
    }

    /// Copy of the registered listeners, in registration order.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.lock().clone()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
