//! Per-harness mock collaborator registry.
//!
//! Collaborator mocks are singletons *per harness*, not per process: the
//! registry is owned by a [`Harness`](crate::Harness) instance and passed
//! by handle, keyed by collaborator type. Two harnesses never share mock
//! state.

use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// A type-keyed registry of shared collaborator instances.
#[derive(Default)]
pub struct MockRegistry {
    entries: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl MockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registered instance of `T`, creating it with `make` on
    /// first use.
    pub fn get_or_create<T, F>(&self, make: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(make()) as Arc<dyn Any + Send + Sync>);
        Arc::clone(entry)
            .downcast::<T>()
            .expect("registry entry has the key's type")
    }

    /// Returns the registered instance of `T`, if one exists.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let entries = self.entries.lock();
        entries.get(&TypeId::of::<T>()).map(|entry| {
            Arc::clone(entry)
                .downcast::<T>()
                .expect("registry entry has the key's type")
        })
    }

    /// Number of registered collaborator types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops every registered instance.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
