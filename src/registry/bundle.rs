//! Per-bundle type registries.
//!
//! Applications that load independent sets of metadata (plugins, tenants, test fixtures) give
//! each set its own [`TypeRegistry`] and track them here by bundle id. Entries are weak: a
//! registry lives as long as someone holds it, and [`BundleRegistry::sweep`] drops entries
//! whose registry is gone.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::debug;

use crate::registry::TypeRegistry;

/// Bundle id to [`TypeRegistry`] mapping, holding registries weakly.
#[derive(Debug, Default)]
pub struct BundleRegistry {
    entries: DashMap<String, Weak<TypeRegistry>>,
}

impl BundleRegistry {
    /// Create an empty bundle registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `registry` under `bundle_id`. Returns `true` if a live registry was replaced.
    pub fn register(&self, bundle_id: &str, registry: &Arc<TypeRegistry>) -> bool {
        debug!("Registering type registry for bundle [{}]", bundle_id);
        self.entries
            .insert(bundle_id.to_string(), Arc::downgrade(registry))
            .is_some_and(|previous| previous.strong_count() > 0)
    }

    /// The registry of `bundle_id`, if it is still alive.
    #[must_use]
    pub fn get(&self, bundle_id: &str) -> Option<Arc<TypeRegistry>> {
        self.entries.get(bundle_id).and_then(|entry| entry.upgrade())
    }

    /// The registry of `bundle_id`, creating and tracking one with `init` when missing or dead.
    /// The caller must hold on to the result to keep the bundle alive.
    pub fn get_or_create<F>(&self, bundle_id: &str, init: F) -> Arc<TypeRegistry>
    where
        F: FnOnce() -> TypeRegistry,
    {
        let mut entry = self.entries.entry(bundle_id.to_string()).or_default();
        if let Some(existing) = entry.upgrade() {
            return existing;
        }
        let registry = Arc::new(init());
        *entry = Arc::downgrade(&registry);
        registry
    }

    /// Stop tracking `bundle_id`.
    pub fn unregister(&self, bundle_id: &str) -> bool {
        self.entries.remove(bundle_id).is_some()
    }

    /// Drop entries whose registry has been released. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, registry| registry.strong_count() > 0);
        before - self.entries.len()
    }

    /// Ids of all tracked bundles, live or not.
    #[must_use]
    pub fn bundle_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of tracked bundles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` without tracked bundles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
