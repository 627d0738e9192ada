//! Registry of live loaders.
//!
//! A [`LoaderRegistry`] lets code that only holds an object instance find the object node
//! describing it, whichever loader declared it. It replaces a process-wide singleton: create
//! one, hand it to loaders with [`MetaDataLoader::set_loader_registry`], and pass it around by
//! `Arc`.
//!
//! Loaders are held weakly. Dropping the last reference to a loader makes its entry dead;
//! [`LoaderRegistry::sweep`] removes dead entries and lookups skip them.

use std::sync::{Arc, Weak};

use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

use crate::{
    loader::{MetaDataLoader, MetaDataLoaderRc},
    metadata::{kind::TYPE_OBJECT, MetaDataRc, ObjectInstance},
    Error, Result,
};

/// Name to [`MetaDataLoader`] mapping, holding loaders weakly.
#[derive(Debug, Default)]
pub struct LoaderRegistry {
    loaders: DashMap<String, Weak<MetaDataLoader>>,
}

impl LoaderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `loader` under its name. Registering the same loader again is a no-op.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if another live loader holds the name.
    pub fn register(&self, loader: &MetaDataLoaderRc) -> Result<()> {
        match self.loaders.entry(loader.name().to_string()) {
            Entry::Occupied(mut occupied) => match occupied.get().upgrade() {
                Some(existing) if Arc::ptr_eq(&existing, loader) => Ok(()),
                Some(_) => Err(Error::Configuration(format!(
                    "A different loader named [{}] is already registered",
                    loader.name()
                ))),
                None => {
                    occupied.insert(Arc::downgrade(loader));
                    Ok(())
                }
            },
            Entry::Vacant(vacant) => {
                debug!("Registering loader [{}]", loader.name());
                vacant.insert(Arc::downgrade(loader));
                Ok(())
            }
        }
    }

    /// Stop tracking the loader called `name`.
    pub fn unregister(&self, name: &str) -> bool {
        self.loaders.remove(name).is_some()
    }

    /// The live loader called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<MetaDataLoaderRc> {
        self.loaders.get(name).and_then(|entry| entry.upgrade())
    }

    /// All live loaders, ordered by name.
    #[must_use]
    pub fn loaders(&self) -> Vec<MetaDataLoaderRc> {
        let mut loaders: Vec<_> = self
            .loaders
            .iter()
            .filter_map(|entry| entry.value().upgrade())
            .collect();
        loaders.sort_by(|a, b| a.name().cmp(b.name()));
        loaders
    }

    /// Drop entries whose loader has been released. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.loaders.len();
        self.loaders.retain(|_, loader| loader.strong_count() > 0);
        before - self.loaders.len()
    }

    /// Number of tracked loaders, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    /// Returns `true` without tracked loaders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// The object node describing `instance`: its back-reference if it has one, else the first
    /// object of any registered loader that produces it.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if no loader has such an object.
    pub fn meta_object_for(&self, instance: &dyn ObjectInstance) -> Result<MetaDataRc> {
        if let Some(object) = instance.meta_aware().and_then(|aware| aware.meta_object()) {
            return Ok(object);
        }
        self.loaders()
            .iter()
            .find_map(|loader| loader.produced_by(instance))
            .ok_or_else(|| Error::not_found(TYPE_OBJECT, "<instance>", "LoaderRegistry"))
    }

    /// The first object called `name` in any registered loader.
    #[must_use]
    pub fn find_meta_object_by_name(&self, name: &str) -> Option<MetaDataRc> {
        self.loaders()
            .iter()
            .find_map(|loader| loader.find_meta_object(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::ValueObject,
        test::{create_loader, create_object},
    };

    #[test]
    fn test_register_and_sweep() {
        let registry = LoaderRegistry::new();
        let a = create_loader("a");
        let b = create_loader("b");
        registry.register(&a).unwrap();
        registry.register(&a).unwrap();
        registry.register(&b).unwrap();

        let imposter = create_loader("a");
        assert!(matches!(registry.register(&imposter), Err(Error::Configuration(_))));

        assert_eq!(
            registry.loaders().iter().map(|l| l.name().to_string()).collect::<Vec<_>>(),
            ["a", "b"]
        );

        drop(b);
        assert!(registry.get("b").is_none());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.sweep(), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister("a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reverse_lookup_across_loaders() {
        let registry = Arc::new(LoaderRegistry::new());
        let fruits = create_loader("fruits");
        let veg = create_loader("veg");
        fruits.add_child(create_object("Apple")).unwrap();
        veg.add_child(create_object("Leek")).unwrap();
        for loader in [&fruits, &veg] {
            loader.set_loader_registry(registry.clone());
            loader.register().unwrap();
        }

        let leek = ValueObject::new("Leek");
        let found = fruits.meta_object_for(&leek).unwrap();
        assert!(found.is_child_of(veg.node()));
        assert!(registry.find_meta_object_by_name("Apple").is_some());
        assert!(registry
            .meta_object_for(&ValueObject::new("Turnip"))
            .unwrap_err()
            .is_not_found());
    }
}
