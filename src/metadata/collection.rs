//! Ordered, indexed storage for the direct children of a node.
//!
//! [`IndexedCollection`] keeps children in insertion order and maintains three derived indices
//! so that the common lookups of the metadata graph do not scan:
//!
//! - **(type, name)**: the uniqueness key, at most one child per pair
//! - **name**: all children sharing a name across types (`object` and `field` named `id`)
//! - **type** and **class**: children grouped by type string and by node kind
//!
//! # Consistency
//!
//! All four structures live behind a single lock and are updated together, so readers always
//! observe a consistent snapshot. [`IndexedCollection::stats`] exposes the index sizes and
//! [`IndexedCollection::rebuild_indices`] recreates every index from the ordered list.
//!
//! # Thread Safety
//!
//! Reads take a shared lock, mutations an exclusive one. Returned children are `Arc` clones and
//! stay valid after the lock is released.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::metadata::MetaDataRc;

type Key = (String, String);

#[derive(Debug, Default)]
struct Inner {
    items: Vec<MetaDataRc>,
    by_key: HashMap<Key, MetaDataRc>,
    by_name: HashMap<String, Vec<MetaDataRc>>,
    by_type: HashMap<String, Vec<MetaDataRc>>,
    by_class: HashMap<&'static str, Vec<MetaDataRc>>,
}

impl Inner {
    fn index(&mut self, child: &MetaDataRc) {
        self.by_key.insert(key_of(child), child.clone());
        self.by_name
            .entry(child.name().to_string())
            .or_default()
            .push(child.clone());
        self.by_type
            .entry(child.type_name().to_string())
            .or_default()
            .push(child.clone());
        self.by_class
            .entry(child.class_name())
            .or_default()
            .push(child.clone());
    }

    fn unindex(&mut self, child: &MetaDataRc) {
        self.by_key.remove(&key_of(child));
        remove_from(&mut self.by_name, child.name(), child);
        remove_from(&mut self.by_type, child.type_name(), child);
        remove_from(&mut self.by_class, child.class_name(), child);
    }

    fn position(&self, child: &MetaDataRc) -> Option<usize> {
        self.items.iter().position(|item| item.id() == child.id())
    }
}

fn key_of(child: &MetaDataRc) -> Key {
    (child.type_name().to_string(), child.name().to_string())
}

fn remove_from<K, Q>(index: &mut HashMap<K, Vec<MetaDataRc>>, key: &Q, child: &MetaDataRc)
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if let Some(bucket) = index.get_mut(key) {
        bucket.retain(|item| item.id() != child.id());
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

/// Snapshot of the index sizes of an [`IndexedCollection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionStats {
    /// Children in the ordered list
    pub total_children: usize,
    /// Entries in the (type, name) index
    pub key_entries: usize,
    /// Distinct names
    pub name_index_size: usize,
    /// Distinct types
    pub type_index_size: usize,
    /// Distinct node classes
    pub class_index_size: usize,
}

impl CollectionStats {
    /// Returns `true` if every child is reachable through the uniqueness index.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total_children == self.key_entries
    }
}

/// Thread-safe ordered child store with name, type and class indices.
#[derive(Debug, Default)]
pub struct IndexedCollection {
    inner: RwLock<Inner>,
}

impl IndexedCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `child` unless a child with the same (type, name) is already present.
    ///
    /// # Returns
    /// `true` if the child was added, `false` if the (type, name) pair was taken.
    pub fn add(&self, child: MetaDataRc) -> bool {
        let mut inner = self.inner.write();
        if inner.by_key.contains_key(&key_of(&child)) {
            return false;
        }
        inner.index(&child);
        inner.items.push(child);
        true
    }

    /// Remove `child` (by identity).
    ///
    /// # Returns
    /// `true` if the child was stored here.
    pub fn remove(&self, child: &MetaDataRc) -> bool {
        let mut inner = self.inner.write();
        match inner.position(child) {
            Some(pos) => {
                let removed = inner.items.remove(pos);
                inner.unindex(&removed);
                true
            }
            None => false,
        }
    }

    /// Remove the child with the given type and name.
    pub fn remove_by_name_and_type(&self, name: &str, type_name: &str) -> Option<MetaDataRc> {
        let mut inner = self.inner.write();
        let child = inner
            .by_key
            .get(&(type_name.to_string(), name.to_string()))
            .cloned()?;
        let pos = inner.position(&child)?;
        let removed = inner.items.remove(pos);
        inner.unindex(&removed);
        Some(removed)
    }

    /// Replace `old` with `new` in place, keeping the position of `old`.
    ///
    /// # Returns
    /// `false` if `old` is not stored here or `new` would collide with another child.
    pub fn replace(&self, old: &MetaDataRc, new: MetaDataRc) -> bool {
        let mut inner = self.inner.write();
        let Some(pos) = inner.position(old) else {
            return false;
        };
        if key_of(old) != key_of(&new) && inner.by_key.contains_key(&key_of(&new)) {
            return false;
        }
        let removed = std::mem::replace(&mut inner.items[pos], new.clone());
        inner.unindex(&removed);
        inner.index(&new);
        true
    }

    /// Find the child with the given name and type.
    #[must_use]
    pub fn find_by_name_and_type(&self, name: &str, type_name: &str) -> Option<MetaDataRc> {
        self.inner
            .read()
            .by_key
            .get(&(type_name.to_string(), name.to_string()))
            .cloned()
    }

    /// All children named `name`, in insertion order.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Vec<MetaDataRc> {
        self.inner
            .read()
            .by_name
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// All children of type `type_name`, in insertion order.
    #[must_use]
    pub fn find_by_type(&self, type_name: &str) -> Vec<MetaDataRc> {
        self.inner
            .read()
            .by_type
            .get(type_name)
            .cloned()
            .unwrap_or_default()
    }

    /// All children whose node class is `class_name`, in insertion order.
    #[must_use]
    pub fn find_by_class(&self, class_name: &str) -> Vec<MetaDataRc> {
        self.inner
            .read()
            .by_class
            .get(class_name)
            .cloned()
            .unwrap_or_default()
    }

    /// All children matching `predicate`, in insertion order.
    pub fn find_matching<F>(&self, predicate: F) -> Vec<MetaDataRc>
    where
        F: Fn(&MetaDataRc) -> bool,
    {
        self.inner
            .read()
            .items
            .iter()
            .filter(|child| predicate(child))
            .cloned()
            .collect()
    }

    /// Returns `true` if a child with the given name and type exists.
    #[must_use]
    pub fn contains_name_and_type(&self, name: &str, type_name: &str) -> bool {
        self.inner
            .read()
            .by_key
            .contains_key(&(type_name.to_string(), name.to_string()))
    }

    /// Snapshot of all children, in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<MetaDataRc> {
        self.inner.read().items.clone()
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    /// Returns `true` if there are no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    /// Remove all children, returning them in insertion order.
    pub fn clear(&self) -> Vec<MetaDataRc> {
        let mut inner = self.inner.write();
        let items = std::mem::take(&mut inner.items);
        inner.by_key.clear();
        inner.by_name.clear();
        inner.by_type.clear();
        inner.by_class.clear();
        items
    }

    /// Index sizes, see [`CollectionStats::is_consistent`].
    #[must_use]
    pub fn stats(&self) -> CollectionStats {
        let inner = self.inner.read();
        CollectionStats {
            total_children: inner.items.len(),
            key_entries: inner.by_key.len(),
            name_index_size: inner.by_name.len(),
            type_index_size: inner.by_type.len(),
            class_index_size: inner.by_class.len(),
        }
    }

    /// Recreate every index from the ordered list.
    ///
    /// If the list holds several children with the same (type, name), only the first keeps its
    /// place; later duplicates are dropped.
    pub fn rebuild_indices(&self) {
        let mut inner = self.inner.write();
        let items = std::mem::take(&mut inner.items);
        inner.by_key.clear();
        inner.by_name.clear();
        inner.by_type.clear();
        inner.by_class.clear();

        for child in items {
            if inner.by_key.contains_key(&key_of(&child)) {
                continue;
            }
            inner.index(&child);
            inner.items.push(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::test::{create_attr, create_field, create_object};

    #[test]
    fn test_add_rejects_duplicate_key() {
        let collection = IndexedCollection::new();
        assert!(collection.add(create_field("id", "long")));
        assert!(!collection.add(create_field("id", "string")));
        assert!(collection.add(create_attr("id", "x")));

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.find_by_name("id").len(), 2);
        assert!(collection.stats().is_consistent());
    }

    #[test]
    fn test_indices_follow_mutations() {
        let collection = IndexedCollection::new();
        let id = create_field("id", "long");
        let name = create_field("name", "string");
        collection.add(id.clone());
        collection.add(name.clone());
        collection.add(create_attr("dbTable", "FRUIT"));

        assert_eq!(collection.find_by_type("field").len(), 2);
        assert_eq!(collection.find_by_class("Field").len(), 2);
        assert!(collection.contains_name_and_type("name", "field"));

        assert!(collection.remove(&name));
        assert!(!collection.remove(&name));
        assert_eq!(collection.find_by_type("field").len(), 1);
        assert!(collection.find_by_name_and_type("name", "field").is_none());

        let removed = collection.remove_by_name_and_type("dbTable", "attr").unwrap();
        assert_eq!(removed.name(), "dbTable");
        assert!(collection.find_by_class("Attribute").is_empty());

        let stats = collection.stats();
        assert_eq!(stats.total_children, 1);
        assert!(stats.is_consistent());
    }

    #[test]
    fn test_replace_keeps_position() {
        let collection = IndexedCollection::new();
        let a = create_field("a", "string");
        let b = create_field("b", "string");
        collection.add(a.clone());
        collection.add(b.clone());

        let a2 = create_field("a", "int");
        assert!(collection.replace(&a, a2.clone()));
        let all = collection.all();
        assert_eq!(all[0].id(), a2.id());
        assert_eq!(all[1].id(), b.id());

        // would collide with "b"
        assert!(!collection.replace(&a2, create_field("b", "int")));
    }

    #[test]
    fn test_find_matching_and_clear() {
        let collection = IndexedCollection::new();
        collection.add(create_field("a", "string"));
        collection.add(create_field("b", "int"));
        collection.add(create_object("Nested"));

        let ints = collection.find_matching(|c| c.sub_type() == "int");
        assert_eq!(ints.len(), 1);

        let cleared = collection.clear();
        assert_eq!(cleared.len(), 3);
        assert!(collection.is_empty());
        assert_eq!(collection.stats().type_index_size, 0);
    }

    #[test]
    fn test_rebuild_indices() {
        let collection = IndexedCollection::new();
        collection.add(create_field("a", "string"));
        collection.add(create_attr("a", "1"));
        collection.rebuild_indices();

        let stats = collection.stats();
        assert_eq!(stats.total_children, 2);
        assert_eq!(stats.name_index_size, 1);
        assert_eq!(stats.type_index_size, 2);
        assert!(stats.is_consistent());
    }

    proptest! {
        #[test]
        fn prop_no_duplicate_type_name_pairs(
            ops in prop::collection::vec((0u8..2, "[a-d]"), 0..40)
        ) {
            let collection = IndexedCollection::new();
            for (kind, name) in ops {
                let child = if kind == 0 {
                    create_field(&name, "string")
                } else {
                    create_attr(&name, "v")
                };
                collection.add(child);
            }

            let all = collection.all();
            let mut keys: Vec<(String, String)> = all
                .iter()
                .map(|c| (c.type_name().to_string(), c.name().to_string()))
                .collect();
            let total = keys.len();
            keys.sort();
            keys.dedup();
            prop_assert_eq!(keys.len(), total);
            prop_assert!(collection.stats().is_consistent());
        }
    }
}
