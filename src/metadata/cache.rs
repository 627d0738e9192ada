//! Per-node memoization of lookup results.
//!
//! Every [`crate::metadata::MetaData`] owns a cache behind the [`CacheStrategy`] trait. The cache
//! is never authoritative: it only remembers answers to inherited lookups (`metaField{name}`,
//! derived object lists, resolved packages, ...) and is cleared whenever the graph around the
//! node changes.
//!
//! # Key Components
//!
//! - [`CacheStrategy`] - The pluggable cache contract
//! - [`HybridCache`] - Default implementation backed by `DashMap`
//! - [`CacheValue`] - What can be cached, including the [`CacheValue::Missing`] sentinel
//! - [`CacheStats`] - Hit/miss/load counters
//!
//! # Hybrid Storage
//!
//! Cached nodes are held through weak references, while scalar results are held strongly. A
//! cached node therefore never keeps a detached subgraph alive, and an entry whose node was
//! dropped behaves like a miss.
//!
//! # Thread Safety
//!
//! All operations take `&self` and are safe to call from multiple threads. Every
//! [`CacheStrategy::clear`] bumps a generation counter; a value computed while a clear ran is
//! returned to its caller but never stored, so a flush cannot be undone by a slow reader.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::metadata::{MetaData, MetaDataRc};

/// A value stored in a node cache.
#[derive(Debug, Clone)]
pub enum CacheValue {
    /// A single node
    Node(MetaDataRc),
    /// An ordered list of nodes
    Nodes(Vec<MetaDataRc>),
    /// A string result, e.g. a resolved package
    Text(String),
    /// A flag result
    Flag(bool),
    /// The lookup was performed and found nothing
    Missing,
}

impl CacheValue {
    /// Returns the node if this is [`CacheValue::Node`].
    #[must_use]
    pub fn into_node(self) -> Option<MetaDataRc> {
        match self {
            CacheValue::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Returns the nodes if this is [`CacheValue::Nodes`].
    #[must_use]
    pub fn into_nodes(self) -> Option<Vec<MetaDataRc>> {
        match self {
            CacheValue::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Returns the text if this is [`CacheValue::Text`].
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            CacheValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<Option<MetaDataRc>> for CacheValue {
    fn from(value: Option<MetaDataRc>) -> Self {
        match value {
            Some(node) => CacheValue::Node(node),
            None => CacheValue::Missing,
        }
    }
}

/// Counters describing how a cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Values computed through [`CacheStrategy::compute_if_absent`]
    pub loads: u64,
    /// Entries currently stored
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache, `0.0` if nothing was looked up yet.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let ratio = self.hits as f64 / total as f64;
            ratio
        }
    }
}

/// Contract for node caches.
///
/// Implementations must be safe for concurrent use; [`CacheStrategy::clear`] must be visible to
/// every subsequent `get` once it returns, and must advance [`CacheStrategy::generation`].
pub trait CacheStrategy: Send + Sync {
    /// Look up `key`.
    fn get(&self, key: &str) -> Option<CacheValue>;

    /// Store `value` under `key`, replacing an existing entry.
    fn put(&self, key: &str, value: CacheValue);

    /// Number of clears so far.
    fn generation(&self) -> u64;

    /// Store `value` only if no clear happened since `generation` was read. Returns `true` if
    /// the value was stored.
    fn put_if_current(&self, key: &str, value: CacheValue, generation: u64) -> bool;

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// The computed value is not stored if the cache was cleared while computing it.
    fn compute_if_absent(&self, key: &str, compute: &mut dyn FnMut() -> CacheValue) -> CacheValue {
        if let Some(value) = self.get(key) {
            return value;
        }
        let generation = self.generation();
        let value = compute();
        self.put_if_current(key, value.clone(), generation);
        value
    }

    /// Remove `key`, returning what was stored.
    fn remove(&self, key: &str) -> Option<CacheValue>;

    /// Returns `true` if a live entry exists for `key`.
    fn contains_key(&self, key: &str) -> bool;

    /// Drop all entries.
    fn clear(&self);

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Usage counters.
    fn stats(&self) -> CacheStats;
}

#[derive(Debug)]
enum Slot {
    Node(Weak<MetaData>),
    Nodes(Vec<Weak<MetaData>>),
    Value(CacheValue),
}

impl Slot {
    fn store(value: CacheValue) -> Self {
        match value {
            CacheValue::Node(node) => Slot::Node(Arc::downgrade(&node)),
            CacheValue::Nodes(nodes) => Slot::Nodes(nodes.iter().map(Arc::downgrade).collect()),
            other => Slot::Value(other),
        }
    }

    fn load(&self) -> Option<CacheValue> {
        match self {
            Slot::Node(weak) => weak.upgrade().map(CacheValue::Node),
            Slot::Nodes(weaks) => weaks
                .iter()
                .map(Weak::upgrade)
                .collect::<Option<Vec<_>>>()
                .map(CacheValue::Nodes),
            Slot::Value(value) => Some(value.clone()),
        }
    }
}

/// Default [`CacheStrategy`]: a concurrent map holding nodes weakly and everything else strongly.
#[derive(Debug, Default)]
pub struct HybridCache {
    entries: DashMap<String, Slot>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
}

impl HybridCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache key from a prefix and an argument, `prefix{arg}`.
    #[must_use]
    pub fn key(prefix: &str, arg: &str) -> String {
        format!("{prefix}{{{arg}}}")
    }
}

impl CacheStrategy for HybridCache {
    fn get(&self, key: &str) -> Option<CacheValue> {
        let loaded = self.entries.get(key).map(|slot| slot.load());
        match loaded {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(None) => {
                // A cached node was dropped since it was stored
                self.entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn put(&self, key: &str, value: CacheValue) {
        self.entries.insert(key.to_string(), Slot::store(value));
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn put_if_current(&self, key: &str, value: CacheValue, generation: u64) -> bool {
        // The shard lock is held across the check, so a racing clear() either bumped the
        // generation already or removes this entry after the insert
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if self.generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
                entry.insert(Slot::store(value));
            }
            Entry::Vacant(entry) => {
                if self.generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
                entry.insert(Slot::store(value));
            }
        }
        true
    }

    fn compute_if_absent(&self, key: &str, compute: &mut dyn FnMut() -> CacheValue) -> CacheValue {
        if let Some(value) = self.get(key) {
            return value;
        }
        let generation = self.generation();
        // compute() may recurse into other caches, no shard lock is held here
        let value = compute();
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.put_if_current(key, value.clone(), generation);
        value
    }

    fn remove(&self, key: &str) -> Option<CacheValue> {
        self.entries.remove(key).and_then(|(_, slot)| slot.load())
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|slot| slot.load().is_some())
    }

    fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
