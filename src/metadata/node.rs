//! The metadata node and its inheritance-aware lookups.
//!
//! A [`MetaData`] node has an immutable identity (type, subtype, name), a weak link to its
//! parent, an optional strong link to the node it inherits from (its *super data*), and an
//! [`IndexedCollection`] of owned children.
//!
//! # Inheritance
//!
//! Lookups consult the node's own children first and then walk the super chain. Attributes
//! whose name starts with [`PRIVATE_PREFIX`] are only visible on the node that declares them;
//! they are filtered out of every inherited result.
//!
//! # Overlays
//!
//! [`MetaData::overload`] derives a node with the same identity, no children and the original
//! as super data. A later metadata file attaches the overlay under a different parent and adds
//! or overrides children without touching the original.
//!
//! # Cache Coherence
//!
//! Every structural mutation clears the node's cache, the caches along its super chain and the
//! caches of all nodes that inherit from it, before the mutating call returns.
//!
//! # Examples
//!
//! ```rust
//! use metaobjects::metadata::{MetaData, MetaValue};
//! use std::sync::Arc;
//!
//! let fruit = Arc::new(MetaData::object("value", "Fruit")?);
//! fruit.add_child(Arc::new(MetaData::field("string", "name")?))?;
//! fruit.set_attr_value("_isAbstract", MetaValue::Boolean(true))?;
//!
//! let apple = Arc::new(MetaData::object("value", "Apple")?);
//! apple.set_super_data(fruit.clone())?;
//!
//! assert!(apple.find_child_of_type("field", "name").is_some());
//! assert!(apple.find_attr("_isAbstract").is_none());
//! # Ok::<(), metaobjects::Error>(())
//! ```

use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use parking_lot::RwLock;

use crate::{
    metadata::{
        cache::{CacheStrategy, CacheValue, HybridCache},
        collection::{CollectionStats, IndexedCollection},
        kind::{
            AttributeData, MetaKind, ObjectData, TYPE_ATTR, TYPE_FIELD, TYPE_KEY, TYPE_LOADER,
            TYPE_OBJECT, TYPE_VALIDATOR, TYPE_VIEW,
        },
        names::split_name,
        value::MetaValue,
    },
    Error, Result,
};

/// Names of private attributes start with this marker.
pub const PRIVATE_PREFIX: char = '_';

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle to a metadata node.
pub type MetaDataRc = Arc<MetaData>;
/// List of node handles.
pub type MetaDataList = Vec<MetaDataRc>;

/// A non-owning reference to a [`MetaData`] node.
#[derive(Clone, Debug)]
pub struct MetaDataRef {
    weak_ref: Weak<MetaData>,
}

impl MetaDataRef {
    /// Create a new `MetaDataRef` from a strong reference
    pub fn new(strong_ref: &MetaDataRc) -> Self {
        Self {
            weak_ref: Arc::downgrade(strong_ref),
        }
    }

    /// Get a strong reference to the node, returning None if it has been dropped
    #[must_use]
    pub fn upgrade(&self) -> Option<MetaDataRc> {
        self.weak_ref.upgrade()
    }

    /// Check if the referenced node is still alive
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.weak_ref.strong_count() > 0
    }

    /// Returns `true` if this refers to `node`.
    #[must_use]
    pub fn points_to(&self, node: &MetaDataRc) -> bool {
        std::ptr::eq(self.weak_ref.as_ptr(), Arc::as_ptr(node))
    }
}

impl From<&MetaDataRc> for MetaDataRef {
    fn from(value: &MetaDataRc) -> Self {
        MetaDataRef::new(value)
    }
}

/// A node of the metadata graph.
pub struct MetaData {
    id: u64,
    type_name: String,
    sub_type: String,
    name: String,
    short_name: String,
    package: String,
    kind: MetaKind,
    parent: RwLock<Option<MetaDataRef>>,
    super_data: RwLock<Option<MetaDataRc>>,
    dependents: RwLock<Vec<MetaDataRef>>,
    children: IndexedCollection,
    cache: Box<dyn CacheStrategy>,
}

impl MetaData {
    /// Create a detached node.
    ///
    /// # Arguments
    /// * `type_name` - The metadata type, e.g. `"field"`
    /// * `sub_type` - The subtype, e.g. `"string"`
    /// * `name` - The name, optionally package-qualified with `::`
    /// * `kind` - Kind specific state
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] if any identity component is empty.
    pub fn new(type_name: &str, sub_type: &str, name: &str, kind: MetaKind) -> Result<Self> {
        if type_name.is_empty() || sub_type.is_empty() || name.is_empty() {
            return Err(invalid_metadata!(
                "MetaData requires a type, subType and name, got [{}:{}]{{{}}}",
                type_name,
                sub_type,
                name
            ));
        }

        let (package, short_name) = split_name(name);
        Ok(MetaData {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            type_name: type_name.to_string(),
            sub_type: sub_type.to_string(),
            name: name.to_string(),
            short_name: short_name.to_string(),
            package: package.to_string(),
            kind,
            parent: RwLock::new(None),
            super_data: RwLock::new(None),
            dependents: RwLock::new(Vec::new()),
            children: IndexedCollection::new(),
            cache: Box::new(HybridCache::new()),
        })
    }

    /// Create an attribute whose `sub_type` names its data type.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] for empty names, unknown data types or values that do
    /// not fit the data type.
    pub fn attribute(sub_type: &str, name: &str, value: Option<MetaValue>) -> Result<Self> {
        let data = AttributeData::new(sub_type, value)?;
        MetaData::new(TYPE_ATTR, sub_type, name, MetaKind::Attribute(data))
    }

    /// Create a field.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] for empty identity components.
    pub fn field(sub_type: &str, name: &str) -> Result<Self> {
        MetaData::new(TYPE_FIELD, sub_type, name, MetaKind::Field)
    }

    /// Create an object.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] for empty identity components.
    pub fn object(sub_type: &str, name: &str) -> Result<Self> {
        MetaData::new(TYPE_OBJECT, sub_type, name, MetaKind::Object(ObjectData::default()))
    }

    /// Create a view.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] for empty identity components.
    pub fn view(sub_type: &str, name: &str) -> Result<Self> {
        MetaData::new(TYPE_VIEW, sub_type, name, MetaKind::View)
    }

    /// Create a validator.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] for empty identity components.
    pub fn validator(sub_type: &str, name: &str) -> Result<Self> {
        MetaData::new(TYPE_VALIDATOR, sub_type, name, MetaKind::Validator)
    }

    /// Create a key.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] for empty identity components.
    pub fn key(sub_type: &str, name: &str) -> Result<Self> {
        MetaData::new(TYPE_KEY, sub_type, name, MetaKind::Key)
    }

    /// Create a loader root node.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] for empty identity components.
    pub fn loader(sub_type: &str, name: &str) -> Result<Self> {
        MetaData::new(TYPE_LOADER, sub_type, name, MetaKind::Loader)
    }

    /// Replace the cache strategy of a node that has not been shared yet.
    #[must_use]
    pub fn with_cache(mut self, cache: Box<dyn CacheStrategy>) -> Self {
        self.cache = cache;
        self
    }

    /// Process-unique id of this node.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The metadata type, e.g. `"object"`.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The subtype, e.g. `"value"`.
    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// The full name, including the package.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name without its package.
    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// The package part of the name, empty if unqualified.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Kind specific state.
    #[must_use]
    pub fn kind(&self) -> &MetaKind {
        &self.kind
    }

    /// Name of the node class, see [`MetaKind::class_name`].
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    /// Returns `true` if this node has type `type_name`.
    #[must_use]
    pub fn is_type(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }

    /// Returns `true` if both handles refer to the same node.
    #[must_use]
    pub fn same_node(&self, other: &MetaData) -> bool {
        self.id == other.id
    }

    /// Returns `true` for attributes hidden from inheriting nodes.
    #[must_use]
    pub fn is_private_attr(&self) -> bool {
        self.is_type(TYPE_ATTR) && self.name.starts_with(PRIVATE_PREFIX)
    }

    // ============================================================================================
    // Parent and super links
    // ============================================================================================

    /// The node this one is attached to.
    #[must_use]
    pub fn parent(&self) -> Option<MetaDataRc> {
        self.parent.read().as_ref().and_then(MetaDataRef::upgrade)
    }

    /// Returns `true` if this node is a direct child of `node`.
    #[must_use]
    pub fn is_child_of(&self, node: &MetaDataRc) -> bool {
        self.parent
            .read()
            .as_ref()
            .is_some_and(|parent| parent.points_to(node))
    }

    /// The root of the graph this node is attached to (usually the loader node).
    #[must_use]
    pub fn root(self: &Arc<Self>) -> MetaDataRc {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// The node this one inherits from.
    #[must_use]
    pub fn super_data(&self) -> Option<MetaDataRc> {
        self.super_data.read().clone()
    }

    /// The super chain, nearest first.
    #[must_use]
    pub fn ancestors(&self) -> MetaDataList {
        let mut chain = Vec::new();
        let mut current = self.super_data();
        while let Some(node) = current {
            current = node.super_data();
            chain.push(node);
        }
        chain
    }

    /// Returns `true` if `other` inherits from this node, directly or transitively.
    #[must_use]
    pub fn is_super_of(&self, other: &MetaData) -> bool {
        other.ancestors().iter().any(|a| a.same_node(self))
    }

    /// Inherit from `super_data`.
    ///
    /// The super node must have the same type. Linking a node to itself or to a node that
    /// already inherits from it is rejected.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] on a type mismatch or a cycle.
    pub fn set_super_data(self: &Arc<Self>, super_data: MetaDataRc) -> Result<()> {
        if super_data.type_name != self.type_name {
            return Err(invalid_metadata!(
                "Super data {} must have the same type as {}",
                super_data,
                self
            ));
        }
        if super_data.same_node(self) || super_data.ancestors().iter().any(|a| a.same_node(self)) {
            return Err(invalid_metadata!(
                "Setting super data {} on {} would create a cycle",
                super_data,
                self
            ));
        }

        let previous = self.super_data.write().replace(super_data.clone());
        if let Some(previous) = previous {
            previous.remove_dependent(self);
        }
        super_data.dependents.write().push(MetaDataRef::new(self));

        self.flush_caches();
        if let Some(parent) = self.parent() {
            parent.flush_caches();
        }
        Ok(())
    }

    /// Stop inheriting.
    pub fn clear_super_data(self: &Arc<Self>) {
        let previous = self.super_data.write().take();
        if let Some(previous) = previous {
            previous.remove_dependent(self);
            self.flush_caches();
            if let Some(parent) = self.parent() {
                parent.flush_caches();
            }
        }
    }

    fn remove_dependent(&self, node: &MetaDataRc) {
        self.dependents
            .write()
            .retain(|dependent| dependent.is_valid() && !dependent.points_to(node));
    }

    /// Derive an overlay: same identity, no children, super data pointing at this node.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] for loader nodes, which cannot be overlaid.
    pub fn overload(self: &Arc<Self>) -> Result<MetaDataRc> {
        if self.is_type(TYPE_LOADER) {
            return Err(invalid_metadata!("Loader {} cannot be overloaded", self));
        }

        let derived = Arc::new(MetaData::new(
            &self.type_name,
            &self.sub_type,
            &self.name,
            self.kind.derive(),
        )?);
        derived.set_super_data(self.clone())?;
        Ok(derived)
    }

    // ============================================================================================
    // Child management
    // ============================================================================================

    /// Add a child, replacing a same-named direct attribute.
    ///
    /// # Errors
    /// See [`MetaData::add_child_checked`].
    pub fn add_child(self: &Arc<Self>, child: MetaDataRc) -> Result<()> {
        self.add_child_checked(child, true)
    }

    /// Add a child.
    ///
    /// # Arguments
    /// * `child` - The node to attach
    /// * `check_exists` - Whether an existing direct child with the same (type, name) may be
    ///   replaced (for delete-on-add kinds such as attributes)
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] if the child has this node's type, is attached to
    /// another parent, or collides with an existing direct child that cannot be replaced. The
    /// children are unchanged in all error cases.
    pub fn add_child_checked(
        self: &Arc<Self>,
        child: MetaDataRc,
        check_exists: bool,
    ) -> Result<()> {
        self.check_valid_child(&child)?;

        let existing = self
            .children
            .find_by_name_and_type(child.name(), child.type_name());
        match existing {
            Some(existing) if existing.same_node(&child) => {
                return Err(invalid_metadata!("{} is already a child of {}", child, self));
            }
            Some(existing) if check_exists && existing.kind.delete_on_add() => {
                if !self.children.replace(&existing, child.clone()) {
                    return Err(invalid_metadata!(
                        "Could not replace {} on {}",
                        existing,
                        self
                    ));
                }
                existing.detach();
            }
            Some(existing) => {
                return Err(invalid_metadata!(
                    "{} already exists on {}, cannot add {}",
                    existing,
                    self,
                    child
                ));
            }
            None => {
                if !self.children.add(child.clone()) {
                    return Err(invalid_metadata!(
                        "A child named [{}] of type [{}] was added concurrently to {}",
                        child.name(),
                        child.type_name(),
                        self
                    ));
                }
            }
        }

        *child.parent.write() = Some(MetaDataRef::new(self));
        self.flush_caches();
        Ok(())
    }

    fn check_valid_child(self: &Arc<Self>, child: &MetaDataRc) -> Result<()> {
        if child.type_name == self.type_name {
            return Err(invalid_metadata!(
                "Cannot add {} to {}, a node cannot contain a child of its own type",
                child,
                self
            ));
        }
        if let Some(parent) = child.parent() {
            if !Arc::ptr_eq(&parent, self) {
                return Err(invalid_metadata!(
                    "{} is already attached to {}",
                    child,
                    parent
                ));
            }
        }
        Ok(())
    }

    fn detach(&self) {
        *self.parent.write() = None;
    }

    /// Remove a direct child.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] if `child` is only reachable through the super chain,
    /// and [`Error::NotFound`] if it is not reachable at all.
    pub fn delete_child(&self, child: &MetaDataRc) -> Result<()> {
        if self.children.remove(child) {
            child.detach();
            self.flush_caches();
            return Ok(());
        }

        let inherited = self
            .find_child_of_type(child.type_name(), child.name())
            .is_some_and(|found| found.same_node(child));
        if inherited {
            Err(invalid_metadata!(
                "Cannot delete {} from {}, it belongs to its super data",
                child,
                self
            ))
        } else {
            Err(Error::not_found(child.type_name(), child.name(), self))
        }
    }

    /// Remove the direct child with the given type and name.
    ///
    /// # Errors
    /// Same as [`MetaData::delete_child`].
    pub fn delete_child_of_type(&self, type_name: &str, name: &str) -> Result<MetaDataRc> {
        let child = self.require_child_of_type(type_name, name)?;
        self.delete_child(&child)?;
        Ok(child)
    }

    /// Remove all direct children.
    pub fn clear_children(&self) {
        for child in self.children.clear() {
            child.detach();
        }
        self.flush_caches();
    }

    /// Index statistics of the direct children.
    #[must_use]
    pub fn child_stats(&self) -> CollectionStats {
        self.children.stats()
    }

    // ============================================================================================
    // Lookups
    // ============================================================================================

    fn find_in_chain<F>(&self, lookup: F) -> Option<MetaDataRc>
    where
        F: Fn(&IndexedCollection) -> MetaDataList,
    {
        if let Some(found) = lookup(&self.children).into_iter().next() {
            return Some(found);
        }

        // Private attributes of an ancestor are skipped, not treated as the answer
        let mut current = self.super_data();
        while let Some(ancestor) = current {
            let found = lookup(&ancestor.children)
                .into_iter()
                .find(|child| !child.is_private_attr());
            if found.is_some() {
                return found;
            }
            current = ancestor.super_data();
        }
        None
    }

    fn collect_in_chain<F>(&self, select: F) -> MetaDataList
    where
        F: Fn(&IndexedCollection) -> MetaDataList,
    {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();

        for child in select(&self.children) {
            if seen.insert((child.type_name.clone(), child.name.clone())) {
                merged.push(child);
            }
        }

        let mut current = self.super_data();
        while let Some(ancestor) = current {
            for child in select(&ancestor.children) {
                if child.is_private_attr() {
                    continue;
                }
                if seen.insert((child.type_name.clone(), child.name.clone())) {
                    merged.push(child);
                }
            }
            current = ancestor.super_data();
        }
        merged
    }

    /// Find a child of any type named `name`, own children first.
    #[must_use]
    pub fn find_child(&self, name: &str) -> Option<MetaDataRc> {
        self.find_in_chain(|c| c.find_by_name(name))
    }

    /// Find a child by type and name, own children first.
    #[must_use]
    pub fn find_child_of_type(&self, type_name: &str, name: &str) -> Option<MetaDataRc> {
        self.find_in_chain(|c| c.find_by_name_and_type(name, type_name).into_iter().collect())
    }

    /// Find a child by node class (e.g. `"Field"`) and name, own children first.
    #[must_use]
    pub fn find_child_of_class(&self, class_name: &str, name: &str) -> Option<MetaDataRc> {
        self.find_in_chain(|c| {
            c.find_by_name(name)
                .into_iter()
                .filter(|child| child.class_name() == class_name)
                .collect()
        })
    }

    /// Find a child by type and name among this node's own children only.
    #[must_use]
    pub fn find_direct_child_of_type(&self, type_name: &str, name: &str) -> Option<MetaDataRc> {
        self.children.find_by_name_and_type(name, type_name)
    }

    /// Like [`MetaData::find_child`], failing with [`Error::NotFound`].
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if no child is named `name`.
    pub fn require_child(&self, name: &str) -> Result<MetaDataRc> {
        self.find_child(name)
            .ok_or_else(|| Error::not_found("child", name, self))
    }

    /// Like [`MetaData::find_child_of_type`], failing with [`Error::NotFound`].
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] carrying `type_name` as kind.
    pub fn require_child_of_type(&self, type_name: &str, name: &str) -> Result<MetaDataRc> {
        self.find_child_of_type(type_name, name)
            .ok_or_else(|| Error::not_found(type_name, name, self))
    }

    /// Like [`MetaData::find_child_of_class`], failing with [`Error::NotFound`].
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] carrying `class_name` as kind.
    pub fn require_child_of_class(&self, class_name: &str, name: &str) -> Result<MetaDataRc> {
        self.find_child_of_class(class_name, name)
            .ok_or_else(|| Error::not_found(class_name, name, self))
    }

    /// Returns `true` if a child with this type and name is reachable.
    #[must_use]
    pub fn has_child_of_type(&self, type_name: &str, name: &str) -> bool {
        self.find_child_of_type(type_name, name).is_some()
    }

    /// All reachable children: own children first, then inherited ones not shadowed by a child
    /// with the same (type, name).
    #[must_use]
    pub fn children(&self) -> MetaDataList {
        self.collect_in_chain(IndexedCollection::all)
    }

    /// Iterate over [`MetaData::children`].
    pub fn iter_children(&self) -> impl Iterator<Item = MetaDataRc> {
        self.children().into_iter()
    }

    /// All reachable children of type `type_name`, see [`MetaData::children`].
    #[must_use]
    pub fn children_of_type(&self, type_name: &str) -> MetaDataList {
        self.collect_in_chain(|c| c.find_by_type(type_name))
    }

    /// All reachable children of node class `class_name`, see [`MetaData::children`].
    #[must_use]
    pub fn children_of_class(&self, class_name: &str) -> MetaDataList {
        self.collect_in_chain(|c| c.find_by_class(class_name))
    }

    /// This node's own children, in insertion order.
    #[must_use]
    pub fn direct_children(&self) -> MetaDataList {
        self.children.all()
    }

    /// This node's own children of type `type_name`.
    #[must_use]
    pub fn direct_children_of_type(&self, type_name: &str) -> MetaDataList {
        self.children.find_by_type(type_name)
    }

    // ============================================================================================
    // Cache
    // ============================================================================================

    /// Return the cached value for `key`, computing it on a miss.
    pub fn use_cache<F>(&self, key: &str, compute: F) -> CacheValue
    where
        F: FnOnce() -> CacheValue,
    {
        let mut compute = Some(compute);
        self.cache.compute_if_absent(key, &mut || match compute.take() {
            Some(f) => f(),
            None => CacheValue::Missing,
        })
    }

    /// Look up a cached value.
    #[must_use]
    pub fn cache_value(&self, key: &str) -> Option<CacheValue> {
        self.cache.get(key)
    }

    /// Store a value in the cache.
    pub fn set_cache_value(&self, key: &str, value: CacheValue) {
        self.cache.put(key, value);
    }

    /// The cache of this node.
    #[must_use]
    pub fn cache(&self) -> &dyn CacheStrategy {
        self.cache.as_ref()
    }

    /// Clear this node's cache, the caches of its super chain and of every node inheriting
    /// from it.
    pub fn flush_caches(&self) {
        self.cache.clear();

        let mut current = self.super_data();
        while let Some(ancestor) = current {
            ancestor.cache.clear();
            current = ancestor.super_data();
        }

        let mut visited = HashSet::from([self.id]);
        let mut pending: Vec<MetaDataRc> = self.live_dependents();
        while let Some(node) = pending.pop() {
            if !visited.insert(node.id) {
                continue;
            }
            node.cache.clear();
            pending.extend(node.live_dependents());
        }
    }

    fn live_dependents(&self) -> MetaDataList {
        let mut dependents = self.dependents.write();
        dependents.retain(MetaDataRef::is_valid);
        dependents.iter().filter_map(MetaDataRef::upgrade).collect()
    }
}

impl fmt::Display for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}:{}]{{{}}}",
            self.class_name(),
            self.type_name,
            self.sub_type,
            self.name
        )?;
        if let Some(parent) = self.parent() {
            write!(f, "@{}", parent.name)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaData")
            .field("id", &self.id)
            .field("type", &self.type_name)
            .field("sub_type", &self.sub_type)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("children", &self.children.len())
            .field("super", &self.super_data().map(|s| s.name.clone()))
            .finish()
    }
}
