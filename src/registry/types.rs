//! Registry of metadata types.
//!
//! The [`TypeRegistry`] maps every legal (type, subtype) pair to a [`TypeDefinition`]: the
//! factory that builds nodes of that kind, descriptive information, flags, and the rules for
//! which children a node of that kind accepts.
//!
//! # Registry Architecture
//!
//! - **Primary storage**: `SkipMap` keyed by [`TypeKey`], giving ordered iteration
//! - **Subtype index**: `DashMap` from type name to its registered subtypes
//! - **Defaults**: `DashMap` from type name to the subtype used when a file omits one
//! - **Context providers**: a [`ContextRegistry`] consulted before the defaults
//!
//! # Construction Ladder
//!
//! Factories come in four arities ([`MetaDataFactory`]): type + subtype + name, subtype +
//! name, name only, and no arguments. Whatever arity a definition registers,
//! [`TypeRegistry::create_instance`] checks that the built node reports exactly the requested
//! (type, subtype, name); a factory that builds something else is rejected.
//!
//! # Scoping
//!
//! [`TypeRegistry::global`] returns the process-wide registry with the core types. Independent
//! registries are created with [`TypeRegistry::with_core_types`] or [`TypeRegistry::new`] and can
//! be tracked per bundle through [`crate::registry::BundleRegistry`].
//!
//! # Thread Safety
//!
//! All operations take `&self`; definitions are immutable once registered and shared as
//! `Arc<TypeDefinition>`.
//!
//! # Examples
//!
//! ```rust
//! use metaobjects::registry::TypeRegistry;
//!
//! let registry = TypeRegistry::with_core_types();
//! let field = registry.create_instance("field", "string", "foo")?;
//! assert_eq!((field.type_name(), field.sub_type(), field.name()), ("field", "string", "foo"));
//! assert_eq!(registry.default_sub_type("object").as_deref(), Some("value"));
//! # Ok::<(), metaobjects::Error>(())
//! ```

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock,
    },
};

use bitflags::bitflags;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    metadata::{kind::TYPE_ATTR, MetaData, MetaDataRc},
    registry::{builtin, context::ContextRegistry},
    Error, Result,
};

/// Wildcard accepted in child requirements.
pub const WILDCARD: &str = "*";

bitflags! {
    /// Properties of a registered type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u32 {
        /// Nodes of this type cannot be instantiated
        const ABSTRACT = 0x0001;
        /// This subtype is the default for its type
        const DEFAULT_SUBTYPE = 0x0002;
        /// Nodes of this type may have children
        const ALLOWS_CHILDREN = 0x0004;
    }
}

/// Identifies a registered type: `(type, subtype)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    /// The type name, e.g. `"field"`
    pub type_name: String,
    /// The subtype name, e.g. `"string"`
    pub sub_type: String,
}

impl TypeKey {
    /// Create a key.
    pub fn new(type_name: &str, sub_type: &str) -> Self {
        TypeKey {
            type_name: type_name.to_string(),
            sub_type: sub_type.to_string(),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.sub_type)
    }
}

type FullFn = dyn Fn(&str, &str, &str) -> Result<MetaData> + Send + Sync;
type SubTypeNameFn = dyn Fn(&str, &str) -> Result<MetaData> + Send + Sync;
type NameFn = dyn Fn(&str) -> Result<MetaData> + Send + Sync;
type DefaultFn = dyn Fn() -> Result<MetaData> + Send + Sync;

/// How a [`TypeDefinition`] builds nodes.
#[derive(Clone)]
pub enum MetaDataFactory {
    /// Called with type, subtype and name
    Full(Arc<FullFn>),
    /// Called with subtype and name
    SubTypeName(Arc<SubTypeNameFn>),
    /// Called with the name only
    Name(Arc<NameFn>),
    /// Called without arguments
    Default(Arc<DefaultFn>),
}

impl MetaDataFactory {
    /// Factory receiving type, subtype and name.
    pub fn full<F>(f: F) -> Self
    where
        F: Fn(&str, &str, &str) -> Result<MetaData> + Send + Sync + 'static,
    {
        MetaDataFactory::Full(Arc::new(f))
    }

    /// Factory receiving subtype and name.
    pub fn sub_type_name<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> Result<MetaData> + Send + Sync + 'static,
    {
        MetaDataFactory::SubTypeName(Arc::new(f))
    }

    /// Factory receiving the name.
    pub fn name<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<MetaData> + Send + Sync + 'static,
    {
        MetaDataFactory::Name(Arc::new(f))
    }

    /// Factory without arguments.
    pub fn default_ctor<F>(f: F) -> Self
    where
        F: Fn() -> Result<MetaData> + Send + Sync + 'static,
    {
        MetaDataFactory::Default(Arc::new(f))
    }

    /// Number of arguments the factory takes.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            MetaDataFactory::Full(_) => 3,
            MetaDataFactory::SubTypeName(_) => 2,
            MetaDataFactory::Name(_) => 1,
            MetaDataFactory::Default(_) => 0,
        }
    }

    fn build(&self, type_name: &str, sub_type: &str, name: &str) -> Result<MetaData> {
        match self {
            MetaDataFactory::Full(f) => f(type_name, sub_type, name),
            MetaDataFactory::SubTypeName(f) => f(sub_type, name),
            MetaDataFactory::Name(f) => f(name),
            MetaDataFactory::Default(f) => f(),
        }
    }
}

impl fmt::Debug for MetaDataFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetaDataFactory(arity={})", self.arity())
    }
}

/// A rule describing children a type accepts. `*` matches anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRequirement {
    /// Accepted child type
    pub type_name: String,
    /// Accepted child subtype
    pub sub_type: String,
    /// Accepted child name
    pub name: String,
    /// Whether a child matching this rule must exist
    pub required: bool,
}

impl ChildRequirement {
    /// Accept any child of `type_name`.
    pub fn any_of(type_name: &str) -> Self {
        ChildRequirement {
            type_name: type_name.to_string(),
            sub_type: WILDCARD.to_string(),
            name: WILDCARD.to_string(),
            required: false,
        }
    }

    /// Accept the named child of the given type and subtype.
    pub fn named(type_name: &str, sub_type: &str, name: &str, required: bool) -> Self {
        ChildRequirement {
            type_name: type_name.to_string(),
            sub_type: sub_type.to_string(),
            name: name.to_string(),
            required,
        }
    }

    /// Returns `true` if a child with this identity satisfies the rule.
    #[must_use]
    pub fn matches(&self, type_name: &str, sub_type: &str, name: &str) -> bool {
        let hit = |rule: &str, value: &str| rule == WILDCARD || rule == value;
        hit(&self.type_name, type_name) && hit(&self.sub_type, sub_type) && hit(&self.name, name)
    }
}

impl fmt::Display for ChildRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}[{}]", self.type_name, self.sub_type, self.name)?;
        if self.required {
            f.write_str(" (required)")?;
        }
        Ok(())
    }
}

/// A registered metadata type.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    key: TypeKey,
    implementation: String,
    description: String,
    flags: TypeFlags,
    children: Vec<ChildRequirement>,
    factory: MetaDataFactory,
}

impl TypeDefinition {
    /// Create a definition.
    ///
    /// # Arguments
    /// * `type_name` / `sub_type` - The identity of the type
    /// * `implementation` - Name of the implementation, compared on re-registration
    /// * `factory` - How nodes are built
    pub fn new(
        type_name: &str,
        sub_type: &str,
        implementation: &str,
        factory: MetaDataFactory,
    ) -> Self {
        TypeDefinition {
            key: TypeKey::new(type_name, sub_type),
            implementation: implementation.to_string(),
            description: String::new(),
            flags: TypeFlags::ALLOWS_CHILDREN,
            children: Vec::new(),
            factory,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Replace the flags.
    #[must_use]
    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Add a child rule.
    #[must_use]
    pub fn with_child(mut self, requirement: ChildRequirement) -> Self {
        self.children.push(requirement);
        self
    }

    /// `(type, subtype)` of this definition.
    #[must_use]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// The type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.key.type_name
    }

    /// The subtype name.
    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.key.sub_type
    }

    /// `type.subType`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        self.key.to_string()
    }

    /// The implementation name.
    #[must_use]
    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    /// The description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The flags.
    #[must_use]
    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    /// The factory.
    #[must_use]
    pub fn factory(&self) -> &MetaDataFactory {
        &self.factory
    }

    /// The child rules.
    #[must_use]
    pub fn child_requirements(&self) -> &[ChildRequirement] {
        &self.children
    }

    /// Returns `true` if a child with this identity may be added.
    ///
    /// Types without [`TypeFlags::ALLOWS_CHILDREN`] accept nothing; types without rules accept
    /// everything.
    #[must_use]
    pub fn accepts_child(&self, type_name: &str, sub_type: &str, name: &str) -> bool {
        if !self.flags.contains(TypeFlags::ALLOWS_CHILDREN) {
            return false;
        }
        self.children.is_empty()
            || self
                .children
                .iter()
                .any(|rule| rule.matches(type_name, sub_type, name))
    }

    /// Human readable list of the accepted children.
    #[must_use]
    pub fn supported_children_description(&self) -> String {
        if !self.flags.contains(TypeFlags::ALLOWS_CHILDREN) {
            return "none".to_string();
        }
        if self.children.is_empty() {
            return "any".to_string();
        }
        self.children
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Counters of a [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Registered (type, subtype) pairs
    pub registered_types: usize,
    /// Distinct type names
    pub type_names: usize,
    /// Types with a default subtype
    pub defaults: usize,
    /// Nodes built through [`TypeRegistry::create_instance`]
    pub instances_created: u64,
    /// Registered context providers
    pub context_providers: usize,
}

/// Registry mapping (type, subtype) to [`TypeDefinition`]s.
pub struct TypeRegistry {
    /// Primary storage, ordered by (type, subtype)
    types: SkipMap<TypeKey, Arc<TypeDefinition>>,
    /// Secondary index: subtypes registered per type
    sub_types: DashMap<String, Vec<String>>,
    /// Default subtype per type
    defaults: DashMap<String, String>,
    /// Nodes built so far
    instances_created: AtomicU64,
    /// Context-aware subtype resolution
    context: ContextRegistry,
    /// Serialises writers so check-and-insert spans all indices
    writer: Mutex<()>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<TypeRegistry>> = OnceLock::new();

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create an empty registry without types or context providers.
    #[must_use]
    pub fn new() -> Self {
        TypeRegistry {
            types: SkipMap::new(),
            sub_types: DashMap::new(),
            defaults: DashMap::new(),
            instances_created: AtomicU64::new(0),
            context: ContextRegistry::new(),
            writer: Mutex::new(()),
        }
    }

    /// Create a registry with the built-in types and the core context provider.
    #[must_use]
    pub fn with_core_types() -> Self {
        let registry = TypeRegistry::new();
        builtin::register_core_types(&registry);
        registry
    }

    /// The process-wide registry, created with the core types on first use.
    pub fn global() -> Arc<TypeRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(TypeRegistry::with_core_types()))
            .clone()
    }

    /// Register a type.
    ///
    /// Registering the same (type, subtype) with the same implementation again is a no-op.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] if the pair is registered with another implementation.
    pub fn register_type(&self, definition: TypeDefinition) -> Result<()> {
        let _writer = self.writer.lock();
        if let Some(existing) = self.types.get(definition.key()) {
            let existing = existing.value();
            if existing.implementation() == definition.implementation() {
                warn!(
                    "Type [{}] is already registered with [{}], ignoring",
                    definition.key(),
                    definition.implementation()
                );
                return Ok(());
            }
            return Err(invalid_metadata!(
                "Type [{}] is already registered with [{}], cannot register [{}]",
                definition.key(),
                existing.implementation(),
                definition.implementation()
            ));
        }

        let key = definition.key().clone();
        if definition.flags().contains(TypeFlags::DEFAULT_SUBTYPE) {
            self.defaults
                .insert(key.type_name.clone(), key.sub_type.clone());
        }
        self.sub_types
            .entry(key.type_name.clone())
            .or_default()
            .push(key.sub_type.clone());

        debug!("Registered type [{}] -> [{}]", key, definition.implementation());
        self.types.insert(key, Arc::new(definition));
        Ok(())
    }

    /// Remove a type.
    pub fn unregister_type(&self, type_name: &str, sub_type: &str) -> Option<Arc<TypeDefinition>> {
        let _writer = self.writer.lock();
        let key = TypeKey::new(type_name, sub_type);
        let removed = self.types.remove(&key)?.value().clone();

        let mut empty = false;
        if let Some(mut subs) = self.sub_types.get_mut(type_name) {
            subs.retain(|s| s != sub_type);
            empty = subs.is_empty();
        }
        if empty {
            self.sub_types.remove(type_name);
        }
        self.defaults
            .remove_if(type_name, |_, default| default == sub_type);

        Some(removed)
    }

    /// Find a definition.
    #[must_use]
    pub fn find_type(&self, type_name: &str, sub_type: &str) -> Option<Arc<TypeDefinition>> {
        self.types
            .get(&TypeKey::new(type_name, sub_type))
            .map(|entry| entry.value().clone())
    }

    /// Find a definition or fail.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the pair is not registered.
    pub fn require_type(&self, type_name: &str, sub_type: &str) -> Result<Arc<TypeDefinition>> {
        self.find_type(type_name, sub_type).ok_or_else(|| {
            Error::not_found("type", TypeKey::new(type_name, sub_type).to_string(), self)
        })
    }

    /// Returns `true` if any subtype of `type_name` is registered.
    #[must_use]
    pub fn has_type(&self, type_name: &str) -> bool {
        self.sub_types.contains_key(type_name)
    }

    /// Returns `true` if the pair is registered.
    #[must_use]
    pub fn has_sub_type(&self, type_name: &str, sub_type: &str) -> bool {
        self.types.contains_key(&TypeKey::new(type_name, sub_type))
    }

    /// All registered pairs, ordered by type then subtype.
    #[must_use]
    pub fn registered_types(&self) -> Vec<TypeKey> {
        self.types.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Subtypes registered for `type_name`, in registration order.
    #[must_use]
    pub fn sub_types_of(&self, type_name: &str) -> Vec<String> {
        self.sub_types
            .get(type_name)
            .map(|subs| subs.clone())
            .unwrap_or_default()
    }

    /// The subtype used when a declaration of `type_name` does not name one.
    #[must_use]
    pub fn default_sub_type(&self, type_name: &str) -> Option<String> {
        self.defaults.get(type_name).map(|sub| sub.clone())
    }

    /// Change the default subtype of `type_name`.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the pair is not registered.
    pub fn set_default_sub_type(&self, type_name: &str, sub_type: &str) -> Result<()> {
        self.require_type(type_name, sub_type)?;
        self.defaults
            .insert(type_name.to_string(), sub_type.to_string());
        Ok(())
    }

    /// Build a node through the registered factory and verify its identity.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for unregistered pairs, and [`Error::InvalidMetadata`] for
    /// abstract types, failing factories, or nodes whose identity differs from the request.
    pub fn create_instance(
        &self,
        type_name: &str,
        sub_type: &str,
        name: &str,
    ) -> Result<MetaDataRc> {
        let definition = self.require_type(type_name, sub_type)?;
        if definition.flags().contains(TypeFlags::ABSTRACT) {
            return Err(invalid_metadata!(
                "Type [{}] is abstract and cannot be instantiated",
                definition.key()
            ));
        }

        let node = definition.factory().build(type_name, sub_type, name)?;
        if node.type_name() != type_name || node.sub_type() != sub_type || node.name() != name {
            return Err(invalid_metadata!(
                "Implementation [{}] of type [{}] built [{}:{}]{{{}}} instead of [{}:{}]{{{}}}",
                definition.implementation(),
                definition.key(),
                node.type_name(),
                node.sub_type(),
                node.name(),
                type_name,
                sub_type,
                name
            ));
        }

        self.instances_created.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(node))
    }

    /// Returns `true` if `parent` may hold a child with the given identity. Parents whose type
    /// is not registered accept everything.
    #[must_use]
    pub fn accepts_child(
        &self,
        parent: &MetaData,
        child_type: &str,
        child_sub_type: &str,
        child_name: &str,
    ) -> bool {
        match self.find_type(parent.type_name(), parent.sub_type()) {
            Some(definition) => definition.accepts_child(child_type, child_sub_type, child_name),
            None => true,
        }
    }

    /// The context providers of this registry.
    #[must_use]
    pub fn context(&self) -> &ContextRegistry {
        &self.context
    }

    /// Resolve the subtype of an attribute named `attr_name` declared on `parent` without an
    /// explicit subtype: context providers first, then nothing.
    #[must_use]
    pub fn resolve_attribute_sub_type(&self, parent: &MetaData, attr_name: &str) -> Option<String> {
        self.context
            .attribute_sub_type(parent.type_name(), parent.sub_type(), attr_name)
            .filter(|sub| self.has_sub_type(TYPE_ATTR, sub))
    }

    /// Resolve the subtype of a child declared without one: context providers first, then the
    /// registry default for `child_type`.
    #[must_use]
    pub fn resolve_child_sub_type(
        &self,
        parent: &MetaData,
        child_type: &str,
        child_name: &str,
    ) -> Option<String> {
        self.context
            .child_sub_type(parent.type_name(), parent.sub_type(), child_type, child_name)
            .filter(|sub| self.has_sub_type(child_type, sub))
            .or_else(|| self.default_sub_type(child_type))
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            registered_types: self.types.len(),
            type_names: self.sub_types.len(),
            defaults: self.defaults.len(),
            instances_created: self.instances_created.load(Ordering::Relaxed),
            context_providers: self.context.len(),
        }
    }

    /// Remove all types and defaults. Context providers stay registered.
    pub fn clear(&self) {
        let _writer = self.writer.lock();
        self.types.clear();
        self.sub_types.clear();
        self.defaults.clear();
    }
}

impl fmt::Display for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRegistry[{} types]", self.types.len())
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::metadata::MetaKind;

    fn custom_field(implementation: &str) -> TypeDefinition {
        TypeDefinition::new(
            "field",
            "currency",
            implementation,
            MetaDataFactory::full(|t, s, n| MetaData::new(t, s, n, MetaKind::Field)),
        )
    }

    #[test]
    fn test_register_idempotent_and_conflicting() {
        let registry = TypeRegistry::new();
        registry.register_type(custom_field("CurrencyField")).unwrap();
        registry.register_type(custom_field("CurrencyField")).unwrap();
        assert_eq!(registry.stats().registered_types, 1);

        let err = registry.register_type(custom_field("MoneyField")).unwrap_err();
        assert!(err.is_invalid_metadata());
        assert_eq!(
            registry.require_type("field", "currency").unwrap().implementation(),
            "CurrencyField"
        );
    }

    #[test]
    fn test_concurrent_conflicting_registrations() {
        for _ in 0..50 {
            let registry = TypeRegistry::new();
            let accepted: usize = std::thread::scope(|scope| {
                let handles: Vec<_> = ["CurrencyField", "MoneyField", "CashField", "CoinField"]
                    .into_iter()
                    .map(|implementation| {
                        let registry = &registry;
                        scope.spawn(move || registry.register_type(custom_field(implementation)))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap())
                    .filter(Result::is_ok)
                    .count()
            });
            assert_eq!(accepted, 1);
            assert_eq!(registry.sub_types_of("field"), ["currency"]);
            assert_eq!(registry.stats().registered_types, 1);
        }
    }

    #[rstest]
    #[case::full(MetaDataFactory::full(|t, s, n| MetaData::new(t, s, n, MetaKind::Field)))]
    #[case::sub_type_name(MetaDataFactory::sub_type_name(|s, n| MetaData::field(s, n)))]
    #[case::name(MetaDataFactory::name(|n| MetaData::field("string", n)))]
    fn test_create_instance_identity(#[case] factory: MetaDataFactory) {
        let registry = TypeRegistry::new();
        registry
            .register_type(TypeDefinition::new("field", "string", "StringField", factory))
            .unwrap();

        let node = registry.create_instance("field", "string", "foo").unwrap();
        assert_eq!(node.type_name(), "field");
        assert_eq!(node.sub_type(), "string");
        assert_eq!(node.name(), "foo");
        assert_eq!(registry.stats().instances_created, 1);
    }

    #[test]
    fn test_create_instance_identity_mismatch() {
        let registry = TypeRegistry::new();
        registry
            .register_type(TypeDefinition::new(
                "field",
                "string",
                "FixedNameField",
                MetaDataFactory::default_ctor(|| MetaData::field("string", "fixed")),
            ))
            .unwrap();
        registry
            .register_type(TypeDefinition::new(
                "field",
                "int",
                "WrongSubTypeField",
                MetaDataFactory::sub_type_name(|_, n| MetaData::field("long", n)),
            ))
            .unwrap();

        assert!(registry.create_instance("field", "string", "fixed").is_ok());
        assert!(registry
            .create_instance("field", "string", "foo")
            .unwrap_err()
            .is_invalid_metadata());
        assert!(registry
            .create_instance("field", "int", "foo")
            .unwrap_err()
            .is_invalid_metadata());
        assert!(registry
            .create_instance("field", "missing", "foo")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_abstract_type_not_instantiable() {
        let registry = TypeRegistry::new();
        registry
            .register_type(custom_field("BaseField").with_flags(TypeFlags::ABSTRACT))
            .unwrap();
        assert!(registry.create_instance("field", "currency", "x").is_err());
    }

    #[test]
    fn test_defaults_and_unregister() {
        let registry = TypeRegistry::new();
        registry
            .register_type(custom_field("CurrencyField").with_flags(
                TypeFlags::DEFAULT_SUBTYPE | TypeFlags::ALLOWS_CHILDREN,
            ))
            .unwrap();
        assert_eq!(registry.default_sub_type("field").as_deref(), Some("currency"));
        assert!(registry.has_type("field"));
        assert_eq!(registry.sub_types_of("field"), ["currency"]);

        assert!(registry.set_default_sub_type("field", "nope").is_err());

        registry.unregister_type("field", "currency").unwrap();
        assert!(!registry.has_type("field"));
        assert!(registry.default_sub_type("field").is_none());
    }

    #[test]
    fn test_child_requirements() {
        let definition = custom_field("CurrencyField")
            .with_child(ChildRequirement::any_of("attr"))
            .with_child(ChildRequirement::named("validator", "required", "*", false));

        assert!(definition.accepts_child("attr", "string", "pattern"));
        assert!(definition.accepts_child("validator", "required", "v1"));
        assert!(!definition.accepts_child("validator", "regex", "v1"));
        assert!(!definition.accepts_child("view", "text", "v1"));
        assert_eq!(
            definition.supported_children_description(),
            "attr.*[*], validator.required[*]"
        );

        let leaf = custom_field("Leaf").with_flags(TypeFlags::empty());
        assert!(!leaf.accepts_child("attr", "string", "x"));
        assert_eq!(leaf.supported_children_description(), "none");
    }

    #[test]
    fn test_registered_types_are_ordered() {
        let registry = TypeRegistry::with_core_types();
        let keys = registry.registered_types();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(registry.has_sub_type("key", "primary"));
        assert_eq!(registry.to_string(), format!("TypeRegistry[{} types]", keys.len()));
    }

    #[test]
    fn test_global_is_shared() {
        let a = TypeRegistry::global();
        let b = TypeRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.has_type("object"));
    }
}
