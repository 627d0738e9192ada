//! Registries of types and loaders.
//!
//! - [`TypeRegistry`] - Legal (type, subtype) pairs, their factories and child rules
//! - [`ContextRegistry`] - Context-aware subtypes for declarations that omit them
//! - [`BundleRegistry`] - Independent type registries per bundle
//! - [`LoaderRegistry`] - Live loaders, used for reverse lookups from instances
//!
//! # Examples
//!
//! ```rust
//! use metaobjects::registry::{TypeDefinition, TypeRegistry, MetaDataFactory};
//! use metaobjects::metadata::MetaData;
//!
//! let registry = TypeRegistry::with_core_types();
//! registry.register_type(TypeDefinition::new(
//!     "field",
//!     "currency",
//!     "acme.CurrencyField",
//!     MetaDataFactory::sub_type_name(MetaData::field),
//! ))?;
//! assert!(registry.has_sub_type("field", "currency"));
//! # Ok::<(), metaobjects::Error>(())
//! ```

/// Per-bundle type registries
pub mod bundle;
/// Context-aware subtype resolution
pub mod context;
/// Built-in type registrations
mod builtin;
/// Live loaders
pub mod loaders;
/// Type definitions and the type registry
pub mod types;

pub use bundle::BundleRegistry;
pub use context::{ContextProvider, ContextRegistry, CoreContextProvider};
pub use loaders::LoaderRegistry;
pub use types::{
    ChildRequirement, MetaDataFactory, RegistryStats, TypeDefinition, TypeFlags, TypeKey,
    TypeRegistry,
};
