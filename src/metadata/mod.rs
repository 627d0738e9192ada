//! The metadata graph.
//!
//! This module contains the node type of the metadata graph and everything it is built from:
//! child storage, per-node caching, typed values, and the kind-specific accessors for
//! attributes, fields and objects.
//!
//! # Key Components
//!
//! - [`MetaData`] - A node: identity, parent and super links, children, cache
//! - [`collection::IndexedCollection`] - Ordered child storage with name/type/class indices
//! - [`cache::CacheStrategy`] - Per-node memoization, invalidated on structural change
//! - [`kind::MetaKind`] - Built-in node kinds plus the [`kind::MetaDataExtension`] hook
//! - [`value::MetaValue`] - Typed attribute and field values
//! - [`object::ValueObject`] - Dynamic instances of object nodes
//! - [`validator`] - Checks of instance values against field validators
//! - [`names`] - Package-qualified names and relative reference expansion
//!
//! # Examples
//!
//! ```rust
//! use metaobjects::metadata::{MetaData, MetaValue};
//! use std::sync::Arc;
//!
//! let fruit = Arc::new(MetaData::object("value", "acme::Fruit")?);
//! let name = Arc::new(MetaData::field("string", "name")?);
//! name.set_attr_value("required", MetaValue::Boolean(true))?;
//! fruit.add_child(name)?;
//!
//! let apple = Arc::new(MetaData::object("value", "acme::Apple")?);
//! apple.set_super_data(fruit)?;
//!
//! let field = apple.meta_field("name")?;
//! assert!(field.is_required());
//! # Ok::<(), metaobjects::Error>(())
//! ```

/// Attribute accessors
mod attribute;
/// Per-node caches
pub mod cache;
/// Indexed child storage
pub mod collection;
/// Field accessors
pub mod field;
/// Node kinds and extension hook
pub mod kind;
/// Package-qualified names
pub mod names;
/// The metadata node
mod node;
/// Objects and value objects
pub mod object;
/// Validators and instance validation
pub mod validator;
/// Typed values
pub mod value;

pub use kind::{BuiltinType, MetaDataExtension, MetaKind};
pub use node::{MetaData, MetaDataList, MetaDataRc, MetaDataRef, PRIVATE_PREFIX};
pub use object::{MetaObjectAware, ObjectInstance, ValueObject};
pub use value::{DataType, MetaValue};
