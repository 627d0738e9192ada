// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # metaobjects
//!
//! A metadata graph engine. Applications describe their domain objects, fields, attributes,
//! validators, views and keys in XML or JSON files; `metaobjects` loads those files into an
//! in-memory graph of typed nodes with single inheritance, overlays, and cached lookups, and
//! answers queries about it at runtime.
//!
//! ## Features
//!
//! - **🌳 Typed metadata graph** - Nodes identified by type, subtype and package-qualified name
//! - **🧬 Inheritance and overlays** - Children are inherited along a super chain and can be
//!   extended without touching the original declaration
//! - **⚡ Cached lookups** - Per-node caches invalidated across the super chain and dependents
//! - **🧩 Extensible type system** - Register new types and subtypes with factories and child
//!   rules
//! - **📄 XML and JSON** - Both formats share one set of naming, package and super rules
//! - **🔁 Reverse lookup** - Find the object node describing an application instance
//! - **✅ Validation** - Field validators, inherited through overlays, checked against instances
//!
//! ## Quick Start
//!
//! ```rust
//! use metaobjects::prelude::*;
//!
//! let loader = MetaDataLoader::manual("produce")?;
//! loader.init()?;
//! loader.parse_json("fruit.json", r#"{ "metadata": { "package": "acme", "children": [
//!     { "object": { "name": "Fruit", "@_isAbstract": true, "children": [
//!         { "field": { "name": "name", "@required": true } },
//!         { "field": { "name": "weight", "type": "double" } }
//!     ] } }
//! ] } }"#)?;
//! loader.parse_xml("apple.xml", br#"<metadata package="acme">
//!     <object name="Apple" super="Fruit"/>
//! </metadata>"#)?;
//!
//! let apple = loader.meta_object_by_name("acme::Apple")?;
//! assert!(apple.meta_field("name")?.is_required());
//! assert!(!apple.is_abstract());
//!
//! let instance = apple.new_instance()?;
//! apple.meta_field("weight")?.set_object_value(&instance, Some(MetaValue::Int(150)))?;
//! assert_eq!(instance.get("weight"), Some(MetaValue::Double(150.0)));
//! # Ok::<(), metaobjects::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - The node type, child collections, caches, values, instances and validators
//! - [`registry`] - Type definitions, context-aware subtypes, bundles and live loaders
//! - [`loader`] - Graph roots with a lifecycle, configuration and queries
//! - [`parser`] - XML and JSON front-ends over a shared builder
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! The crate logs through [`tracing`]: resolution steps at `debug`, skipped declarations and
//! duplicate registrations at `warn`, and per-file load summaries at `info` when a loader runs
//! with `verbose=true`. No subscriber is installed.
#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use metaobjects::prelude::*;
///
/// let loader = MetaDataLoader::manual("prelude")?;
/// loader.init()?;
/// assert_eq!(loader.phase(), LoaderPhase::Initialized);
/// # Ok::<(), metaobjects::Error>(())
/// ```
pub mod prelude;

/// The metadata graph: nodes, children, caches, values and instances.
pub mod metadata;

/// Type, context, bundle and loader registries.
pub mod registry;

/// Loaders: graph roots with lifecycle, configuration and queries.
pub mod loader;

/// XML and JSON metadata parsers.
pub mod parser;

/// `metaobjects` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use metaobjects::{loader::MetaDataLoader, metadata::MetaDataRc, Result};
///
/// fn fruit(loader: &MetaDataLoader) -> Result<MetaDataRc> {
///     loader.meta_object_by_name("acme::Fruit")
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `metaobjects` Error type
///
/// # Examples
///
/// ```rust
/// use metaobjects::{loader::MetaDataLoader, Error};
///
/// let loader = MetaDataLoader::manual("errors")?;
/// match loader.meta_objects() {
///     Err(Error::LoaderState { phase, .. }) => println!("not ready: {phase}"),
///     Err(e) => println!("Error: {e}"),
///     Ok(objects) => println!("{} objects", objects.len()),
/// }
/// # Ok::<(), Error>(())
/// ```
pub use error::Error;

/// Root of a metadata graph. See [`loader::MetaDataLoader`].
pub use loader::MetaDataLoader;
