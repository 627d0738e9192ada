//! # metaobjects Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the metaobjects library. Import this module to get quick access to loaders, nodes,
//! values and registries.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all metaobjects operations
pub use crate::Error;

/// The result type used throughout metaobjects
pub use crate::Result;

// ================================================================================================
// Loading
// ================================================================================================

/// Root of a metadata graph
pub use crate::loader::{MetaDataLoader, MetaDataLoaderRc};

/// Loader configuration and lifecycle
pub use crate::loader::{LoaderConfig, LoaderOptions, LoaderPhase};

/// What a parse applied
pub use crate::parser::ParseSummary;

// ================================================================================================
// Metadata Graph
// ================================================================================================

/// Nodes and references
pub use crate::metadata::{MetaData, MetaDataList, MetaDataRc, MetaDataRef};

/// Node kinds
pub use crate::metadata::{BuiltinType, MetaDataExtension, MetaKind};

/// Typed values
pub use crate::metadata::{DataType, MetaValue};

/// Object instances
pub use crate::metadata::{MetaObjectAware, ObjectInstance, ValueObject};

// ================================================================================================
// Registries
// ================================================================================================

/// Type registration
pub use crate::registry::{
    ChildRequirement, MetaDataFactory, TypeDefinition, TypeFlags, TypeRegistry,
};

/// Context providers, bundles and live loaders
pub use crate::registry::{BundleRegistry, ContextProvider, LoaderRegistry};
