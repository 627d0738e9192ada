use std::fmt;

use thiserror::Error;

use crate::loader::LoaderPhase;

macro_rules! invalid_metadata {
    // Single string version
    ($msg:expr) => {
        crate::Error::InvalidMetadata {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidMetadata {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants follow the three failure families of the metadata graph: lookups that miss,
/// structural violations of the graph, and configuration or loading failures. All of them are
/// returned through [`crate::Result`]; "find" style APIs swallow [`Error::NotFound`] internally
/// and return `Option` instead.
///
/// # Error Categories
///
/// ## Lookup Errors
/// - [`Error::NotFound`] - A child, attribute, field, type or loader does not exist
///
/// ## Structural Errors
/// - [`Error::InvalidMetadata`] - Self-type child, duplicate child, wrong-owner deletion,
///   super cycle, failed identity check after construction
///
/// ## Configuration and Loading Errors
/// - [`Error::Configuration`] - Invalid loader configuration
/// - [`Error::LoaderState`] - Operation not permitted in the loader's current lifecycle phase
/// - [`Error::Loading`] - A metadata file could not be applied to the graph
///
/// ## Validation Errors
/// - [`Error::Validation`] - An instance value was rejected by a field's validators
///
/// ## I/O and Format Errors
/// - [`Error::Io`] - Filesystem I/O errors
/// - [`Error::Json`] - JSON decoding errors from `serde_json`
/// - [`Error::Xml`] - XML decoding errors from `quick-xml`
///
/// # Examples
///
/// ```rust
/// use metaobjects::{Error, loader::MetaDataLoader};
///
/// let loader = MetaDataLoader::manual("docs")?;
/// loader.init()?;
///
/// match loader.meta_object_by_name("Missing") {
///     Ok(object) => println!("found {object}"),
///     Err(Error::NotFound { kind, name, owner }) => {
///         println!("{kind} [{name}] is not defined in {owner}");
///     }
///     Err(e) => return Err(e),
/// }
/// # Ok::<(), metaobjects::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A requested element of the metadata graph does not exist.
    ///
    /// Produced by all "require" style lookups. The error carries the queried name together
    /// with the rendering of the node that was searched.
    ///
    /// # Fields
    ///
    /// * `kind` - What was looked up (`"field"`, `"attr"`, `"type"`, `"loader"`, ...)
    /// * `name` - The queried name
    /// * `owner` - The node or registry that was searched
    #[error("{kind} [{name}] not found in {owner}")]
    NotFound {
        /// The kind of element that was requested
        kind: String,
        /// The name that was requested
        name: String,
        /// Rendering of the searched owner
        owner: String,
    },

    /// A structural rule of the metadata graph was violated.
    ///
    /// Includes the source location where the violation was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violation
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Invalid metadata - {file}:{line}: {message}")]
    InvalidMetadata {
        /// The message to be printed for the InvalidMetadata error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The loader configuration is invalid.
    ///
    /// Covers missing source directories, unsupported source formats and loaders that need a
    /// registry but were not given one.
    #[error("Configuration error - {0}")]
    Configuration(String),

    /// An operation is not allowed in the current lifecycle phase of a loader.
    #[error("Loader [{loader}] cannot {operation} while {phase}")]
    LoaderState {
        /// Name of the loader
        loader: String,
        /// The phase the loader was in
        phase: LoaderPhase,
        /// The rejected operation
        operation: &'static str,
    },

    /// A metadata file could not be applied to the graph.
    ///
    /// Raised for unresolved super references, unknown types in strict mode and malformed
    /// document roots. The whole file load is aborted.
    #[error("Failed to load [{resource}]: {message}")]
    Loading {
        /// The file or resource name being loaded
        resource: String,
        /// What went wrong
        message: String,
    },

    /// A value on an object instance did not pass a field's validators.
    ///
    /// The message comes from the validator's `msg` attribute when it has one.
    #[error("Invalid value for field [{field}] ({validator}): {message}")]
    Validation {
        /// Name of the validated field
        field: String,
        /// Name of the failing validator, or `required` for the field attribute
        validator: String,
        /// Message for the user
        message: String,
    },

    /// File I/O error.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// XML decoding error.
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),
}

impl Error {
    /// Build a [`Error::NotFound`] for a lookup of `kind` named `name` in `owner`.
    pub fn not_found(
        kind: impl Into<String>,
        name: impl Into<String>,
        owner: impl fmt::Display,
    ) -> Self {
        Error::NotFound {
            kind: kind.into(),
            name: name.into(),
            owner: owner.to_string(),
        }
    }

    /// Build a [`Error::Loading`] for `resource`.
    pub fn loading(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Loading {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Build a [`Error::Validation`] for `field`.
    pub fn validation(
        field: impl Into<String>,
        validator: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Validation {
            field: field.into(),
            validator: validator.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this is a [`Error::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns `true` if this is a [`Error::InvalidMetadata`].
    #[must_use]
    pub fn is_invalid_metadata(&self) -> bool {
        matches!(self, Error::InvalidMetadata { .. })
    }

    /// Returns `true` if this is a [`Error::Validation`].
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}
