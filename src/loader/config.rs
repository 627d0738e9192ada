//! Loader configuration.
//!
//! A [`LoaderConfig`] names the metadata sources a loader reads and carries free-form
//! arguments, of which `register`, `verbose` and `strict` are understood by the loader itself
//! (see [`LoaderOptions`]). Configurations are plain serde types and can be read from JSON.
//!
//! ```json
//! {
//!   "source_dir": "metadata",
//!   "sources": ["fruit.json", "apple.xml"],
//!   "args": { "verbose": "true" }
//! }
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{registry::TypeRegistry, Error, Result};

/// Argument enabling registration with the loader registry after init.
pub const ARG_REGISTER: &str = "register";
/// Argument enabling per-file load summaries.
pub const ARG_VERBOSE: &str = "verbose";
/// Argument turning unknown types and child rule violations into errors.
pub const ARG_STRICT: &str = "strict";

/// Sources and settings of a loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Type registry to use instead of the one the loader was created with
    #[serde(skip)]
    pub type_registry: Option<Arc<TypeRegistry>>,
    /// Directory relative sources are resolved against; must exist
    pub source_dir: Option<PathBuf>,
    /// Metadata files, loaded in order
    pub sources: Vec<String>,
    /// Free-form arguments
    pub args: BTreeMap<String, String>,
}

impl LoaderConfig {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a configuration from a JSON document.
    ///
    /// # Errors
    /// Returns [`Error::Json`] for malformed documents.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a configuration from a JSON file. A relative `source_dir` is resolved against the
    /// file's directory.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Json`] if it is malformed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::from_json(&fs::read_to_string(path)?)?;
        if let (Some(dir), Some(base)) = (config.source_dir.as_mut(), path.parent()) {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        Ok(config)
    }

    /// Set the source directory.
    #[must_use]
    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    /// Append a source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// Set an argument.
    #[must_use]
    pub fn with_arg(mut self, name: &str, value: &str) -> Self {
        self.args.insert(name.to_string(), value.to_string());
        self
    }

    /// Use `registry` instead of the loader's own type registry.
    #[must_use]
    pub fn with_type_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.type_registry = Some(registry);
        self
    }

    /// Check the configuration against the file system.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if `source_dir` is not an existing directory or an
    /// argument understood by the loader is not a boolean.
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.source_dir {
            if !dir.is_dir() {
                return Err(Error::Configuration(format!(
                    "Source directory [{}] does not exist",
                    dir.display()
                )));
            }
        }
        LoaderOptions::from_args(&self.args).map(|_| ())
    }

    /// Path of `source`, resolved against `source_dir`.
    #[must_use]
    pub fn resolve(&self, source: &str) -> PathBuf {
        match &self.source_dir {
            Some(dir) => dir.join(source),
            None => PathBuf::from(source),
        }
    }

    /// Typed view of the arguments.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for non-boolean values of known arguments.
    pub fn options(&self) -> Result<LoaderOptions> {
        LoaderOptions::from_args(&self.args)
    }
}

/// Arguments the loader understands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Register with the loader registry after init
    pub register: bool,
    /// Log a summary for every loaded file
    pub verbose: bool,
    /// Fail on unknown types and child rule violations
    pub strict: bool,
}

impl LoaderOptions {
    /// Parse the known arguments; unknown ones are ignored.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for values other than `true`/`false`.
    pub fn from_args(args: &BTreeMap<String, String>) -> Result<Self> {
        let flag = |name: &str| -> Result<bool> {
            match args.get(name).map(|v| v.trim().to_ascii_lowercase()) {
                None => Ok(false),
                Some(value) if value == "true" => Ok(true),
                Some(value) if value == "false" => Ok(false),
                Some(value) => Err(Error::Configuration(format!(
                    "Argument [{name}] must be true or false, got [{value}]"
                ))),
            }
        };

        Ok(LoaderOptions {
            register: flag(ARG_REGISTER)?,
            verbose: flag(ARG_VERBOSE)?,
            strict: flag(ARG_STRICT)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_resolves_relative_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("meta")).unwrap();
        let path = dir.path().join("loader.json");
        fs::write(
            &path,
            r#"{ "source_dir": "meta", "sources": ["a.json", "b.xml"],
                 "args": { "strict": "TRUE" } }"#,
        )
        .unwrap();

        let config = LoaderConfig::from_file(&path).unwrap();
        assert_eq!(config.source_dir.as_deref(), Some(dir.path().join("meta").as_path()));
        assert_eq!(config.sources, ["a.json", "b.xml"]);
        assert!(config.options().unwrap().strict);
        assert!(config.validate().is_ok());
        assert_eq!(config.resolve("a.json"), dir.path().join("meta").join("a.json"));
    }

    #[test]
    fn test_validate_rejects_missing_dir_and_bad_flags() {
        let missing = LoaderConfig::new().with_source_dir("/definitely/not/here");
        assert!(matches!(missing.validate(), Err(Error::Configuration(_))));

        let bad = LoaderConfig::new().with_arg(ARG_VERBOSE, "yes");
        assert!(matches!(bad.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_type_registry_not_serialized() {
        let config = LoaderConfig::new()
            .with_source("a.json")
            .with_type_registry(Arc::new(TypeRegistry::new()));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("type_registry"));
        assert!(LoaderConfig::from_json(&json).unwrap().type_registry.is_none());
    }
}
