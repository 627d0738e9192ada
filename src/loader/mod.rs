//! Metadata loaders.
//!
//! A [`MetaDataLoader`] is the root of a metadata graph. It owns a `loader` node whose
//! children are the top-level declarations of every file it has read, the [`TypeRegistry`] used
//! to build nodes, and its lifecycle [`LoaderPhase`].
//!
//! # Lifecycle
//!
//! 1. Create with [`MetaDataLoader::new`] or [`MetaDataLoader::manual`] (`UNINITIALIZED`)
//! 2. Call [`MetaDataLoader::configure`] with sources, or [`MetaDataLoader::init`] directly
//!    (`INITIALIZING`, then `INITIALIZED`)
//! 3. Optionally [`MetaDataLoader::register`] with a [`LoaderRegistry`] (`REGISTERED`)
//! 4. [`MetaDataLoader::destroy`] to release the graph (`DESTROYED`)
//!
//! Queries are answered in `INITIALIZED` and `REGISTERED`. Metadata may additionally be added
//! while `INITIALIZING`, which is when configured sources are parsed.
//!
//! # Loading Sources
//!
//! Configured sources are read from disk in parallel and applied in their configured order, so
//! a file may refer to supers declared by any earlier file. The format is chosen by extension:
//! `.json` or `.xml`.
//!
//! # Examples
//!
//! ```rust
//! use metaobjects::loader::MetaDataLoader;
//!
//! let loader = MetaDataLoader::manual("inventory")?;
//! loader.init()?;
//! loader.parse_json("fruit.json", r#"{ "metadata": { "package": "acme", "children": [
//!     { "object": { "name": "Fruit", "children": [ { "field": { "name": "name" } } ] } }
//! ] } }"#)?;
//!
//! let fruit = loader.meta_object_by_name("acme::Fruit")?;
//! assert_eq!(fruit.meta_field("name")?.sub_type(), "string");
//! # Ok::<(), metaobjects::Error>(())
//! ```

use std::{fmt, fs, ops::Deref, path::Path, sync::Arc};

use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    metadata::{
        cache::{CacheValue, HybridCache},
        kind::{TYPE_LOADER, TYPE_OBJECT},
        MetaData, MetaDataList, MetaDataRc, ObjectInstance,
    },
    parser::{self, ParseSummary},
    registry::{LoaderRegistry, TypeRegistry},
    Error, Result,
};

/// Loader configuration
pub mod config;
/// Lifecycle phases
pub mod phase;

pub use config::{LoaderConfig, LoaderOptions};
pub use phase::LoaderPhase;

/// Reference-counted loader
pub type MetaDataLoaderRc = Arc<MetaDataLoader>;

/// Subtype of loaders filled programmatically.
pub const SUBTYPE_MANUAL: &str = "manual";
/// Subtype of loaders reading files.
pub const SUBTYPE_FILE: &str = "file";

/// Root of a metadata graph with a lifecycle.
pub struct MetaDataLoader {
    node: MetaDataRc,
    phase: RwLock<LoaderPhase>,
    types: RwLock<Arc<TypeRegistry>>,
    config: RwLock<LoaderConfig>,
    options: RwLock<LoaderOptions>,
    registry: RwLock<Option<Arc<LoaderRegistry>>>,
    /// Resources parsed so far, in order
    sources: boxcar::Vec<String>,
}

impl MetaDataLoader {
    /// Create an uninitialized loader.
    ///
    /// The root node is built through `types` when it knows the `loader` subtype.
    ///
    /// # Arguments
    /// * `name` - Name of the loader and of its root node
    /// * `sub_type` - Loader subtype, e.g. [`SUBTYPE_MANUAL`]
    /// * `types` - Registry used to build every node of this loader
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] for empty names or failing loader factories.
    pub fn new(name: &str, sub_type: &str, types: Arc<TypeRegistry>) -> Result<Arc<Self>> {
        let node = if types.has_sub_type(TYPE_LOADER, sub_type) {
            types.create_instance(TYPE_LOADER, sub_type, name)?
        } else {
            Arc::new(MetaData::loader(sub_type, name)?)
        };

        Ok(Arc::new(MetaDataLoader {
            node,
            phase: RwLock::new(LoaderPhase::Uninitialized),
            types: RwLock::new(types),
            config: RwLock::new(LoaderConfig::default()),
            options: RwLock::new(LoaderOptions::default()),
            registry: RwLock::new(None),
            sources: boxcar::Vec::new(),
        }))
    }

    /// Create an uninitialized manual loader backed by [`TypeRegistry::global`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] for empty names.
    pub fn manual(name: &str) -> Result<Arc<Self>> {
        Self::new(name, SUBTYPE_MANUAL, TypeRegistry::global())
    }

    /// The root node.
    #[must_use]
    pub fn node(&self) -> &MetaDataRc {
        &self.node
    }

    /// Name of the loader.
    #[must_use]
    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> LoaderPhase {
        *self.phase.read()
    }

    /// The type registry nodes are built with.
    #[must_use]
    pub fn types(&self) -> Arc<TypeRegistry> {
        self.types.read().clone()
    }

    /// The options parsed from the configuration.
    #[must_use]
    pub fn options(&self) -> LoaderOptions {
        *self.options.read()
    }

    /// The configuration given to [`MetaDataLoader::configure`].
    #[must_use]
    pub fn config(&self) -> LoaderConfig {
        self.config.read().clone()
    }

    /// Resources parsed so far, in order.
    #[must_use]
    pub fn sources(&self) -> Vec<String> {
        self.sources.iter().map(|(_, source)| source.clone()).collect()
    }

    /// The loader registry this loader registers with.
    #[must_use]
    pub fn loader_registry(&self) -> Option<Arc<LoaderRegistry>> {
        self.registry.read().clone()
    }

    /// Set the loader registry used by [`MetaDataLoader::register`] and by reverse lookups
    /// that this loader cannot answer itself.
    pub fn set_loader_registry(&self, registry: Arc<LoaderRegistry>) {
        *self.registry.write() = Some(registry);
    }

    // ============================================================================================
    // Lifecycle
    // ============================================================================================

    /// Apply `config` and initialize.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] unless uninitialized, [`Error::Configuration`] for invalid
    /// configurations, and any error of [`MetaDataLoader::init`].
    pub fn configure(self: &Arc<Self>, mut config: LoaderConfig) -> Result<()> {
        self.expect_phase(LoaderPhase::Uninitialized, "configure")?;
        config.validate()?;

        *self.options.write() = config.options()?;
        if let Some(types) = config.type_registry.take() {
            *self.types.write() = types;
        }
        *self.config.write() = config;
        self.init()
    }

    /// Load the configured sources and become queryable.
    ///
    /// On failure the graph is cleared and the loader returns to `UNINITIALIZED`.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] unless uninitialized, [`Error::Loading`] for unreadable
    /// or invalid sources, and errors of [`MetaDataLoader::register`] when `register` is set.
    pub fn init(self: &Arc<Self>) -> Result<()> {
        self.expect_phase(LoaderPhase::Uninitialized, "init")?;
        self.set_phase(LoaderPhase::Initializing);

        if let Err(err) = self.load_sources() {
            self.node.clear_children();
            self.set_phase(LoaderPhase::Uninitialized);
            return Err(err);
        }

        self.set_phase(LoaderPhase::Initialized);
        debug!("Initialized loader [{}] with {} sources", self.name(), self.sources.count());

        if self.options().register {
            self.register()?;
        }
        Ok(())
    }

    fn load_sources(&self) -> Result<()> {
        let config = self.config.read().clone();
        let contents: Vec<(String, std::io::Result<Vec<u8>>)> = config
            .sources
            .par_iter()
            .map(|source| (source.clone(), fs::read(config.resolve(source))))
            .collect();

        for (source, bytes) in contents {
            let bytes = bytes
                .map_err(|err| Error::loading(&source, format!("Cannot read source: {err}")))?;
            self.parse_source(&source, &bytes)?;
        }
        Ok(())
    }

    /// Parse `bytes` according to the extension of `resource`.
    ///
    /// # Errors
    /// Returns [`Error::Loading`] for unsupported extensions or non UTF-8 JSON, and any parse
    /// error.
    pub fn parse_source(&self, resource: &str, bytes: &[u8]) -> Result<ParseSummary> {
        let extension = Path::new(resource)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => {
                let json = std::str::from_utf8(bytes)
                    .map_err(|err| Error::loading(resource, format!("Invalid UTF-8: {err}")))?;
                self.parse_json(resource, json)
            }
            Some("xml") => self.parse_xml(resource, bytes),
            _ => Err(Error::loading(
                resource,
                "Unsupported metadata format, expected .json or .xml",
            )),
        }
    }

    /// Make this loader visible through its loader registry. Registering twice is a no-op.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] unless initialized and [`Error::Configuration`] without a
    /// loader registry or when another loader holds the name.
    pub fn register(self: &Arc<Self>) -> Result<()> {
        match self.phase() {
            LoaderPhase::Registered => return Ok(()),
            LoaderPhase::Initialized => {}
            phase => return Err(self.state_error(phase, "register")),
        }
        let registry = self.loader_registry().ok_or_else(|| {
            Error::Configuration(format!("Loader [{}] has no loader registry", self.name()))
        })?;

        self.set_phase(LoaderPhase::Registering);
        if let Err(err) = registry.register(self) {
            self.set_phase(LoaderPhase::Initialized);
            return Err(err);
        }
        self.set_phase(LoaderPhase::Registered);
        Ok(())
    }

    /// Leave the loader registry. Does nothing unless registered.
    pub fn unregister(&self) {
        if self.phase() != LoaderPhase::Registered {
            return;
        }
        if let Some(registry) = self.loader_registry() {
            registry.unregister(self.name());
        }
        self.set_phase(LoaderPhase::Initialized);
    }

    /// Release the graph and leave the loader registry.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] if the loader is already destroyed.
    pub fn destroy(&self) -> Result<()> {
        let phase = self.phase();
        if phase == LoaderPhase::Destroyed {
            return Err(self.state_error(phase, "destroy"));
        }
        self.unregister();
        self.node.clear_children();
        self.set_phase(LoaderPhase::Destroyed);
        debug!("Destroyed loader [{}]", self.name());
        Ok(())
    }

    /// Fail unless the loader answers queries.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] outside `INITIALIZED` and `REGISTERED`.
    pub fn check_state(&self, operation: &'static str) -> Result<()> {
        let phase = self.phase();
        if phase.is_queryable() {
            Ok(())
        } else {
            Err(self.state_error(phase, operation))
        }
    }

    fn check_accepts_metadata(&self, operation: &'static str) -> Result<()> {
        let phase = self.phase();
        if phase.accepts_metadata() {
            Ok(())
        } else {
            Err(self.state_error(phase, operation))
        }
    }

    fn expect_phase(&self, expected: LoaderPhase, operation: &'static str) -> Result<()> {
        let phase = self.phase();
        if phase == expected {
            Ok(())
        } else {
            Err(self.state_error(phase, operation))
        }
    }

    fn state_error(&self, phase: LoaderPhase, operation: &'static str) -> Error {
        Error::LoaderState {
            loader: self.name().to_string(),
            phase,
            operation,
        }
    }

    fn set_phase(&self, phase: LoaderPhase) {
        *self.phase.write() = phase;
    }

    // ============================================================================================
    // Building
    // ============================================================================================

    /// Add a top-level node.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] when metadata cannot be added, and the errors of
    /// [`MetaData::add_child`].
    pub fn add_child(&self, child: MetaDataRc) -> Result<()> {
        self.check_accepts_metadata("add metadata")?;
        self.node.add_child(child)
    }

    /// Apply a JSON metadata document.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] when metadata cannot be added, and parse errors.
    pub fn parse_json(&self, resource: &str, json: &str) -> Result<ParseSummary> {
        self.check_accepts_metadata("parse")?;
        let summary = parser::json::parse(self, resource, json)?;
        self.finish_parse(summary)
    }

    /// Apply an XML metadata document.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] when metadata cannot be added, and parse errors.
    pub fn parse_xml(&self, resource: &str, xml: &[u8]) -> Result<ParseSummary> {
        self.check_accepts_metadata("parse")?;
        let summary = parser::xml::parse(self, resource, xml)?;
        self.finish_parse(summary)
    }

    fn finish_parse(&self, summary: ParseSummary) -> Result<ParseSummary> {
        // Declarations may have changed nodes anywhere below the root
        self.node.flush_caches();
        self.sources.push(summary.resource.clone());
        if self.options().verbose {
            info!("Loaded {}", summary);
        } else {
            debug!("Loaded {}", summary);
        }
        Ok(summary)
    }

    // ============================================================================================
    // Queries
    // ============================================================================================

    /// All top-level objects.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] when not queryable.
    pub fn meta_objects(&self) -> Result<MetaDataList> {
        self.check_state("list objects")?;
        Ok(self.node.children_of_type(TYPE_OBJECT))
    }

    /// The top-level object called `name`.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] when not queryable and [`Error::NotFound`] if missing.
    pub fn meta_object_by_name(&self, name: &str) -> Result<MetaDataRc> {
        self.meta_data_by_name(TYPE_OBJECT, name)
    }

    /// The top-level object called `name`, or `None` if missing or not queryable.
    #[must_use]
    pub fn find_meta_object(&self, name: &str) -> Option<MetaDataRc> {
        self.meta_object_by_name(name).ok()
    }

    /// The top-level node of `type_name` called `name`. Results are cached on the root.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] when not queryable and [`Error::NotFound`] if missing.
    pub fn meta_data_by_name(&self, type_name: &str, name: &str) -> Result<MetaDataRc> {
        self.check_state("look up metadata")?;
        let key = HybridCache::key("QuickCache", &format!("{type_name}-{name}"));
        self.node
            .use_cache(&key, || {
                CacheValue::from(self.node.find_child_of_type(type_name, name))
            })
            .into_node()
            .ok_or_else(|| Error::not_found(type_name, name, &*self.node))
    }

    /// All top-level nodes of `type_name`.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] when not queryable.
    pub fn meta_data_of_type(&self, type_name: &str) -> Result<MetaDataList> {
        self.check_state("list metadata")?;
        Ok(self.node.children_of_type(type_name))
    }

    /// All top-level nodes inheriting, directly or transitively, from the node called `name`.
    /// Results are cached on the root.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] when not queryable.
    pub fn meta_data_by_super(&self, name: &str) -> Result<MetaDataList> {
        self.check_state("look up metadata")?;
        let key = HybridCache::key("metaDataBySuper", name);
        let nodes = self
            .node
            .use_cache(&key, || {
                CacheValue::Nodes(
                    self.node
                        .iter_children()
                        .filter(|child| child.ancestors().iter().any(|a| a.name() == name))
                        .collect(),
                )
            })
            .into_nodes()
            .unwrap_or_default();
        Ok(nodes)
    }

    /// The object node describing `instance`.
    ///
    /// The instance's back-reference is used first, then the objects of this loader are
    /// asked whether they produce the instance, then those of every loader in the loader
    /// registry.
    ///
    /// # Errors
    /// Returns [`Error::LoaderState`] when not queryable and [`Error::NotFound`] if no object
    /// describes the instance.
    pub fn meta_object_for(&self, instance: &dyn ObjectInstance) -> Result<MetaDataRc> {
        self.check_state("look up object")?;
        if let Some(object) = instance.meta_aware().and_then(|aware| aware.meta_object()) {
            return Ok(object);
        }
        if let Some(object) = self.produced_by(instance) {
            return Ok(object);
        }
        if let Some(registry) = self.loader_registry() {
            return registry.meta_object_for(instance);
        }
        Err(Error::not_found(TYPE_OBJECT, "<instance>", &*self.node))
    }

    /// The first top-level object of this loader that produces `instance`.
    #[must_use]
    pub fn produced_by(&self, instance: &dyn ObjectInstance) -> Option<MetaDataRc> {
        if !self.phase().is_queryable() {
            return None;
        }
        self.node
            .iter_children()
            .filter(|child| child.is_type(TYPE_OBJECT))
            .find(|object| object.produces(instance))
    }
}

impl Deref for MetaDataLoader {
    type Target = MetaData;

    fn deref(&self) -> &Self::Target {
        &self.node
    }
}

impl fmt::Display for MetaDataLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.node, self.phase())
    }
}

impl fmt::Debug for MetaDataLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaDataLoader")
            .field("name", &self.name())
            .field("phase", &self.phase())
            .field("children", &self.node.child_stats().total_children)
            .field("sources", &self.sources())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        metadata::ValueObject,
        test::{create_loader, create_object, APPLE_XML, FRUIT_JSON},
    };

    #[test]
    fn test_lifecycle_transitions() {
        let types = Arc::new(TypeRegistry::with_core_types());
        let loader = MetaDataLoader::new("life", SUBTYPE_MANUAL, types).unwrap();
        assert_eq!(loader.phase(), LoaderPhase::Uninitialized);
        assert!(matches!(
            loader.meta_objects(),
            Err(Error::LoaderState { phase: LoaderPhase::Uninitialized, .. })
        ));

        loader.init().unwrap();
        assert_eq!(loader.phase(), LoaderPhase::Initialized);
        assert!(loader.init().is_err());

        loader.destroy().unwrap();
        assert_eq!(loader.phase(), LoaderPhase::Destroyed);
        assert!(loader.destroy().is_err());
        assert!(loader.parse_json("x.json", FRUIT_JSON).is_err());
    }

    #[test]
    fn test_register_requires_registry() {
        let loader = create_loader("lonely");
        assert!(matches!(loader.register(), Err(Error::Configuration(_))));
        assert_eq!(loader.phase(), LoaderPhase::Initialized);

        let registry = Arc::new(LoaderRegistry::new());
        loader.set_loader_registry(registry.clone());
        loader.register().unwrap();
        loader.register().unwrap();
        assert_eq!(loader.phase(), LoaderPhase::Registered);
        assert!(registry.get("lonely").is_some());

        loader.unregister();
        assert!(registry.get("lonely").is_none());
        assert_eq!(loader.phase(), LoaderPhase::Initialized);
    }

    #[test]
    fn test_queries() {
        let loader = create_loader("queries");
        loader.parse_json("fruit.json", FRUIT_JSON).unwrap();
        loader.parse_xml("apple.xml", APPLE_XML.as_bytes()).unwrap();

        assert_eq!(loader.meta_objects().unwrap().len(), 2);
        assert_eq!(loader.meta_data_of_type("object").unwrap().len(), 2);
        assert!(loader.find_meta_object("acme::produce::Pear").is_none());
        assert!(loader
            .meta_object_by_name("acme::produce::Pear")
            .unwrap_err()
            .is_not_found());

        let by_super = loader.meta_data_by_super("acme::produce::Fruit").unwrap();
        assert_eq!(by_super.len(), 1);
        assert_eq!(by_super[0].name(), "acme::produce::Apple");
        assert!(loader.cache().contains_key("metaDataBySuper{acme::produce::Fruit}"));
        assert!(loader
            .cache()
            .contains_key("QuickCache{object-acme::produce::Fruit}"));

        assert_eq!(loader.sources(), ["fruit.json", "apple.xml"]);
    }

    #[test]
    fn test_meta_object_for() {
        let loader = create_loader("reverse");
        loader.parse_json("fruit.json", FRUIT_JSON).unwrap();
        loader.parse_xml("apple.xml", APPLE_XML.as_bytes()).unwrap();

        let apple = loader.meta_object_by_name("acme::produce::Apple").unwrap();
        let attached = apple.new_instance().unwrap();
        assert!(Arc::ptr_eq(&loader.meta_object_for(&attached).unwrap(), &apple));

        let detached = ValueObject::new("acme::produce::Apple");
        assert!(Arc::ptr_eq(&loader.meta_object_for(&detached).unwrap(), &apple));

        let unknown = ValueObject::new("acme::produce::Pear");
        assert!(loader.meta_object_for(&unknown).unwrap_err().is_not_found());
    }

    #[test]
    fn test_add_child_checks_phase() {
        let loader = MetaDataLoader::manual("phase-check").unwrap();
        assert!(loader.add_child(create_object("Early")).is_err());
        loader.init().unwrap();
        loader.add_child(create_object("Late")).unwrap();
        assert!(loader.find_meta_object("Late").is_some());
    }

    #[test]
    fn test_unsupported_extension() {
        let loader = create_loader("ext");
        assert!(matches!(
            loader.parse_source("fruit.yaml", b"metadata: {}"),
            Err(Error::Loading { .. })
        ));
    }
}
