//! Metadata file parsers.
//!
//! Both supported formats decode into the same element tree ([`Element`]), which a shared
//! [`Builder`] then applies to a loader. The builder owns every rule that is not about syntax:
//! naming, package resolution, super resolution, create-versus-overlay, inline attributes, and
//! child validation.
//!
//! # Formats
//!
//! - [`json`] - `{"metadata": {"package": .., "children": [{"object": {..}}]}}`
//! - [`xml`] - `<metadata package=".."><object name=".."/></metadata>`
//!
//! # Re-parsing
//!
//! Applying the same file twice yields the same graph: existing nodes are found again by
//! (type, name) and reused, auto-generated names restart for every parse, and attribute
//! values are last-write-wins.

use std::{collections::BTreeMap, collections::HashMap, fmt, str::FromStr, sync::Arc};

use tracing::{debug, warn};

use crate::{
    loader::MetaDataLoader,
    metadata::{
        kind::{TYPE_ATTR, TYPE_FIELD, TYPE_OBJECT},
        names::{expand_package, qualify},
        object::{ATTR_IS_ABSTRACT, ATTR_IS_ABSTRACT_PRIVATE},
        DataType, MetaDataRc, MetaValue,
    },
    registry::TypeRegistry,
    Error, Result,
};

/// JSON metadata files
pub mod json;
/// XML metadata files
pub mod xml;

/// Subtype placeholder meaning "not specified".
const ANY_SUB_TYPE: &str = "*";
/// Attribute that always holds a string array.
const ATTR_KEYS: &str = "keys";

/// Properties that configure the element itself instead of becoming attributes.
const RESERVED: &[&str] = &[
    "package",
    "defPackage",
    "name",
    "class",
    "children",
    "subType",
    "subTypes",
    "super",
    "value",
    "type",
    "overlay",
    "override",
    "implements",
];

/// Returns `true` if `key` configures the element rather than naming an attribute.
pub(crate) fn is_reserved(key: &str) -> bool {
    RESERVED.contains(&key)
}

/// A property value as written in the file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawValue {
    /// Text to be parsed according to the target data type
    Text(String),
    /// A value the format already typed (JSON scalars and arrays)
    Typed(MetaValue),
}

impl RawValue {
    fn as_text(&self) -> String {
        match self {
            RawValue::Text(text) => text.clone(),
            RawValue::Typed(value) => value.to_string(),
        }
    }

    fn is_true(&self) -> bool {
        match self {
            RawValue::Text(text) => text.trim().eq_ignore_ascii_case("true"),
            RawValue::Typed(value) => value.as_bool().unwrap_or(false),
        }
    }

    /// The data type a value would get without context.
    fn inferred_type(&self) -> DataType {
        match self {
            RawValue::Text(text) => MetaValue::infer(text).data_type(),
            RawValue::Typed(value) => value.data_type(),
        }
    }

    fn into_value(self, data_type: DataType) -> Result<MetaValue> {
        match self {
            RawValue::Text(text) => MetaValue::parse(data_type, &text),
            RawValue::Typed(value) => value.coerce(data_type),
        }
    }
}

/// One declaration of a metadata file, independent of its syntax.
#[derive(Debug, Clone, Default)]
pub(crate) struct Element {
    pub type_name: String,
    pub name: Option<String>,
    pub sub_type: Option<String>,
    pub package: Option<String>,
    pub super_name: Option<String>,
    pub overlay: bool,
    pub overrides: bool,
    pub value: Option<RawValue>,
    pub attrs: Vec<(String, RawValue)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(type_name: &str) -> Self {
        Element {
            type_name: type_name.to_string(),
            ..Element::default()
        }
    }

    /// Route a property to the element field it configures, or to the inline attributes.
    pub fn set_property(&mut self, key: &str, value: RawValue) {
        match key {
            "name" => self.name = Some(value.as_text()),
            "subType" | "type" => self.sub_type = Some(value.as_text()),
            "package" => self.package = Some(value.as_text()),
            "super" => self.super_name = Some(value.as_text()),
            "overlay" => self.overlay = value.is_true(),
            "override" => self.overrides = value.is_true(),
            "value" => self.value = Some(value),
            "children" => {}
            _ if is_reserved(key) => debug!("Ignoring property [{}] on {}", key, self.type_name),
            _ => {
                let name = key.strip_prefix('@').unwrap_or(key);
                self.attrs.push((name.to_string(), value));
            }
        }
    }

    /// Returns `true` if the element marks itself abstract.
    fn declares_abstract(&self) -> bool {
        self.attrs.iter().any(|(name, value)| {
            (name == ATTR_IS_ABSTRACT_PRIVATE || name == ATTR_IS_ABSTRACT) && value.is_true()
        })
    }

    fn declared_sub_type(&self) -> Option<&str> {
        self.sub_type
            .as_deref()
            .filter(|sub| !sub.is_empty() && *sub != ANY_SUB_TYPE)
    }
}

/// What a single parse applied, per type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseSummary {
    /// The parsed resource
    pub resource: String,
    /// Declarations applied, by type
    pub counts: BTreeMap<String, usize>,
    /// Declarations skipped because their type is unknown
    pub skipped: usize,
}

impl ParseSummary {
    fn new(resource: &str) -> Self {
        ParseSummary {
            resource: resource.to_string(),
            ..ParseSummary::default()
        }
    }

    fn record(&mut self, type_name: &str) {
        *self.counts.entry(type_name.to_string()).or_default() += 1;
    }

    /// Declarations of `type_name` applied.
    #[must_use]
    pub fn count(&self, type_name: &str) -> usize {
        self.counts.get(type_name).copied().unwrap_or(0)
    }

    /// All declarations applied.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl fmt::Display for ParseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.resource)?;
        for (index, (type_name, count)) in self.counts.iter().enumerate() {
            let sep = if index == 0 { ": " } else { ", " };
            write!(f, "{sep}{type_name}={count}")?;
        }
        if self.skipped > 0 {
            write!(f, " ({} skipped)", self.skipped)?;
        }
        Ok(())
    }
}

/// Applies parsed elements to a loader.
pub(crate) struct Builder<'a> {
    loader: &'a MetaDataLoader,
    types: Arc<TypeRegistry>,
    resource: &'a str,
    default_package: String,
    strict: bool,
    counters: HashMap<String, usize>,
    summary: ParseSummary,
}

impl<'a> Builder<'a> {
    pub fn new(loader: &'a MetaDataLoader, resource: &'a str, default_package: String) -> Self {
        Builder {
            loader,
            types: loader.types(),
            resource,
            default_package,
            strict: loader.options().strict,
            counters: HashMap::new(),
            summary: ParseSummary::new(resource),
        }
    }

    /// Apply top-level elements in order.
    ///
    /// # Errors
    /// Fails on the first structural error; nodes applied before it stay in the graph.
    pub fn build(mut self, elements: Vec<Element>) -> Result<ParseSummary> {
        let root = self.loader.node().clone();
        for element in elements {
            self.apply(&root, element, true)?;
        }
        Ok(self.summary)
    }

    fn apply(&mut self, parent: &MetaDataRc, element: Element, is_root: bool) -> Result<()> {
        if element.type_name == TYPE_ATTR {
            return self.apply_attr_element(parent, element);
        }
        if !self.types.has_type(&element.type_name) {
            return self.skip_unknown(parent, &element.type_name, None);
        }

        let Some(node) = self.create_or_overlay(parent, &element, is_root)? else {
            return Ok(());
        };
        self.summary.record(&element.type_name);

        if element.value.is_some() {
            debug!("Ignoring value of non-attribute {}", node);
        }
        for (name, value) in element.attrs {
            self.apply_attribute(&node, &name, None, Some(value))?;
        }
        for child in element.children {
            self.apply(&node, child, false)?;
        }
        Ok(())
    }

    fn apply_attr_element(&mut self, parent: &MetaDataRc, element: Element) -> Result<()> {
        let Some(name) = element.name else {
            return Err(Error::loading(
                self.resource,
                format!("Attribute under {parent} has no name"),
            ));
        };
        for (ignored, _) in &element.attrs {
            debug!("Ignoring property [{}] on attribute [{}]", ignored, name);
        }
        let sub_type = element
            .sub_type
            .filter(|sub| !sub.is_empty() && sub != ANY_SUB_TYPE);
        self.apply_attribute(parent, &name, sub_type, element.value)?;
        self.summary.record(TYPE_ATTR);
        Ok(())
    }

    /// Create or update the direct attribute `name` of `parent`.
    ///
    /// The subtype is the declared one, else the context provider's, else the value's
    /// inferred type, else the registry default. `keys` is always a string array.
    fn apply_attribute(
        &mut self,
        parent: &MetaDataRc,
        name: &str,
        sub_type: Option<String>,
        value: Option<RawValue>,
    ) -> Result<()> {
        let sub_type = if name == ATTR_KEYS {
            DataType::StringArray.to_string()
        } else {
            sub_type
                .or_else(|| self.types.resolve_attribute_sub_type(parent, name))
                .or_else(|| value.as_ref().map(|v| v.inferred_type().to_string()))
                .or_else(|| self.types.default_sub_type(TYPE_ATTR))
                .ok_or_else(|| {
                    Error::loading(self.resource, format!("No subType for attribute [{name}]"))
                })?
        };

        if !self.types.has_sub_type(TYPE_ATTR, &sub_type) {
            return self.skip_unknown(parent, TYPE_ATTR, Some(&sub_type));
        }
        self.check_child(parent, TYPE_ATTR, &sub_type, name)?;

        let data_type = DataType::from_str(&sub_type).map_err(|_| {
            Error::loading(
                self.resource,
                format!("Attribute subType [{sub_type}] has no data type"),
            )
        })?;
        let value = value.map(|v| v.into_value(data_type)).transpose()?;

        if let Some(existing) = parent.find_direct_child_of_type(TYPE_ATTR, name) {
            if existing.sub_type() == sub_type {
                if let Some(value) = value {
                    existing.set_value(value)?;
                    parent.flush_caches();
                }
                return Ok(());
            }
        }

        let attr = self.types.create_instance(TYPE_ATTR, &sub_type, name)?;
        if let Some(value) = value {
            attr.set_value(value)?;
        }
        // Attributes are delete-on-add, so this replaces a same-named one of another subtype
        parent.add_child(attr)
    }

    fn create_or_overlay(
        &mut self,
        parent: &MetaDataRc,
        element: &Element,
        is_root: bool,
    ) -> Result<Option<MetaDataRc>> {
        let type_name = element.type_name.as_str();
        let package = self.resolve_package(parent, element, is_root)?;
        let name = match &element.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => {
                if element.declares_abstract() {
                    return Err(Error::loading(
                        self.resource,
                        format!("Abstract [{type_name}] declarations under {parent} must be named"),
                    ));
                }
                self.auto_name(parent, type_name, element.declared_sub_type())
            }
        };
        let full_name = qualify(&package, &name);

        if let Some(found) = parent.find_child_of_type(type_name, &full_name) {
            if found.parent().is_some_and(|p| Arc::ptr_eq(&p, parent)) {
                return Ok(Some(found));
            }
            debug!("Overlaying inherited {} on {}", found, parent);
            let overlay = found.overload()?;
            parent.add_child(overlay.clone())?;
            return Ok(Some(overlay));
        }

        if element.overlay {
            return Err(Error::loading(
                self.resource,
                format!("Cannot overlay [{type_name}] [{full_name}], no such node under {parent}"),
            ));
        }
        if element.overrides {
            warn!(
                "Cannot override [{}] [{}], no such node under {} in [{}]",
                type_name, full_name, parent, self.resource
            );
            self.summary.skipped += 1;
            return Ok(None);
        }

        let super_data = element
            .super_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| self.resolve_super(parent, type_name, &package, s))
            .transpose()?;

        let sub_type = match element.declared_sub_type() {
            Some(sub) => sub.to_string(),
            None => match &super_data {
                Some(super_data) => super_data.sub_type().to_string(),
                None => self
                    .types
                    .resolve_child_sub_type(parent, type_name, &name)
                    .ok_or_else(|| {
                        Error::loading(
                            self.resource,
                            format!("No subType for [{type_name}] [{full_name}]"),
                        )
                    })?,
            },
        };

        if !self.types.has_sub_type(type_name, &sub_type) {
            self.skip_unknown(parent, type_name, Some(&sub_type))?;
            return Ok(None);
        }
        self.check_child(parent, type_name, &sub_type, &full_name)?;

        let node = self.types.create_instance(type_name, &sub_type, &full_name)?;
        parent.add_child(node.clone())?;
        if let Some(super_data) = super_data {
            node.set_super_data(super_data)?;
        }
        Ok(Some(node))
    }

    /// Package of an element: expanded when declared, otherwise inherited from a packaged
    /// parent or the file default. Fields directly under objects never get a default package.
    fn resolve_package(
        &self,
        parent: &MetaDataRc,
        element: &Element,
        is_root: bool,
    ) -> Result<String> {
        if let Some(package) = element.package.as_deref().filter(|p| !p.is_empty()) {
            return expand_package(&self.default_package, package);
        }
        if element.type_name == TYPE_FIELD && parent.is_type(TYPE_OBJECT) {
            return Ok(String::new());
        }
        if !is_root && !parent.package().is_empty() {
            return Ok(parent.package().to_string());
        }
        Ok(self.default_package.clone())
    }

    /// Find the node named by `super_name` on the loader.
    fn resolve_super(
        &self,
        parent: &MetaDataRc,
        type_name: &str,
        package: &str,
        super_name: &str,
    ) -> Result<MetaDataRc> {
        let root = self.loader.node();

        if !super_name.contains("::") && !package.is_empty() {
            if let Some(found) = root.find_child_of_type(type_name, &qualify(package, super_name)) {
                return Ok(found);
            }
        }

        let mut base = None;
        let mut current = Some(parent.clone());
        while let Some(node) = current {
            if !node.package().is_empty() {
                base = Some(node.package().to_string());
                break;
            }
            current = node.parent();
        }
        let base = base.unwrap_or_else(|| package.to_string());
        let full_name = expand_package(&base, super_name)?;

        debug!("Resolving super [{}] of [{}] as [{}]", super_name, type_name, full_name);
        root.find_child_of_type(type_name, &full_name).ok_or_else(|| {
            Error::loading(
                self.resource,
                format!("SuperClass [{super_name}] of type [{type_name}] does not exist"),
            )
        })
    }

    /// Next generated name for an unnamed declaration under `parent`.
    fn auto_name(
        &mut self,
        parent: &MetaDataRc,
        type_name: &str,
        sub_type: Option<&str>,
    ) -> String {
        let prefix = sub_type
            .map(str::to_lowercase)
            .unwrap_or_else(|| type_name.to_string());
        let counter = self
            .counters
            .entry(format!("{}::{}::{}", parent.name(), type_name, prefix))
            .or_default();
        *counter += 1;
        format!("{prefix}{counter}")
    }

    fn skip_unknown(
        &mut self,
        parent: &MetaDataRc,
        type_name: &str,
        sub_type: Option<&str>,
    ) -> Result<()> {
        let what = match sub_type {
            Some(sub) => format!("{type_name}:{sub}"),
            None => type_name.to_string(),
        };
        if self.strict {
            return Err(Error::loading(
                self.resource,
                format!("Unknown type [{what}] under {parent}"),
            ));
        }
        warn!("Skipping unknown type [{}] under {} in [{}]", what, parent, self.resource);
        self.summary.skipped += 1;
        Ok(())
    }

    fn check_child(
        &self,
        parent: &MetaDataRc,
        type_name: &str,
        sub_type: &str,
        name: &str,
    ) -> Result<()> {
        if self.types.accepts_child(parent, type_name, sub_type, name) {
            return Ok(());
        }
        let supported = self
            .types
            .find_type(parent.type_name(), parent.sub_type())
            .map(|def| def.supported_children_description())
            .unwrap_or_default();
        let message = format!(
            "{parent} does not accept child [{type_name}:{sub_type}]{{{name}}}, \
             supported: {supported}"
        );
        if self.strict {
            return Err(Error::loading(self.resource, message));
        }
        warn!("{} in [{}]", message, self.resource);
        Ok(())
    }
}
