//! Context-aware subtype resolution.
//!
//! Metadata files often leave subtypes out: `"@required": true` on a field does not say that
//! `required` is a boolean attribute. [`ContextProvider`]s answer that question from the
//! surrounding context (parent type and subtype, attribute or child name). Providers are asked
//! in descending priority order and the first answer wins; when nobody answers, the caller falls
//! back to inference or the registry default.

use std::{fmt, sync::Arc};

use parking_lot::RwLock;
use tracing::debug;

use crate::metadata::kind::{TYPE_FIELD, TYPE_KEY, TYPE_OBJECT, TYPE_VALIDATOR};

/// Supplies subtypes for declarations that omit them.
pub trait ContextProvider: Send + Sync {
    /// Unique name of the provider.
    fn name(&self) -> &str;

    /// Higher priorities are asked first.
    fn priority(&self) -> i32 {
        0
    }

    /// Subtype of the attribute `attr_name` declared on a `parent_type:parent_sub_type` node.
    fn attribute_sub_type(
        &self,
        parent_type: &str,
        parent_sub_type: &str,
        attr_name: &str,
    ) -> Option<String>;

    /// Subtype of a `child_type` child named `child_name` declared without one.
    fn child_sub_type(
        &self,
        _parent_type: &str,
        _parent_sub_type: &str,
        _child_type: &str,
        _child_name: &str,
    ) -> Option<String> {
        None
    }
}

/// Ordered set of [`ContextProvider`]s.
#[derive(Default)]
pub struct ContextRegistry {
    providers: RwLock<Vec<Arc<dyn ContextProvider>>>,
}

impl ContextRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider, replacing one with the same name.
    pub fn register(&self, provider: Arc<dyn ContextProvider>) {
        let mut providers = self.providers.write();
        providers.retain(|existing| existing.name() != provider.name());
        debug!(
            "Registered context provider [{}] with priority {}",
            provider.name(),
            provider.priority()
        );
        providers.push(provider);
        providers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Remove the provider called `name`.
    pub fn unregister(&self, name: &str) -> bool {
        let mut providers = self.providers.write();
        let before = providers.len();
        providers.retain(|existing| existing.name() != name);
        providers.len() != before
    }

    /// Provider names in the order they are asked.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Number of providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// Returns `true` without providers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    /// First answer to [`ContextProvider::attribute_sub_type`].
    #[must_use]
    pub fn attribute_sub_type(
        &self,
        parent_type: &str,
        parent_sub_type: &str,
        attr_name: &str,
    ) -> Option<String> {
        self.providers
            .read()
            .iter()
            .find_map(|p| p.attribute_sub_type(parent_type, parent_sub_type, attr_name))
    }

    /// First answer to [`ContextProvider::child_sub_type`].
    #[must_use]
    pub fn child_sub_type(
        &self,
        parent_type: &str,
        parent_sub_type: &str,
        child_type: &str,
        child_name: &str,
    ) -> Option<String> {
        self.providers.read().iter().find_map(|p| {
            p.child_sub_type(parent_type, parent_sub_type, child_type, child_name)
        })
    }
}

impl fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.provider_names()).finish()
    }
}

/// Subtype rules of the core types.
#[derive(Debug, Default)]
pub struct CoreContextProvider;

impl CoreContextProvider {
    /// Name the provider registers under.
    pub const NAME: &'static str = "core";
}

impl ContextProvider for CoreContextProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        100
    }

    fn attribute_sub_type(
        &self,
        parent_type: &str,
        parent_sub_type: &str,
        attr_name: &str,
    ) -> Option<String> {
        let sub_type = match (parent_type, attr_name) {
            (TYPE_KEY, "keys") => "stringArray",
            (TYPE_KEY, "foreignObjectRef") => "string",
            (TYPE_FIELD, "maxLength" | "minLength" | "precision" | "scale") => "int",
            (TYPE_FIELD, "required" | "isKey") => "boolean",
            (TYPE_FIELD, "pattern" | "defaultValue" | "objectRef") => "string",
            (TYPE_FIELD, "minValue" | "maxValue") => match parent_sub_type {
                "int" | "short" | "byte" => "int",
                "long" | "date" => "long",
                "double" | "float" => "double",
                _ => return None,
            },
            (TYPE_VALIDATOR, "min" | "max" | "pattern" | "values" | "msg" | "message") => {
                "string"
            }
            (TYPE_OBJECT, "_isAbstract" | "isAbstract" | "isInterface") => "boolean",
            _ => return None,
        };
        Some(sub_type.to_string())
    }

    fn child_sub_type(
        &self,
        _parent_type: &str,
        _parent_sub_type: &str,
        child_type: &str,
        child_name: &str,
    ) -> Option<String> {
        // Validators and keys are commonly named after their subtype
        let known: &[&str] = match child_type {
            TYPE_VALIDATOR => &["required", "length", "regex", "numeric", "array"],
            TYPE_KEY => &["primary", "secondary", "foreign"],
            _ => return None,
        };
        known
            .iter()
            .find(|sub| **sub == child_name)
            .map(|sub| (*sub).to_string())
    }
}
