//! Built-in type registrations.
//!
//! Registers the core types (`attr`, `field`, `object`, `view`, `validator`, `key`, `loader`)
//! with their subtypes, defaults and child rules, plus the [`CoreContextProvider`].

use std::sync::Arc;

use tracing::warn;

use crate::{
    metadata::{
        kind::{
            TYPE_ATTR, TYPE_FIELD, TYPE_KEY, TYPE_LOADER, TYPE_OBJECT, TYPE_VALIDATOR, TYPE_VIEW,
        },
        MetaData,
    },
    registry::{
        context::CoreContextProvider,
        types::{ChildRequirement, MetaDataFactory, TypeDefinition, TypeFlags, TypeRegistry},
    },
};

const ATTR_SUB_TYPES: &[&str] = &[
    "string",
    "int",
    "long",
    "double",
    "float",
    "boolean",
    "stringArray",
    "properties",
    "class",
];

const FIELD_SUB_TYPES: &[&str] = &[
    "string",
    "int",
    "long",
    "double",
    "float",
    "short",
    "byte",
    "boolean",
    "date",
    "stringArray",
    "object",
    "objectArray",
    "class",
];

const OBJECT_SUB_TYPES: &[&str] = &["value", "pojo", "proxy", "map"];
const VIEW_SUB_TYPES: &[&str] = &["base", "text", "date", "monetary", "hotlink"];
const VALIDATOR_SUB_TYPES: &[&str] = &["required", "length", "regex", "numeric", "array"];
const KEY_SUB_TYPES: &[&str] = &["primary", "secondary", "foreign"];
const LOADER_SUB_TYPES: &[&str] = &["manual", "file"];

fn flags_for(index: usize) -> TypeFlags {
    if index == 0 {
        TypeFlags::ALLOWS_CHILDREN | TypeFlags::DEFAULT_SUBTYPE
    } else {
        TypeFlags::ALLOWS_CHILDREN
    }
}

fn implementation(type_name: &str, sub_type: &str) -> String {
    format!("core.{type_name}.{sub_type}")
}

/// Register the core types and context provider on `registry`.
///
/// The first subtype listed for each type is its default. Failures are logged and skipped so
/// that a registry already holding conflicting definitions keeps them.
pub(crate) fn register_core_types(registry: &TypeRegistry) {
    let mut definitions = Vec::new();

    for (index, sub_type) in ATTR_SUB_TYPES.iter().enumerate() {
        let flags = flags_for(index) - TypeFlags::ALLOWS_CHILDREN;
        definitions.push(
            TypeDefinition::new(
                TYPE_ATTR,
                sub_type,
                &implementation(TYPE_ATTR, sub_type),
                MetaDataFactory::sub_type_name(|sub, name| MetaData::attribute(sub, name, None)),
            )
            .with_description("Attribute holding a typed value")
            .with_flags(flags),
        );
    }

    for (index, sub_type) in FIELD_SUB_TYPES.iter().enumerate() {
        definitions.push(
            TypeDefinition::new(
                TYPE_FIELD,
                sub_type,
                &implementation(TYPE_FIELD, sub_type),
                MetaDataFactory::sub_type_name(MetaData::field),
            )
            .with_description("Field of an object")
            .with_flags(flags_for(index))
            .with_child(ChildRequirement::any_of(TYPE_ATTR))
            .with_child(ChildRequirement::any_of(TYPE_VALIDATOR))
            .with_child(ChildRequirement::any_of(TYPE_VIEW)),
        );
    }

    for (index, sub_type) in OBJECT_SUB_TYPES.iter().enumerate() {
        definitions.push(
            TypeDefinition::new(
                TYPE_OBJECT,
                sub_type,
                &implementation(TYPE_OBJECT, sub_type),
                MetaDataFactory::full(|_, sub, name| MetaData::object(sub, name)),
            )
            .with_description("Domain object")
            .with_flags(flags_for(index))
            .with_child(ChildRequirement::any_of(TYPE_ATTR))
            .with_child(ChildRequirement::any_of(TYPE_FIELD))
            .with_child(ChildRequirement::any_of(TYPE_KEY))
            .with_child(ChildRequirement::any_of(TYPE_VALIDATOR))
            .with_child(ChildRequirement::any_of(TYPE_VIEW)),
        );
    }

    for (index, sub_type) in VIEW_SUB_TYPES.iter().enumerate() {
        definitions.push(
            TypeDefinition::new(
                TYPE_VIEW,
                sub_type,
                &implementation(TYPE_VIEW, sub_type),
                MetaDataFactory::sub_type_name(MetaData::view),
            )
            .with_description("Presentation hint")
            .with_flags(flags_for(index))
            .with_child(ChildRequirement::any_of(TYPE_ATTR)),
        );
    }

    for (index, sub_type) in VALIDATOR_SUB_TYPES.iter().enumerate() {
        definitions.push(
            TypeDefinition::new(
                TYPE_VALIDATOR,
                sub_type,
                &implementation(TYPE_VALIDATOR, sub_type),
                MetaDataFactory::sub_type_name(MetaData::validator),
            )
            .with_description("Value constraint")
            .with_flags(flags_for(index))
            .with_child(ChildRequirement::any_of(TYPE_ATTR)),
        );
    }

    for (index, sub_type) in KEY_SUB_TYPES.iter().enumerate() {
        let fixed = (*sub_type).to_string();
        definitions.push(
            TypeDefinition::new(
                TYPE_KEY,
                sub_type,
                &implementation(TYPE_KEY, sub_type),
                MetaDataFactory::name(move |name| MetaData::key(&fixed, name)),
            )
            .with_description("Object key")
            .with_flags(flags_for(index))
            .with_child(ChildRequirement::any_of(TYPE_ATTR)),
        );
    }

    // Loaders accept any child type
    for (index, sub_type) in LOADER_SUB_TYPES.iter().enumerate() {
        definitions.push(
            TypeDefinition::new(
                TYPE_LOADER,
                sub_type,
                &implementation(TYPE_LOADER, sub_type),
                MetaDataFactory::sub_type_name(MetaData::loader),
            )
            .with_description("Root of a loaded metadata graph")
            .with_flags(flags_for(index)),
        );
    }

    for definition in definitions {
        let key = definition.key().clone();
        if let Err(err) = registry.register_type(definition) {
            warn!("Skipping core type [{}]: {}", key, err);
        }
    }

    registry
        .context()
        .register(Arc::new(CoreContextProvider::default()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_defaults() {
        let registry = TypeRegistry::with_core_types();
        assert_eq!(registry.default_sub_type(TYPE_ATTR).as_deref(), Some("string"));
        assert_eq!(registry.default_sub_type(TYPE_FIELD).as_deref(), Some("string"));
        assert_eq!(registry.default_sub_type(TYPE_OBJECT).as_deref(), Some("value"));
        assert_eq!(registry.default_sub_type(TYPE_VIEW).as_deref(), Some("base"));
        assert_eq!(registry.default_sub_type(TYPE_VALIDATOR).as_deref(), Some("required"));
        assert_eq!(registry.default_sub_type(TYPE_KEY).as_deref(), Some("primary"));
        assert_eq!(registry.default_sub_type(TYPE_LOADER).as_deref(), Some("manual"));
        assert_eq!(registry.stats().context_providers, 1);
    }

    #[test]
    fn test_core_child_rules() {
        let registry = TypeRegistry::with_core_types();
        let object = MetaData::object("value", "Fruit").unwrap();
        let attr = MetaData::attribute("string", "label", None).unwrap();
        let loader = MetaData::loader("manual", "root").unwrap();

        assert!(registry.accepts_child(&object, TYPE_FIELD, "string", "name"));
        assert!(!registry.accepts_child(&object, TYPE_OBJECT, "value", "Nested"));
        assert!(!registry.accepts_child(&attr, TYPE_ATTR, "string", "x"));
        assert!(registry.accepts_child(&loader, TYPE_OBJECT, "value", "Fruit"));
    }

    #[test]
    fn test_every_core_type_instantiates() {
        let registry = TypeRegistry::with_core_types();
        for key in registry.registered_types() {
            let node = registry
                .create_instance(&key.type_name, &key.sub_type, "sample")
                .unwrap();
            assert_eq!(node.sub_type(), key.sub_type);
        }
    }

    #[test]
    fn test_reregistering_core_types_is_noop() {
        let registry = TypeRegistry::with_core_types();
        let before = registry.stats();
        register_core_types(&registry);
        assert_eq!(registry.stats().registered_types, before.registered_types);
    }
}
