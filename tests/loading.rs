//! Integration tests for loading metadata files through configured loaders.
//!
//! These tests read the fixtures under `tests/metadata` the way an application would: through a
//! JSON loader configuration naming a source directory and an ordered list of sources.

use metaobjects::{loader::config::ARG_STRICT, prelude::*};
use std::{fs, path::PathBuf, sync::Arc};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/metadata")
}

fn load_fixtures(name: &str) -> Result<Arc<MetaDataLoader>> {
    let loader = MetaDataLoader::new(name, "file", Arc::new(TypeRegistry::with_core_types()))?;
    loader.configure(LoaderConfig::from_file(fixtures().join("loader.json"))?)?;
    Ok(loader)
}

/// Fruit is declared in JSON, Apple and Pear in XML. Apple inherits Fruit's fields, overlays
/// `weight` and adds `variety`.
#[test]
fn test_fruit_and_apple_end_to_end() -> Result<()> {
    let loader = load_fixtures("produce")?;
    assert_eq!(loader.phase(), LoaderPhase::Initialized);
    assert!(loader.options().verbose);
    assert_eq!(loader.sources(), ["fruit.json", "apple.xml"]);

    let fruit = loader.meta_object_by_name("acme::produce::Fruit")?;
    let apple = loader.meta_object_by_name("acme::produce::Apple")?;
    let pear = loader.meta_object_by_name("acme::produce::Pear")?;

    assert!(fruit.is_abstract());
    assert!(!apple.is_abstract());
    assert!(Arc::ptr_eq(&pear.super_data().unwrap(), &fruit));
    assert_eq!(apple.sub_type(), "value");

    // Own fields first, then inherited ones
    let names: Vec<_> = apple
        .meta_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    assert_eq!(names, ["variety", "weight", "id", "name"]);

    let weight = apple.meta_field("weight")?;
    assert!(weight.is_child_of(&apple));
    assert!(Arc::ptr_eq(
        &weight.super_data().unwrap(),
        &fruit.meta_field("weight")?
    ));
    assert_eq!(weight.attr_value("minValue"), Some(MetaValue::Double(0.0)));
    let numeric = weight.children_of_type("validator");
    assert_eq!(numeric.len(), 1);
    assert_eq!(numeric[0].sub_type(), "numeric");
    assert_eq!(numeric[0].attr_value("max"), Some(MetaValue::from("1000")));

    assert!(apple.meta_field("name")?.is_required());
    assert_eq!(
        apple.meta_field("name")?.attr_value("maxLength"),
        Some(MetaValue::Int(40))
    );

    let key = fruit.require_child_of_type("key", "acme::produce::primary")?;
    assert_eq!(key.sub_type(), "primary");
    assert_eq!(
        key.attr_value("keys"),
        Some(MetaValue::StringArray(vec!["id".to_string()]))
    );

    let mut by_super: Vec<_> = loader
        .meta_data_by_super("acme::produce::Fruit")?
        .iter()
        .map(|n| n.name().to_string())
        .collect();
    by_super.sort();
    assert_eq!(by_super, ["acme::produce::Apple", "acme::produce::Pear"]);

    let instance = apple.new_instance()?;
    assert_eq!(instance.get("variety"), Some(MetaValue::from("Gala")));
    assert!(Arc::ptr_eq(&loader.meta_object_for(&instance)?, &apple));
    assert!(fruit.new_instance().is_err());
    Ok(())
}

/// Apple's `weight` overlay adds a numeric validator; Pear inherits Fruit's field unchanged.
#[test]
fn test_validate_instances_through_overlays() -> Result<()> {
    let loader = load_fixtures("validation")?;
    let apple = loader.meta_object_by_name("acme::produce::Apple")?;
    let pear = loader.meta_object_by_name("acme::produce::Pear")?;

    let instance = apple.new_instance()?;
    let err = apple.validate(&instance).unwrap_err();
    assert!(matches!(&err, Error::Validation { field, .. } if field == "name"));

    apple.meta_field("name")?.set_object_value(&instance, Some(MetaValue::from("Gala")))?;
    apple.meta_field("weight")?.set_object_value(&instance, Some(MetaValue::Int(180)))?;
    apple.validate(&instance)?;

    apple.meta_field("weight")?.set_object_value(&instance, Some(MetaValue::Int(1500)))?;
    let err = apple.validate(&instance).unwrap_err();
    assert!(matches!(&err, Error::Validation { field, .. } if field == "weight"));

    let heavy_pear = pear.new_instance()?;
    pear.meta_field("name")?.set_object_value(&heavy_pear, Some(MetaValue::from("Bosc")))?;
    pear.meta_field("weight")?.set_object_value(&heavy_pear, Some(MetaValue::Int(1500)))?;
    pear.validate(&heavy_pear)?;
    Ok(())
}

/// An overlay field runs its own validators and the ones declared on the field it extends.
#[test]
fn test_overlay_keeps_base_validators() -> Result<()> {
    let loader = MetaDataLoader::manual("codes")?;
    loader.init()?;
    loader.parse_xml(
        "codes.xml",
        br#"<metadata package="acme">
            <object name="Fruit">
                <field name="code" type="string">
                    <validator name="format" type="regex" pattern="[A-Z]{2}-\d+"
                        msg="Codes look like GS-42"/>
                </field>
            </object>
            <object name="Apple" super="Fruit">
                <field name="code" overlay="true">
                    <validator name="short" type="length" max="5"/>
                </field>
            </object>
        </metadata>"#,
    )?;

    let apple = loader.meta_object_by_name("acme::Apple")?;
    let code = apple.meta_field("code")?;
    let mut validators: Vec<_> = code
        .validators()
        .iter()
        .map(|v| v.sub_type().to_string())
        .collect();
    validators.sort();
    assert_eq!(validators, ["length", "regex"]);

    let instance = apple.new_instance()?;
    code.set_object_value(&instance, Some(MetaValue::from("GS-1")))?;
    apple.validate(&instance)?;

    code.set_object_value(&instance, Some(MetaValue::from("GS-123")))?;
    assert!(matches!(
        apple.validate(&instance),
        Err(Error::Validation { message, .. }) if message.starts_with("A valid length")
    ));

    code.set_object_value(&instance, Some(MetaValue::from("gs-1")))?;
    assert!(matches!(
        apple.validate(&instance),
        Err(Error::Validation { message, .. }) if message == "Codes look like GS-42"
    ));

    let fruit = loader.meta_object_by_name("acme::Fruit")?;
    let plain = fruit.new_instance()?;
    fruit.meta_field("code")?.set_object_value(&plain, Some(MetaValue::from("GS-123")))?;
    fruit.validate(&plain)?;
    Ok(())
}

/// Applying a file again must not duplicate anything; attributes take the last value.
#[test]
fn test_reparse_is_idempotent() -> Result<()> {
    let loader = load_fixtures("idempotent")?;
    let fruit = loader.meta_object_by_name("acme::produce::Fruit")?;
    let apple = loader.meta_object_by_name("acme::produce::Apple")?;
    let before = (
        loader.meta_objects()?.len(),
        fruit.direct_children().len(),
        apple.direct_children().len(),
        apple.meta_field("weight")?.direct_children().len(),
    );

    let json = fs::read_to_string(fixtures().join("fruit.json"))?;
    let xml = fs::read(fixtures().join("apple.xml"))?;
    loader.parse_json("fruit.json", &json)?;
    loader.parse_xml("apple.xml", &xml)?;

    let after = (
        loader.meta_objects()?.len(),
        fruit.direct_children().len(),
        apple.direct_children().len(),
        apple.meta_field("weight")?.direct_children().len(),
    );
    assert_eq!(before, after);
    assert!(fruit.child_stats().is_consistent());

    let relabeled = json.replace(r#""@label": "Fruit""#, r#""@label": "Produce""#);
    loader.parse_json("relabel.json", &relabeled)?;
    assert_eq!(fruit.attr_value("label"), Some(MetaValue::from("Produce")));
    assert_eq!(fruit.attributes().iter().filter(|a| a.name() == "label").count(), 1);
    Ok(())
}

#[test]
fn test_missing_source_dir_is_configuration_error() {
    let loader = MetaDataLoader::manual("missing-dir").unwrap();
    let config = LoaderConfig::new().with_source_dir("/nonexistent/metadata");
    assert!(matches!(loader.configure(config), Err(Error::Configuration(_))));
    assert_eq!(loader.phase(), LoaderPhase::Uninitialized);
}

#[test]
fn test_failed_init_leaves_loader_uninitialized() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("orphan.xml"),
        r#"<metadata package="acme"><object name="Orphan" super="Missing"/></metadata>"#,
    )
    .unwrap();

    let loader = MetaDataLoader::manual("orphan").unwrap();
    let config = LoaderConfig::new()
        .with_source_dir(dir.path())
        .with_source("orphan.xml");
    match loader.configure(config) {
        Err(Error::Loading { resource, message }) => {
            assert_eq!(resource, "orphan.xml");
            assert!(message.contains("SuperClass [Missing]"));
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(loader.phase(), LoaderPhase::Uninitialized);
    assert!(loader.direct_children().is_empty());
}

#[test]
fn test_unknown_types_skipped_unless_strict() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("gadget.json"),
        r#"{ "metadata": { "children": [
            { "gadget": { "name": "Widget" } },
            { "object": { "name": "Box" } }
        ] } }"#,
    )
    .unwrap();
    let config = LoaderConfig::new()
        .with_source_dir(dir.path())
        .with_source("gadget.json");

    let lenient = MetaDataLoader::manual("lenient").unwrap();
    lenient.configure(config.clone()).unwrap();
    assert!(lenient.find_meta_object("Box").is_some());

    let strict = MetaDataLoader::manual("strict").unwrap();
    let err = strict
        .configure(config.with_arg(ARG_STRICT, "true"))
        .unwrap_err();
    assert!(matches!(err, Error::Loading { .. }));
}

#[test]
fn test_register_through_args() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(LoaderRegistry::new());

    let loader = MetaDataLoader::manual("registered").unwrap();
    loader.set_loader_registry(registry.clone());
    loader
        .configure(
            LoaderConfig::new()
                .with_source_dir(dir.path())
                .with_arg("register", "true"),
        )
        .unwrap();

    assert_eq!(loader.phase(), LoaderPhase::Registered);
    assert!(Arc::ptr_eq(&registry.get("registered").unwrap(), &loader));

    loader.destroy().unwrap();
    assert!(registry.get("registered").is_none());
    assert_eq!(loader.phase(), LoaderPhase::Destroyed);
}
