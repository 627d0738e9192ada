use std::sync::Arc;

use crate::{
    loader::MetaDataLoader,
    metadata::{MetaData, MetaDataRc, MetaValue},
    registry::TypeRegistry,
};

// Helper function to create an object of subtype "value"
pub fn create_object(name: &str) -> MetaDataRc {
    Arc::new(MetaData::object("value", name).unwrap())
}

// Helper function to create a field
pub fn create_field(name: &str, sub_type: &str) -> MetaDataRc {
    Arc::new(MetaData::field(sub_type, name).unwrap())
}

// Helper function to create a string attribute
pub fn create_attr(name: &str, value: &str) -> MetaDataRc {
    Arc::new(MetaData::attribute("string", name, Some(MetaValue::from(value))).unwrap())
}

// Helper function to create an initialized loader backed by its own core registry
pub fn create_loader(name: &str) -> Arc<MetaDataLoader> {
    let loader =
        MetaDataLoader::new(name, "manual", Arc::new(TypeRegistry::with_core_types())).unwrap();
    loader.init().unwrap();
    loader
}

pub const FRUIT_JSON: &str = r#"{
  "metadata": {
    "package": "acme::produce",
    "children": [
      {
        "object": {
          "name": "Fruit",
          "subType": "value",
          "@_isAbstract": true,
          "children": [
            { "field": { "name": "id", "subType": "long", "@isKey": true } },
            { "field": { "name": "name", "subType": "string", "@required": true } },
            { "field": { "name": "weight", "subType": "double", "@minValue": 0 } }
          ]
        }
      }
    ]
  }
}"#;

pub const APPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata package="acme::produce">
  <object name="Apple" super="Fruit"/>
</metadata>"#;
