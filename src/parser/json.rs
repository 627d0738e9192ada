//! JSON metadata files.
//!
//! ```json
//! {
//!   "metadata": {
//!     "package": "acme::produce",
//!     "children": [
//!       { "object": { "name": "Fruit", "subType": "value", "children": [
//!         { "field": { "name": "weight", "type": "double", "@minValue": 0 } }
//!       ] } }
//!     ]
//!   }
//! }
//! ```
//!
//! Every child is an object with a single key naming its type. The subtype is read from
//! `subType` or `type`, keys starting with `@` are inline attributes, and the `children` key
//! may be left out when the first array-valued property holds the children.

use serde_json::{Map, Value};

use crate::{
    loader::MetaDataLoader,
    metadata::MetaValue,
    parser::{is_reserved, Builder, Element, ParseSummary, RawValue},
    Error, Result,
};

/// Parse a JSON metadata document into `loader`.
///
/// # Errors
/// Returns [`Error::Json`] for malformed JSON, [`Error::Loading`] for documents that do not
/// follow the metadata layout, and any error raised while applying the declarations.
pub(crate) fn parse(loader: &MetaDataLoader, resource: &str, json: &str) -> Result<ParseSummary> {
    let document: Value = serde_json::from_str(json)?;
    let root = document
        .get("metadata")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            Error::loading(resource, "Root must be an object with a [metadata] member")
        })?;

    let default_package = ["package", "defPackage"]
        .iter()
        .find_map(|key| root.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let elements = children_of(resource, root)?;
    Builder::new(loader, resource, default_package).build(elements)
}

/// The child list of an element body: `children`, or the first array under a non-reserved key.
fn children_of(resource: &str, body: &Map<String, Value>) -> Result<Vec<Element>> {
    let list = match body.get("children") {
        Some(Value::Array(list)) => Some(list),
        Some(Value::Null) | None => shorthand_children(body).map(|(_, list)| list),
        Some(other) => {
            return Err(Error::loading(
                resource,
                format!("[children] must be an array, found {other}"),
            ))
        }
    };

    list.into_iter()
        .flatten()
        .map(|child| element_of(resource, child))
        .collect()
}

fn shorthand_children(body: &Map<String, Value>) -> Option<(&String, &Vec<Value>)> {
    if body.contains_key("children") {
        return None;
    }
    // Only arrays of declarations qualify; arrays of scalars are attribute values
    body.iter().find_map(|(key, value)| match value {
        Value::Array(list)
            if !is_reserved(key)
                && !key.starts_with('@')
                && !list.is_empty()
                && list.iter().all(Value::is_object) =>
        {
            Some((key, list))
        }
        _ => None,
    })
}

fn element_of(resource: &str, child: &Value) -> Result<Element> {
    let entry = child
        .as_object()
        .filter(|object| object.len() == 1)
        .and_then(|object| object.iter().next());
    let Some((type_name, body)) = entry else {
        return Err(Error::loading(
            resource,
            format!("Each child must be an object with a single type key, found {child}"),
        ));
    };

    let mut element = Element::new(type_name);
    let body = match body {
        Value::Object(body) => body,
        Value::Null => return Ok(element),
        other => {
            return Err(Error::loading(
                resource,
                format!("Body of [{type_name}] must be an object, found {other}"),
            ))
        }
    };

    let shorthand = shorthand_children(body).map(|(key, _)| key);
    for (key, value) in body {
        if key == "children" || Some(key) == shorthand {
            continue;
        }
        if let Some(raw) = raw_value(value) {
            element.set_property(key, raw);
        }
    }
    element.children = children_of(resource, body)?;
    Ok(element)
}

/// Keep JSON scalar types; arrays become string arrays and objects their JSON text.
fn raw_value(value: &Value) -> Option<RawValue> {
    let raw = match value {
        Value::Null => return None,
        Value::String(text) => RawValue::Text(text.clone()),
        Value::Bool(flag) => RawValue::Typed(MetaValue::Boolean(*flag)),
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(int), _) => match i32::try_from(int) {
                Ok(small) => RawValue::Typed(MetaValue::Int(small)),
                Err(_) => RawValue::Typed(MetaValue::Long(int)),
            },
            (None, Some(float)) => RawValue::Typed(MetaValue::Double(float)),
            (None, None) => RawValue::Text(number.to_string()),
        },
        Value::Array(items) => RawValue::Typed(MetaValue::StringArray(
            items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect(),
        )),
        Value::Object(_) => RawValue::Text(value.to_string()),
    };
    Some(raw)
}
