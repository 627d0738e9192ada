//! XML metadata files.
//!
//! ```xml
//! <metadata package="acme::produce">
//!   <object name="Apple" super="Fruit">
//!     <field name="variety" type="string" required="true"/>
//!     <attr name="label">Apple</attr>
//!   </object>
//! </metadata>
//! ```
//!
//! Element names are metadata types. Attributes named `name`, `subType`/`type`, `super`,
//! `package` and `overlay` configure the element; all other XML attributes become inline
//! metadata attributes. `<children>` wrappers are accepted and ignored, and the text or CDATA
//! of an `<attr>` element is its value.

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::{
    loader::MetaDataLoader,
    parser::{Builder, Element, ParseSummary, RawValue},
    Error, Result,
};

const ROOT_ELEMENT: &str = "metadata";
const CHILDREN_ELEMENT: &str = "children";

/// An open XML element while reading.
enum Open {
    Root,
    Wrapper,
    Declaration(Element, String),
}

/// Parse an XML metadata document into `loader`.
///
/// # Errors
/// Returns [`Error::Xml`] for malformed XML, [`Error::Loading`] for documents that do not
/// follow the metadata layout, and any error raised while applying the declarations.
pub(crate) fn parse(loader: &MetaDataLoader, resource: &str, xml: &[u8]) -> Result<ParseSummary> {
    let mut reader = Reader::from_reader(xml);
    let mut stack: Vec<Open> = Vec::new();
    let mut elements: Vec<Element> = Vec::new();
    let mut default_package = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let open = open_element(resource, &start, stack.is_empty(), &mut default_package)?;
                stack.push(open);
            }
            Event::Empty(start) => {
                let open = open_element(resource, &start, stack.is_empty(), &mut default_package)?;
                close_element(open, &mut stack, &mut elements);
            }
            Event::End(_) => {
                if let Some(open) = stack.pop() {
                    close_element(open, &mut stack, &mut elements);
                }
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                append_text(&mut stack, &text);
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).to_string();
                append_text(&mut stack, &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let Some(default_package) = default_package else {
        return Err(Error::loading(
            resource,
            format!("Document has no <{ROOT_ELEMENT}> root element"),
        ));
    };
    Builder::new(loader, resource, default_package).build(elements)
}

fn open_element(
    resource: &str,
    start: &BytesStart<'_>,
    is_document_root: bool,
    default_package: &mut Option<String>,
) -> Result<Open> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let mut properties = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value()?.to_string();
        properties.push((key, value));
    }

    if is_document_root {
        if tag != ROOT_ELEMENT {
            return Err(Error::loading(
                resource,
                format!("Root element must be <{ROOT_ELEMENT}>, found <{tag}>"),
            ));
        }
        let package = properties
            .into_iter()
            .find(|(key, _)| key == "package" || key == "defPackage")
            .map(|(_, value)| value)
            .unwrap_or_default();
        *default_package = Some(package);
        return Ok(Open::Root);
    }

    if tag == CHILDREN_ELEMENT {
        return Ok(Open::Wrapper);
    }

    let mut element = Element::new(&tag);
    for (key, value) in properties {
        element.set_property(&key, RawValue::Text(value));
    }
    Ok(Open::Declaration(element, String::new()))
}

fn close_element(open: Open, stack: &mut [Open], elements: &mut Vec<Element>) {
    let Open::Declaration(mut element, text) = open else {
        return;
    };

    let text = text.trim();
    if !text.is_empty() && element.value.is_none() {
        element.value = Some(RawValue::Text(text.to_string()));
    }

    // Wrappers are transparent: attach to the nearest enclosing declaration
    let parent = stack.iter_mut().rev().find_map(|open| match open {
        Open::Declaration(parent, _) => Some(parent),
        _ => None,
    });
    match parent {
        Some(parent) => parent.children.push(element),
        None => elements.push(element),
    }
}

fn append_text(stack: &mut [Open], text: &str) {
    if let Some(Open::Declaration(_, buffer)) = stack.last_mut() {
        buffer.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::MetaValue,
        test::{create_loader, APPLE_XML, FRUIT_JSON},
    };

    #[test]
    fn test_parse_apple_with_super() {
        let loader = create_loader("xml");
        loader.parse_json("fruit.json", FRUIT_JSON).unwrap();
        let summary = loader.parse_xml("apple.xml", APPLE_XML.as_bytes()).unwrap();
        assert_eq!(summary.count("object"), 1);

        let apple = loader.meta_object_by_name("acme::produce::Apple").unwrap();
        let fruit = loader.meta_object_by_name("acme::produce::Fruit").unwrap();
        assert!(std::sync::Arc::ptr_eq(&apple.super_data().unwrap(), &fruit));
        assert_eq!(apple.sub_type(), "value");
        assert!(!apple.is_abstract());
        assert_eq!(apple.meta_fields().len(), 3);
    }

    #[test]
    fn test_wrappers_text_and_cdata() {
        let loader = create_loader("xml");
        loader
            .parse_xml(
                "basket.xml",
                br#"<metadata package="acme">
                    <children>
                      <object name="Basket">
                        <children>
                          <field name="size" type="int" maxValue="12"/>
                        </children>
                        <attr name="label">Fruit &amp; Veg</attr>
                        <attr name="note" type="string"><![CDATA[<b>fresh</b>]]></attr>
                      </object>
                    </children>
                  </metadata>"#,
            )
            .unwrap();

        let basket = loader.meta_object_by_name("acme::Basket").unwrap();
        assert_eq!(
            basket.meta_field("size").unwrap().attr_value("maxValue"),
            Some(MetaValue::Int(12))
        );
        assert_eq!(basket.attr_value("label"), Some(MetaValue::from("Fruit & Veg")));
        assert_eq!(basket.attr_value("note"), Some(MetaValue::from("<b>fresh</b>")));
    }

    #[test]
    fn test_wrong_root_element() {
        let loader = create_loader("xml");
        let err = loader
            .parse_xml("bad.xml", b"<objects><object name=\"A\"/></objects>")
            .unwrap_err();
        assert!(matches!(err, Error::Loading { .. }));
    }

    #[test]
    fn test_unresolved_super_is_fatal() {
        let loader = create_loader("xml");
        let err = loader
            .parse_xml("apple.xml", APPLE_XML.as_bytes())
            .unwrap_err();
        match err {
            Error::Loading { message, .. } => assert!(message.contains("SuperClass [Fruit]")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
