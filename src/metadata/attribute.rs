//! Attribute accessors.
//!
//! Attributes are ordinary children of type [`TYPE_ATTR`]; the methods here are thin wrappers
//! over the generic child lookups, so inherited attributes and the private-name filter behave
//! exactly like every other child.

use std::sync::Arc;

use crate::{
    metadata::{kind::TYPE_ATTR, MetaData, MetaDataList, MetaDataRc, MetaValue},
    Error, Result,
};

impl MetaData {
    /// Find an attribute, own attributes first.
    #[must_use]
    pub fn find_attr(&self, name: &str) -> Option<MetaDataRc> {
        self.find_child_of_type(TYPE_ATTR, name)
    }

    /// Find an attribute or fail.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if no attribute is named `name`.
    pub fn require_attr(&self, name: &str) -> Result<MetaDataRc> {
        self.find_attr(name)
            .ok_or_else(|| Error::not_found(TYPE_ATTR, name, self))
    }

    /// Returns `true` if an attribute named `name` is reachable.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.find_attr(name).is_some()
    }

    /// All reachable attributes.
    #[must_use]
    pub fn attributes(&self) -> MetaDataList {
        self.children_of_type(TYPE_ATTR)
    }

    /// The value of the attribute named `name`.
    #[must_use]
    pub fn attr_value(&self, name: &str) -> Option<MetaValue> {
        self.find_attr(name).and_then(|attr| attr.value())
    }

    /// Interpret the attribute named `name` as a flag; absent or non-boolean is `false`.
    #[must_use]
    pub fn attr_flag(&self, name: &str) -> bool {
        self.attr_value(name)
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    /// Set an attribute on this node, creating it when this node has no own attribute with
    /// that name. Inherited attributes are shadowed, not modified.
    ///
    /// New attributes take their subtype from the value.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] if the value does not fit an existing attribute's type.
    pub fn set_attr_value(self: &Arc<Self>, name: &str, value: MetaValue) -> Result<MetaDataRc> {
        if let Some(attr) = self.find_direct_child_of_type(TYPE_ATTR, name) {
            attr.set_value(value)?;
            self.flush_caches();
            return Ok(attr);
        }

        let sub_type = value.data_type().to_string();
        let attr = Arc::new(MetaData::attribute(&sub_type, name, Some(value))?);
        self.add_child(attr.clone())?;
        Ok(attr)
    }

    /// The value of an attribute node. `None` for other kinds or unset attributes.
    #[must_use]
    pub fn value(&self) -> Option<MetaValue> {
        self.kind().as_attribute().and_then(|data| data.value())
    }

    /// Set the value of an attribute node.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] if this is not an attribute or the value does not fit.
    pub fn set_value(&self, value: MetaValue) -> Result<()> {
        match self.kind().as_attribute() {
            Some(data) => data.set_value(value),
            None => Err(invalid_metadata!("{} is not an attribute", self)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{create_attr, create_object};

    #[test]
    fn test_set_attr_value_creates_and_updates() {
        let object = create_object("Fruit");
        let attr = object.set_attr_value("dbTable", "FRUIT".into()).unwrap();
        assert_eq!(attr.sub_type(), "string");

        let again = object.set_attr_value("dbTable", "FRUITS".into()).unwrap();
        assert!(Arc::ptr_eq(&attr, &again));
        assert_eq!(object.attr_value("dbTable"), Some(MetaValue::from("FRUITS")));
        assert_eq!(object.attributes().len(), 1);
    }

    #[test]
    fn test_set_attr_value_shadows_inherited() {
        let fruit = create_object("Fruit");
        fruit.add_child(create_attr("label", "Fruit")).unwrap();
        let apple = create_object("Apple");
        apple.set_super_data(fruit.clone()).unwrap();

        apple.set_attr_value("label", "Apple".into()).unwrap();
        assert_eq!(apple.attr_value("label"), Some(MetaValue::from("Apple")));
        assert_eq!(fruit.attr_value("label"), Some(MetaValue::from("Fruit")));
    }

    #[test]
    fn test_attr_flag_and_require() {
        let object = create_object("Fruit");
        object.set_attr_value("isAbstract", true.into()).unwrap();
        assert!(object.attr_flag("isAbstract"));
        assert!(!object.attr_flag("missing"));
        assert!(object.require_attr("missing").unwrap_err().is_not_found());
        assert!(object.set_value(MetaValue::Int(1)).is_err());
    }
}
