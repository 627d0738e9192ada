//! Field accessors and reflective value access.

use std::str::FromStr;

use crate::{
    metadata::{
        kind::{TYPE_FIELD, TYPE_VALIDATOR},
        object::{ObjectInstance, ValueObject},
        value::DataType,
        MetaData, MetaValue,
    },
    Result,
};

/// Attribute marking a field as mandatory.
pub const ATTR_REQUIRED: &str = "required";
/// Attribute holding a field's default value.
pub const ATTR_DEFAULT_VALUE: &str = "defaultValue";
/// Attribute naming the object a field refers to.
pub const ATTR_OBJECT_REF: &str = "objectRef";
/// Validator subtype that makes a field mandatory.
pub const VALIDATOR_REQUIRED: &str = "required";

impl MetaData {
    /// The data type of a field, derived from its subtype.
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        if !self.is_type(TYPE_FIELD) {
            return None;
        }
        DataType::from_str(self.sub_type()).ok()
    }

    /// Returns `true` if the field is mandatory, either through the `required` attribute or a
    /// `required` validator. Both may be inherited.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.attr_flag(ATTR_REQUIRED)
            || self
                .children_of_type(TYPE_VALIDATOR)
                .iter()
                .any(|validator| validator.sub_type() == VALIDATOR_REQUIRED)
    }

    /// The field's `defaultValue` attribute converted to the field's data type.
    #[must_use]
    pub fn default_value(&self) -> Option<MetaValue> {
        let value = self.attr_value(ATTR_DEFAULT_VALUE)?;
        match self.data_type() {
            Some(data_type) => value.coerce(data_type).ok(),
            None => Some(value),
        }
    }

    /// Name of the object this field refers to.
    #[must_use]
    pub fn object_ref(&self) -> Option<String> {
        self.attr_value(ATTR_OBJECT_REF)
            .map(|value| value.to_string())
    }

    /// Read this field from an instance.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMetadata`] if this is not a field, the instance is not a
    /// [`ValueObject`], or the instance's object does not have this field.
    pub fn get_object_value(&self, instance: &dyn ObjectInstance) -> Result<Option<MetaValue>> {
        let object = self.value_object(instance)?;
        Ok(object.get(self.name()))
    }

    /// Write this field on an instance, converting the value to the field's data type.
    ///
    /// # Errors
    /// Same as [`MetaData::get_object_value`], plus values that do not fit the data type.
    pub fn set_object_value(
        &self,
        instance: &dyn ObjectInstance,
        value: Option<MetaValue>,
    ) -> Result<()> {
        let object = self.value_object(instance)?;
        let value = match (value, self.data_type()) {
            (Some(value), Some(data_type)) => Some(value.coerce(data_type)?),
            (value, _) => value,
        };
        object.set(self.name(), value);
        Ok(())
    }

    fn value_object<'a>(&self, instance: &'a dyn ObjectInstance) -> Result<&'a ValueObject> {
        if !self.is_type(TYPE_FIELD) {
            return Err(invalid_metadata!("{} is not a field", self));
        }

        let Some(object) = instance.as_any().downcast_ref::<ValueObject>() else {
            return Err(invalid_metadata!(
                "Field {} only supports value objects",
                self
            ));
        };

        if let Some(meta) = instance.meta_aware().and_then(|aware| aware.meta_object()) {
            if meta.find_meta_field(self.name()).is_none() {
                return Err(invalid_metadata!(
                    "Field {} does not belong to object {}",
                    self,
                    meta
                ));
            }
        }
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test::{create_attr, create_field, create_object};

    #[test]
    fn test_required_by_attribute_or_validator() {
        let name = create_field("name", "string");
        assert!(!name.is_required());
        name.add_child(create_attr("required", "true")).unwrap();
        assert!(name.is_required());

        let color = create_field("color", "string");
        color
            .add_child(Arc::new(MetaData::validator("required", "required1").unwrap()))
            .unwrap();
        assert!(color.is_required());
    }

    #[test]
    fn test_default_value_coerced() {
        let count = create_field("count", "int");
        count.add_child(create_attr("defaultValue", "3")).unwrap();
        assert_eq!(count.default_value(), Some(MetaValue::Int(3)));
        assert_eq!(count.data_type(), Some(DataType::Int));
    }

    #[test]
    fn test_object_value_access() {
        let fruit = create_object("Fruit");
        let weight = create_field("weight", "double");
        fruit.add_child(weight.clone()).unwrap();
        let stray = create_field("stray", "string");

        let instance = fruit.new_instance().unwrap();
        weight
            .set_object_value(&instance, Some(MetaValue::Int(2)))
            .unwrap();
        assert_eq!(
            weight.get_object_value(&instance).unwrap(),
            Some(MetaValue::Double(2.0))
        );

        assert!(weight
            .set_object_value(&instance, Some(MetaValue::from("heavy")))
            .is_err());
        assert!(stray.get_object_value(&instance).is_err());
        assert!(fruit.get_object_value(&instance).is_err());
    }
}
