//! Validators and instance validation.
//!
//! A `validator` node is a child of a field. Because children are inherited along the super
//! chain, a field declared as an overlay carries the validators of the field it extends
//! together with its own. [`MetaData::validate`] reads the field values of an instance and runs
//! every reachable validator against them.
//!
//! | Subtype    | Attributes        | Rule                                                   |
//! |------------|-------------------|--------------------------------------------------------|
//! | `required` |                   | Value is present and not blank                         |
//! | `length`   | `min`, `max`      | Character count within bounds, blank values pass       |
//! | `regex`    | `pattern`         | Whole value matches the pattern, blank values pass     |
//! | `numeric`  | `min`, `max`      | Value is a number within bounds, blank values pass     |
//! | `array`    | `min`, `max`      | Number of items within bounds                          |
//!
//! Every validator reports its `msg` attribute on failure when it has one.
//!
//! # Examples
//!
//! ```rust
//! use metaobjects::metadata::{MetaData, MetaValue};
//! use std::sync::Arc;
//!
//! let fruit = Arc::new(MetaData::object("value", "acme::Fruit")?);
//! let name = Arc::new(MetaData::field("string", "name")?);
//! let length = Arc::new(MetaData::validator("length", "short")?);
//! length.set_attr_value("max", MetaValue::Int(5))?;
//! name.add_child(length)?;
//! fruit.add_child(name.clone())?;
//!
//! let instance = fruit.new_instance()?;
//! name.set_object_value(&instance, Some(MetaValue::from("Granny Smith")))?;
//! assert!(fruit.validate(&instance).unwrap_err().is_validation());
//! # Ok::<(), metaobjects::Error>(())
//! ```

use std::{fmt, str::FromStr};

use regex::Regex;
use tracing::debug;

use crate::{
    metadata::{
        field::{ATTR_REQUIRED, VALIDATOR_REQUIRED},
        kind::{TYPE_FIELD, TYPE_OBJECT, TYPE_VALIDATOR},
        object::ObjectInstance,
        value::DataType,
        MetaData, MetaDataList, MetaValue,
    },
    Error, Result,
};

/// Validator subtype bounding the length of a value.
pub const VALIDATOR_LENGTH: &str = "length";
/// Validator subtype matching a value against a pattern.
pub const VALIDATOR_REGEX: &str = "regex";
/// Validator subtype bounding a numeric value.
pub const VALIDATOR_NUMERIC: &str = "numeric";
/// Validator subtype bounding the number of items in a list.
pub const VALIDATOR_ARRAY: &str = "array";

/// Lower bound of `length`, `numeric` and `array` validators.
pub const ATTR_MIN: &str = "min";
/// Upper bound of `length`, `numeric` and `array` validators.
pub const ATTR_MAX: &str = "max";
/// Pattern of `regex` validators.
pub const ATTR_PATTERN: &str = "pattern";
/// Failure message of any validator.
pub const ATTR_MSG: &str = "msg";
/// Older spelling of [`ATTR_MSG`].
pub const ATTR_MESSAGE: &str = "message";

const REQUIRED_MESSAGE: &str = "A value is required";

impl MetaData {
    /// Validate `instance` against this node.
    ///
    /// On a field, the field's value is checked against the `required` attribute and every
    /// validator reachable from the field. On an object, every field of the object is
    /// validated in declaration order and the first failure is returned.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for the first rejected value, and
    /// [`Error::InvalidMetadata`] if this node is neither a field nor an object, if the
    /// instance does not belong to this node, or if a validator is malformed.
    pub fn validate(&self, instance: &dyn ObjectInstance) -> Result<()> {
        match self.type_name() {
            TYPE_FIELD => self.validate_field(instance),
            TYPE_OBJECT => self
                .meta_fields()
                .iter()
                .try_for_each(|field| field.validate_field(instance)),
            _ => Err(invalid_metadata!("{} cannot validate instances", self)),
        }
    }

    /// The validators of a field, own and inherited.
    #[must_use]
    pub fn validators(&self) -> MetaDataList {
        self.children_of_type(TYPE_VALIDATOR)
    }

    /// Check `value` of `field` against this validator.
    ///
    /// Subtypes without a built-in rule accept every value.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if the value is rejected, and [`Error::InvalidMetadata`]
    /// if this is not a validator or its attributes cannot be interpreted.
    pub fn validate_value(&self, field: &MetaData, value: Option<&MetaValue>) -> Result<()> {
        if !self.is_type(TYPE_VALIDATOR) {
            return Err(invalid_metadata!("{} is not a validator", self));
        }

        match self.sub_type() {
            VALIDATOR_REQUIRED => self.check_required(field, value),
            VALIDATOR_LENGTH => self.check_length(field, value),
            VALIDATOR_REGEX => self.check_regex(field, value),
            VALIDATOR_NUMERIC => self.check_numeric(field, value),
            VALIDATOR_ARRAY => self.check_array(field, value),
            other => {
                debug!("No rule for validator subtype [{}] on {}", other, self);
                Ok(())
            }
        }
    }

    fn validate_field(&self, instance: &dyn ObjectInstance) -> Result<()> {
        let value = self.get_object_value(instance)?;
        if self.attr_flag(ATTR_REQUIRED) && is_blank(value.as_ref()) {
            return Err(Error::validation(self.name(), ATTR_REQUIRED, REQUIRED_MESSAGE));
        }

        self.validators()
            .iter()
            .try_for_each(|validator| validator.validate_value(self, value.as_ref()))
    }

    fn check_required(&self, field: &MetaData, value: Option<&MetaValue>) -> Result<()> {
        if is_blank(value) {
            return Err(self.failure(field, REQUIRED_MESSAGE.to_string()));
        }
        Ok(())
    }

    fn check_length(&self, field: &MetaData, value: Option<&MetaValue>) -> Result<()> {
        let min = self.bound::<usize>(ATTR_MIN)?.unwrap_or(0);
        let max = match self.bound::<usize>(ATTR_MAX)? {
            Some(max) => max,
            None => default_max_length(field.data_type()),
        };

        let Some(value) = value.filter(|value| !is_blank(Some(*value))) else {
            return Ok(());
        };
        let length = value.to_string().chars().count();
        if length < min || length > max {
            return Err(self.failure(
                field,
                format!("A valid length between {min} and {max} must be entered"),
            ));
        }
        Ok(())
    }

    fn check_regex(&self, field: &MetaData, value: Option<&MetaValue>) -> Result<()> {
        let Some(pattern) = self.attr_value(ATTR_PATTERN) else {
            return Err(invalid_metadata!("Validator {} has no [{}]", self, ATTR_PATTERN));
        };
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
            invalid_metadata!("Validator {} has an invalid pattern: {}", self, err)
        })?;

        let Some(value) = value.filter(|value| !is_blank(Some(*value))) else {
            return Ok(());
        };
        let text = value.to_string();
        if !regex.is_match(&text) {
            return Err(self.failure(field, format!("[{text}] is not in the required format")));
        }
        Ok(())
    }

    fn check_numeric(&self, field: &MetaData, value: Option<&MetaValue>) -> Result<()> {
        let min = self.bound::<f64>(ATTR_MIN)?;
        let max = self.bound::<f64>(ATTR_MAX)?;

        let Some(value) = value.filter(|value| !is_blank(Some(*value))) else {
            return Ok(());
        };
        let Some(number) = value.as_f64() else {
            return Err(self.failure(field, "A numeric value must be entered".to_string()));
        };
        if min.is_some_and(|min| number < min) || max.is_some_and(|max| number > max) {
            return Err(self.failure(
                field,
                format!("A value {} must be entered", Range(min, max)),
            ));
        }
        Ok(())
    }

    fn check_array(&self, field: &MetaData, value: Option<&MetaValue>) -> Result<()> {
        let min = self.bound::<usize>(ATTR_MIN)?;
        let max = self.bound::<usize>(ATTR_MAX)?;

        let count = match value {
            None => 0,
            Some(MetaValue::StringArray(items)) => items.len(),
            Some(_) => 1,
        };
        if min.is_some_and(|min| count < min) || max.is_some_and(|max| count > max) {
            return Err(self.failure(
                field,
                format!("A number of values {} must be entered", Range(min, max)),
            ));
        }
        Ok(())
    }

    /// A numeric bound attribute; file values arrive as text, so parse the rendered value.
    fn bound<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.attr_value(name)
            .map(|value| {
                let text = value.to_string();
                text.trim().parse::<T>().map_err(|_| {
                    invalid_metadata!("Validator {} has a non-numeric [{}]: {}", self, name, text)
                })
            })
            .transpose()
    }

    fn failure(&self, field: &MetaData, default_message: String) -> Error {
        let message = self
            .attr_value(ATTR_MSG)
            .or_else(|| self.attr_value(ATTR_MESSAGE))
            .map_or(default_message, |message| message.to_string());
        Error::validation(field.name(), self.name(), message)
    }
}

/// Absent, whitespace-only text and empty lists count as blank.
fn is_blank(value: Option<&MetaValue>) -> bool {
    match value {
        None => true,
        Some(MetaValue::String(text) | MetaValue::Class(text)) => text.trim().is_empty(),
        Some(MetaValue::StringArray(items)) => items.is_empty(),
        Some(MetaValue::Properties(props)) => props.is_empty(),
        Some(_) => false,
    }
}

/// Widest rendering of a value of each data type.
fn default_max_length(data_type: Option<DataType>) -> usize {
    match data_type {
        Some(DataType::Boolean) => 1,
        Some(DataType::Byte) => 4,
        Some(DataType::Short) => 6,
        Some(DataType::Int) => 10,
        Some(DataType::Long | DataType::Date) => 15,
        Some(DataType::Float) => 12,
        Some(DataType::Double) => 16,
        Some(DataType::String) => 100,
        _ => 1_000_000,
    }
}

struct Range<T>(Option<T>, Option<T>);

impl<T: fmt::Display> fmt::Display for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.0, &self.1) {
            (Some(min), Some(max)) => write!(f, "between {min} and {max}"),
            (Some(min), None) => write!(f, "of at least {min}"),
            (None, Some(max)) => write!(f, "of at most {max}"),
            (None, None) => f.write_str("of any size"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::*;
    use crate::{
        metadata::MetaDataRc,
        test::{create_attr, create_field, create_object},
    };

    fn create_validator(sub_type: &str, name: &str, attrs: &[(&str, &str)]) -> MetaDataRc {
        let validator = Arc::new(MetaData::validator(sub_type, name).unwrap());
        for (attr, value) in attrs {
            validator.add_child(create_attr(attr, value)).unwrap();
        }
        validator
    }

    fn check(validator: &MetaDataRc, field: &MetaDataRc, value: Option<MetaValue>) -> Result<()> {
        validator.validate_value(field, value.as_ref())
    }

    #[rstest]
    #[case(None, false)]
    #[case(Some(MetaValue::from("  ")), false)]
    #[case(Some(MetaValue::StringArray(vec![])), false)]
    #[case(Some(MetaValue::from("Gala")), true)]
    #[case(Some(MetaValue::Int(0)), true)]
    fn test_required(#[case] value: Option<MetaValue>, #[case] passes: bool) {
        let field = create_field("name", "string");
        let required = create_validator("required", "required1", &[]);
        assert_eq!(check(&required, &field, value).is_ok(), passes);
    }

    #[rstest]
    #[case("Fig", true)]
    #[case("Kiwi", true)]
    #[case("Apricot", false)]
    #[case("Ab", false)]
    #[case("", true)]
    fn test_length_bounds(#[case] text: &str, #[case] passes: bool) {
        let field = create_field("name", "string");
        let length = create_validator("length", "short", &[("min", "3"), ("max", "6")]);
        assert_eq!(check(&length, &field, Some(MetaValue::from(text))).is_ok(), passes);
    }

    #[test]
    fn test_length_defaults_to_data_type_width() {
        let field = create_field("count", "int");
        let length = create_validator("length", "digits", &[]);
        assert!(check(&length, &field, Some(MetaValue::Int(1_234_567_890))).is_ok());

        let long = create_field("count", "long");
        assert!(check(&length, &long, Some(MetaValue::Long(12_345_678_901))).is_ok());
        let err = check(&length, &field, Some(MetaValue::from("12345678901"))).unwrap_err();
        match err {
            Error::Validation { field, validator, message } => {
                assert_eq!(field, "count");
                assert_eq!(validator, "digits");
                assert_eq!(message, "A valid length between 0 and 10 must be entered");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_regex_matches_whole_value() {
        let field = create_field("code", "string");
        let regex = create_validator("regex", "code", &[("pattern", "[A-Z]{2}-\\d+")]);
        assert!(check(&regex, &field, Some(MetaValue::from("GS-42"))).is_ok());
        assert!(check(&regex, &field, None).is_ok());
        assert!(check(&regex, &field, Some(MetaValue::from("xGS-42")))
            .unwrap_err()
            .is_validation());
        assert!(check(&regex, &field, Some(MetaValue::from("GS-42x")))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_regex_without_pattern_is_malformed() {
        let field = create_field("code", "string");
        let missing = create_validator("regex", "missing", &[]);
        assert!(check(&missing, &field, Some(MetaValue::from("a")))
            .unwrap_err()
            .is_invalid_metadata());

        let broken = create_validator("regex", "broken", &[("pattern", "(")]);
        assert!(check(&broken, &field, Some(MetaValue::from("a")))
            .unwrap_err()
            .is_invalid_metadata());
    }

    #[rstest]
    #[case(MetaValue::Double(0.0), true)]
    #[case(MetaValue::Int(1000), true)]
    #[case(MetaValue::from(" 12.5 "), true)]
    #[case(MetaValue::Double(-0.5), false)]
    #[case(MetaValue::Long(1001), false)]
    #[case(MetaValue::from("heavy"), false)]
    fn test_numeric_bounds(#[case] value: MetaValue, #[case] passes: bool) {
        let field = create_field("weight", "double");
        let numeric = create_validator("numeric", "weight", &[("min", "0"), ("max", "1000")]);
        assert_eq!(check(&numeric, &field, Some(value)).is_ok(), passes);
    }

    #[test]
    fn test_numeric_with_one_bound() {
        let field = create_field("weight", "double");
        let numeric = create_validator("numeric", "positive", &[("min", "1")]);
        assert!(check(&numeric, &field, Some(MetaValue::Double(1e9))).is_ok());
        let Error::Validation { message, .. } =
            check(&numeric, &field, Some(MetaValue::Int(0))).unwrap_err()
        else {
            panic!("expected a validation error");
        };
        assert_eq!(message, "A value of at least 1 must be entered");

        let broken = create_validator("numeric", "broken", &[("max", "lots")]);
        assert!(check(&broken, &field, Some(MetaValue::Int(0)))
            .unwrap_err()
            .is_invalid_metadata());
    }

    #[test]
    fn test_array_item_count() {
        let field = create_field("tags", "stringArray");
        let array = create_validator("array", "tags", &[("min", "1"), ("max", "2")]);
        let tags = |items: &[&str]| {
            Some(MetaValue::StringArray(items.iter().map(ToString::to_string).collect()))
        };
        assert!(check(&array, &field, tags(&["red"])).is_ok());
        assert!(check(&array, &field, tags(&["red", "sweet"])).is_ok());
        assert!(check(&array, &field, tags(&[])).unwrap_err().is_validation());
        assert!(check(&array, &field, None).unwrap_err().is_validation());
        assert!(check(&array, &field, tags(&["a", "b", "c"])).unwrap_err().is_validation());
    }

    #[test]
    fn test_custom_message_and_unknown_subtype() {
        let field = create_field("name", "string");
        let required = create_validator("required", "named", &[("msg", "Name please")]);
        let Error::Validation { message, .. } = check(&required, &field, None).unwrap_err() else {
            panic!("expected a validation error");
        };
        assert_eq!(message, "Name please");

        let legacy = create_validator("required", "legacy", &[("message", "Still needed")]);
        let Error::Validation { message, .. } = check(&legacy, &field, None).unwrap_err() else {
            panic!("expected a validation error");
        };
        assert_eq!(message, "Still needed");

        let custom = create_validator("spellcheck", "words", &[]);
        assert!(check(&custom, &field, None).is_ok());
        assert!(field.validate_value(&field, None).unwrap_err().is_invalid_metadata());
    }

    #[test]
    fn test_validate_object_instance() {
        let fruit = create_object("acme::Fruit");
        let name = create_field("name", "string");
        name.add_child(create_attr("required", "true")).unwrap();
        name.add_child(create_validator("length", "name", &[("max", "8")])).unwrap();
        let weight = create_field("weight", "double");
        weight
            .add_child(create_validator("numeric", "weight", &[("min", "0")]))
            .unwrap();
        fruit.add_child(name.clone()).unwrap();
        fruit.add_child(weight.clone()).unwrap();

        let instance = fruit.new_instance().unwrap();
        let err = fruit.validate(&instance).unwrap_err();
        assert!(matches!(
            &err,
            Error::Validation { field, validator, .. } if field == "name" && validator == "required"
        ));

        name.set_object_value(&instance, Some(MetaValue::from("Gala"))).unwrap();
        fruit.validate(&instance).unwrap();

        weight.set_object_value(&instance, Some(MetaValue::Double(-1.0))).unwrap();
        let err = fruit.validate(&instance).unwrap_err();
        assert!(matches!(&err, Error::Validation { field, .. } if field == "weight"));
        assert!(name.validate(&instance).is_ok());
        assert!(weight.validate(&instance).unwrap_err().is_validation());

        let stone = create_object("acme::Stone");
        let stranger = stone.new_instance().unwrap();
        assert!(name.validate(&stranger).unwrap_err().is_invalid_metadata());
        assert!(create_attr("a", "b").validate(&instance).unwrap_err().is_invalid_metadata());
    }
}
