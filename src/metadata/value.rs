//! Typed values carried by attributes and by value objects.
//!
//! Metadata files are textual, so every value starts life as a string (or a JSON scalar). The
//! [`DataType`] of the receiving attribute or field decides how it is parsed into a
//! [`MetaValue`]. When a file does not say which type it wants, [`MetaValue::infer`] casts the
//! raw text the same way for both file formats.

use std::{collections::BTreeMap, fmt};

use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::Result;

/// The value types known to attributes and fields.
///
/// The string forms are the subtype names used in metadata files, so a `field` with
/// `subType="stringArray"` is a field of [`DataType::StringArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum DataType {
    /// UTF-8 text
    String,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 64-bit float
    Double,
    /// 32-bit float, stored as [`MetaValue::Double`]
    Float,
    /// 16-bit integer, stored as [`MetaValue::Int`]
    Short,
    /// 8-bit integer, stored as [`MetaValue::Int`]
    Byte,
    /// `true` / `false`
    Boolean,
    /// Milliseconds since the epoch, stored as [`MetaValue::Long`]
    Date,
    /// Comma separated list of strings
    StringArray,
    /// `key=value` pairs separated by commas
    Properties,
    /// Name of an implementation type
    Class,
    /// Reference to another object by name
    Object,
    /// References to other objects by name
    ObjectArray,
}

impl DataType {
    /// Returns `true` if a value of this shape can be stored under this data type.
    #[must_use]
    pub fn accepts(self, value: &MetaValue) -> bool {
        match (self, value) {
            (DataType::String, MetaValue::String(_))
            | (DataType::Int | DataType::Short | DataType::Byte, MetaValue::Int(_))
            | (DataType::Long | DataType::Date, MetaValue::Long(_) | MetaValue::Int(_))
            | (
                DataType::Double | DataType::Float,
                MetaValue::Double(_) | MetaValue::Int(_) | MetaValue::Long(_),
            )
            | (DataType::Boolean, MetaValue::Boolean(_))
            | (DataType::StringArray | DataType::ObjectArray, MetaValue::StringArray(_))
            | (DataType::Properties, MetaValue::Properties(_))
            | (DataType::Class, MetaValue::Class(_) | MetaValue::String(_))
            | (DataType::Object, MetaValue::String(_)) => true,
            _ => false,
        }
    }
}

/// A typed attribute or field value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    /// Text
    String(String),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// Floating point
    Double(f64),
    /// Boolean flag
    Boolean(bool),
    /// List of strings
    StringArray(Vec<String>),
    /// Ordered key/value pairs
    Properties(BTreeMap<String, String>),
    /// Implementation type name
    Class(String),
}

impl MetaValue {
    /// Cast raw text to the most specific scalar it represents.
    ///
    /// `true`/`false` become booleans, integral text becomes [`MetaValue::Int`] (or
    /// [`MetaValue::Long`] when it does not fit 32 bits), decimal text with a fraction becomes
    /// [`MetaValue::Double`], and everything else stays a string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use metaobjects::metadata::value::MetaValue;
    ///
    /// assert_eq!(MetaValue::infer("true"), MetaValue::Boolean(true));
    /// assert_eq!(MetaValue::infer("-12"), MetaValue::Int(-12));
    /// assert_eq!(MetaValue::infer("4000000000"), MetaValue::Long(4_000_000_000));
    /// assert_eq!(MetaValue::infer(".5"), MetaValue::Double(0.5));
    /// assert_eq!(MetaValue::infer("1.0.0"), MetaValue::String("1.0.0".into()));
    /// ```
    #[must_use]
    pub fn infer(raw: &str) -> MetaValue {
        match raw {
            "true" => return MetaValue::Boolean(true),
            "false" => return MetaValue::Boolean(false),
            _ => {}
        }

        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(value) = raw.parse::<i32>() {
                return MetaValue::Int(value);
            }
            if let Ok(value) = raw.parse::<i64>() {
                return MetaValue::Long(value);
            }
        }

        if let Some((whole, fraction)) = digits.split_once('.') {
            if whole.bytes().all(|b| b.is_ascii_digit())
                && !fraction.is_empty()
                && fraction.bytes().all(|b| b.is_ascii_digit())
            {
                if let Ok(value) = raw.parse::<f64>() {
                    return MetaValue::Double(value);
                }
            }
        }

        MetaValue::String(raw.to_string())
    }

    /// Parse raw text as `data_type`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMetadata`] if the text is not a valid value of that type.
    pub fn parse(data_type: DataType, raw: &str) -> Result<MetaValue> {
        let trimmed = raw.trim();
        let value = match data_type {
            DataType::String | DataType::Object => MetaValue::String(raw.to_string()),
            DataType::Class => MetaValue::Class(trimmed.to_string()),
            DataType::Int => MetaValue::Int(parse_number(data_type, trimmed)?),
            DataType::Short => {
                MetaValue::Int(i32::from(parse_number::<i16>(data_type, trimmed)?))
            }
            DataType::Byte => MetaValue::Int(i32::from(parse_number::<i8>(data_type, trimmed)?)),
            DataType::Long | DataType::Date => MetaValue::Long(parse_number(data_type, trimmed)?),
            DataType::Double | DataType::Float => {
                MetaValue::Double(parse_number(data_type, trimmed)?)
            }
            DataType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => MetaValue::Boolean(true),
                "false" | "no" | "0" => MetaValue::Boolean(false),
                _ => {
                    return Err(invalid_metadata!(
                        "Value [{}] is not a valid boolean",
                        raw
                    ))
                }
            },
            DataType::StringArray | DataType::ObjectArray => {
                MetaValue::StringArray(split_list(raw))
            }
            DataType::Properties => {
                let mut properties = BTreeMap::new();
                for pair in split_list(raw) {
                    match pair.split_once('=') {
                        Some((key, value)) => {
                            properties.insert(key.trim().to_string(), value.trim().to_string());
                        }
                        None => {
                            return Err(invalid_metadata!(
                                "Property [{}] is not of the form key=value",
                                pair
                            ))
                        }
                    }
                }
                MetaValue::Properties(properties)
            }
        };

        Ok(value)
    }

    /// Convert this value to `data_type`, re-parsing its text form when the shapes differ.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMetadata`] if the value cannot be represented.
    pub fn coerce(self, data_type: DataType) -> Result<MetaValue> {
        if data_type.accepts(&self) {
            return Ok(match (data_type, self) {
                (DataType::Long | DataType::Date, MetaValue::Int(v)) => {
                    MetaValue::Long(i64::from(v))
                }
                (DataType::Double | DataType::Float, MetaValue::Int(v)) => {
                    MetaValue::Double(f64::from(v))
                }
                #[allow(clippy::cast_precision_loss)]
                (DataType::Double | DataType::Float, MetaValue::Long(v)) => {
                    MetaValue::Double(v as f64)
                }
                (DataType::Class, MetaValue::String(v)) => MetaValue::Class(v),
                (_, value) => value,
            });
        }

        MetaValue::parse(data_type, &self.to_string())
    }

    /// The data type this value naturally belongs to.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            MetaValue::String(_) => DataType::String,
            MetaValue::Int(_) => DataType::Int,
            MetaValue::Long(_) => DataType::Long,
            MetaValue::Double(_) => DataType::Double,
            MetaValue::Boolean(_) => DataType::Boolean,
            MetaValue::StringArray(_) => DataType::StringArray,
            MetaValue::Properties(_) => DataType::Properties,
            MetaValue::Class(_) => DataType::Class,
        }
    }

    /// Borrow the text of a string or class value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) | MetaValue::Class(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a flag. Strings `"true"` and `"false"` are accepted.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Boolean(b) => Some(*b),
            MetaValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret the value as an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::Int(v) => Some(i64::from(*v)),
            MetaValue::Long(v) => Some(*v),
            MetaValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret the value as a float.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Double(v) => Some(*v),
            MetaValue::Int(v) => Some(f64::from(*v)),
            #[allow(clippy::cast_precision_loss)]
            MetaValue::Long(v) => Some(*v as f64),
            MetaValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Borrow the items of a string list.
    #[must_use]
    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            MetaValue::StringArray(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::String(s) | MetaValue::Class(s) => f.write_str(s),
            MetaValue::Int(v) => write!(f, "{v}"),
            MetaValue::Long(v) => write!(f, "{v}"),
            MetaValue::Double(v) => write!(f, "{v}"),
            MetaValue::Boolean(v) => write!(f, "{v}"),
            MetaValue::StringArray(items) => f.write_str(&items.join(",")),
            MetaValue::Properties(props) => {
                let pairs: Vec<String> = props.iter().map(|(k, v)| format!("{k}={v}")).collect();
                f.write_str(&pairs.join(","))
            }
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::String(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::String(value)
    }
}

impl From<i32> for MetaValue {
    fn from(value: i32) -> Self {
        MetaValue::Int(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Long(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Double(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Boolean(value)
    }
}

impl From<Vec<String>> for MetaValue {
    fn from(value: Vec<String>) -> Self {
        MetaValue::StringArray(value)
    }
}

/// Split a comma separated list, trimming items and dropping empty ones.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(data_type: DataType, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| invalid_metadata!("Value [{}] is not a valid {}", raw, data_type))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_infer_scalars() {
        assert_eq!(MetaValue::infer("false"), MetaValue::Boolean(false));
        assert_eq!(MetaValue::infer("42"), MetaValue::Int(42));
        assert_eq!(MetaValue::infer("-7.25"), MetaValue::Double(-7.25));
        assert_eq!(MetaValue::infer("True"), MetaValue::String("True".into()));
        assert_eq!(MetaValue::infer("-"), MetaValue::String("-".into()));
        assert_eq!(MetaValue::infer("5."), MetaValue::String("5.".into()));
    }

    #[test]
    fn test_parse_by_type() {
        assert_eq!(
            MetaValue::parse(DataType::StringArray, "a, b ,,c").unwrap(),
            MetaValue::StringArray(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(
            MetaValue::parse(DataType::Boolean, "YES").unwrap(),
            MetaValue::Boolean(true)
        );
        assert_eq!(MetaValue::parse(DataType::Float, "1.5").unwrap(), MetaValue::Double(1.5));
        assert!(MetaValue::parse(DataType::Byte, "300").is_err());
        assert!(MetaValue::parse(DataType::Int, "abc").is_err());
    }

    #[test]
    fn test_parse_properties() {
        let value = MetaValue::parse(DataType::Properties, "b=2, a=1").unwrap();
        assert_eq!(value.to_string(), "a=1,b=2");
        assert!(MetaValue::parse(DataType::Properties, "nope").is_err());
    }

    #[test]
    fn test_coerce() {
        assert_eq!(
            MetaValue::Int(3).coerce(DataType::Long).unwrap(),
            MetaValue::Long(3)
        );
        assert_eq!(
            MetaValue::String("12".into()).coerce(DataType::Int).unwrap(),
            MetaValue::Int(12)
        );
        assert!(MetaValue::Boolean(true).coerce(DataType::Int).is_err());
    }

    #[test]
    fn test_data_type_names() {
        assert_eq!(DataType::StringArray.to_string(), "stringArray");
        assert_eq!(DataType::from_str("objectArray").unwrap(), DataType::ObjectArray);
        assert!(DataType::from_str("unknown").is_err());
    }
}
