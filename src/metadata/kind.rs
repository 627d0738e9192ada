//! Node kinds.
//!
//! The built-in metadata types form a closed set and are dispatched through the [`MetaKind`]
//! enum. Types contributed by third parties use [`MetaKind::Extension`] together with an
//! implementation of [`MetaDataExtension`].

use std::{any::Any, fmt, str::FromStr};

use parking_lot::RwLock;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    metadata::{
        object::ObjectProducer,
        value::{DataType, MetaValue},
    },
    Result,
};

/// Type name of attributes.
pub const TYPE_ATTR: &str = "attr";
/// Type name of fields.
pub const TYPE_FIELD: &str = "field";
/// Type name of objects.
pub const TYPE_OBJECT: &str = "object";
/// Type name of loaders.
pub const TYPE_LOADER: &str = "loader";
/// Type name of views.
pub const TYPE_VIEW: &str = "view";
/// Type name of validators.
pub const TYPE_VALIDATOR: &str = "validator";
/// Type name of keys.
pub const TYPE_KEY: &str = "key";

/// The metadata types every registry knows about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinType {
    /// `attr`
    Attr,
    /// `field`
    Field,
    /// `object`
    Object,
    /// `loader`
    Loader,
    /// `view`
    View,
    /// `validator`
    Validator,
    /// `key`
    Key,
}

/// Behaviour contributed by a third-party metadata kind.
///
/// Extensions are stored inside [`MetaKind::Extension`]. The identity of the node (type,
/// subtype, name) stays with the node itself; the extension only carries kind specific state.
pub trait MetaDataExtension: Send + Sync + fmt::Debug {
    /// Name of the node class, used by the class index of child collections.
    fn class_name(&self) -> &'static str;

    /// Whether adding a same-named sibling replaces this node instead of failing.
    fn delete_on_add(&self) -> bool {
        false
    }

    /// Produce the state of an overlay derived from this node.
    fn derive(&self) -> Box<dyn MetaDataExtension>;

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
}

/// State of an attribute node.
#[derive(Debug)]
pub struct AttributeData {
    data_type: DataType,
    value: RwLock<Option<MetaValue>>,
}

impl AttributeData {
    /// Create attribute state for a `sub_type` such as `"int"` or `"stringArray"`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMetadata`] for subtypes that are not data types.
    pub fn new(sub_type: &str, value: Option<MetaValue>) -> Result<Self> {
        let data_type = DataType::from_str(sub_type)
            .map_err(|_| invalid_metadata!("Attribute subType [{}] is not a data type", sub_type))?;
        let value = value.map(|v| v.coerce(data_type)).transpose()?;
        Ok(Self {
            data_type,
            value: RwLock::new(value),
        })
    }

    /// The data type values are coerced to.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The current value.
    #[must_use]
    pub fn value(&self) -> Option<MetaValue> {
        self.value.read().clone()
    }

    /// Replace the value, coercing it to the attribute's data type.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMetadata`] if the value cannot be coerced.
    pub fn set_value(&self, value: MetaValue) -> Result<()> {
        let value = value.coerce(self.data_type)?;
        *self.value.write() = Some(value);
        Ok(())
    }
}

/// State of an object node.
#[derive(Default)]
pub struct ObjectData {
    pub(crate) producer: RwLock<Option<ObjectProducer>>,
}

impl fmt::Debug for ObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectData")
            .field("custom_producer", &self.producer.read().is_some())
            .finish()
    }
}

/// The kind of a metadata node.
#[derive(Debug)]
pub enum MetaKind {
    /// A named, typed value attached to another node
    Attribute(AttributeData),
    /// A field of an object
    Field,
    /// An object definition
    Object(ObjectData),
    /// The root of a metadata graph
    Loader,
    /// A presentation hint
    View,
    /// A validation rule
    Validator,
    /// A key definition (primary, secondary, foreign)
    Key,
    /// A third-party kind
    Extension(Box<dyn MetaDataExtension>),
}

impl MetaKind {
    /// Name of the node class, e.g. `"Field"`.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self {
            MetaKind::Attribute(_) => "Attribute",
            MetaKind::Field => "Field",
            MetaKind::Object(_) => "Object",
            MetaKind::Loader => "Loader",
            MetaKind::View => "View",
            MetaKind::Validator => "Validator",
            MetaKind::Key => "Key",
            MetaKind::Extension(ext) => ext.class_name(),
        }
    }

    /// Whether a same-named sibling replaces this node on add.
    #[must_use]
    pub fn delete_on_add(&self) -> bool {
        match self {
            MetaKind::Attribute(_) => true,
            MetaKind::Extension(ext) => ext.delete_on_add(),
            _ => false,
        }
    }

    /// State for an overlay derived from a node of this kind.
    #[must_use]
    pub fn derive(&self) -> MetaKind {
        match self {
            MetaKind::Attribute(data) => MetaKind::Attribute(AttributeData {
                data_type: data.data_type,
                value: RwLock::new(data.value()),
            }),
            MetaKind::Field => MetaKind::Field,
            MetaKind::Object(data) => MetaKind::Object(ObjectData {
                producer: RwLock::new(data.producer.read().clone()),
            }),
            MetaKind::Loader => MetaKind::Loader,
            MetaKind::View => MetaKind::View,
            MetaKind::Validator => MetaKind::Validator,
            MetaKind::Key => MetaKind::Key,
            MetaKind::Extension(ext) => MetaKind::Extension(ext.derive()),
        }
    }

    /// The attribute state, if this is an attribute.
    #[must_use]
    pub fn as_attribute(&self) -> Option<&AttributeData> {
        match self {
            MetaKind::Attribute(data) => Some(data),
            _ => None,
        }
    }

    /// The object state, if this is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectData> {
        match self {
            MetaKind::Object(data) => Some(data),
            _ => None,
        }
    }

    /// The extension, if this is a third-party kind.
    #[must_use]
    pub fn as_extension(&self) -> Option<&dyn MetaDataExtension> {
        match self {
            MetaKind::Extension(ext) => Some(ext.as_ref()),
            _ => None,
        }
    }
}
