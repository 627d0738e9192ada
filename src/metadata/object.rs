//! Objects and the instances they describe.
//!
//! An `object` node describes a domain object: its fields, keys, validators and views. The
//! crate does not generate data classes; instead it ships [`ValueObject`], a dynamic instance
//! that stores field values by name and keeps a weak back-reference to its object node.
//!
//! # Reverse Lookup
//!
//! Application types take part in reverse lookup (instance to object node) by implementing
//! [`ObjectInstance`]. Those that also implement [`MetaObjectAware`] remember which object
//! node produced them, which lets loaders answer the lookup without scanning. Without a
//! back-reference, loaders ask every object node whether it [`MetaData::produces`] the
//! instance.

use std::{any::Any, collections::BTreeMap, fmt, sync::Arc};

use parking_lot::RwLock;

use crate::{
    metadata::{
        cache::{CacheValue, HybridCache},
        kind::{TYPE_FIELD, TYPE_OBJECT},
        MetaData, MetaDataList, MetaDataRc, MetaDataRef, MetaValue,
    },
    Error, Result,
};

/// Attribute marking an object as abstract (private, not inherited).
pub const ATTR_IS_ABSTRACT_PRIVATE: &str = "_isAbstract";
/// Attribute marking an object as abstract (public, inherited).
pub const ATTR_IS_ABSTRACT: &str = "isAbstract";

/// Predicate deciding whether an object node produced an instance.
pub type ObjectProducer = Arc<dyn Fn(&dyn ObjectInstance) -> bool + Send + Sync>;

/// An application object that can be mapped back to its object node.
pub trait ObjectInstance: Send + Sync {
    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// The back-reference capability, if the type has one.
    fn meta_aware(&self) -> Option<&dyn MetaObjectAware> {
        None
    }
}

/// Instances that remember the object node that describes them.
pub trait MetaObjectAware {
    /// The remembered object node, if it is still alive.
    fn meta_object(&self) -> Option<MetaDataRc>;

    /// Remember `object`.
    fn set_meta_object(&self, object: &MetaDataRc);
}

/// A dynamic instance of an object node.
pub struct ValueObject {
    object_name: String,
    values: RwLock<BTreeMap<String, MetaValue>>,
    meta: RwLock<Option<MetaDataRef>>,
}

impl ValueObject {
    /// Create an empty, unattached instance for the object named `object_name`.
    #[must_use]
    pub fn new(object_name: &str) -> Self {
        ValueObject {
            object_name: object_name.to_string(),
            values: RwLock::new(BTreeMap::new()),
            meta: RwLock::new(None),
        }
    }

    /// Name of the object node this instance belongs to.
    #[must_use]
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Raw value access, bypassing field metadata.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<MetaValue> {
        self.values.read().get(name).cloned()
    }

    /// Raw value update, bypassing field metadata.
    pub fn set(&self, name: &str, value: Option<MetaValue>) {
        let mut values = self.values.write();
        match value {
            Some(value) => {
                values.insert(name.to_string(), value);
            }
            None => {
                values.remove(name);
            }
        }
    }

    /// Names of all fields that currently hold a value.
    #[must_use]
    pub fn value_names(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }
}

impl fmt::Debug for ValueObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueObject")
            .field("object", &self.object_name)
            .field("values", &*self.values.read())
            .finish()
    }
}

impl ObjectInstance for ValueObject {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn meta_aware(&self) -> Option<&dyn MetaObjectAware> {
        Some(self)
    }
}

impl MetaObjectAware for ValueObject {
    fn meta_object(&self) -> Option<MetaDataRc> {
        self.meta.read().as_ref().and_then(MetaDataRef::upgrade)
    }

    fn set_meta_object(&self, object: &MetaDataRc) {
        *self.meta.write() = Some(MetaDataRef::new(object));
    }
}

impl MetaData {
    /// Find a field by name, own fields first, then inherited ones.
    ///
    /// Results (including misses) are cached on this node until the graph around it changes.
    #[must_use]
    pub fn find_meta_field(&self, name: &str) -> Option<MetaDataRc> {
        self.use_cache(&HybridCache::key("metaField", name), || {
            CacheValue::from(self.find_child_of_type(TYPE_FIELD, name))
        })
        .into_node()
    }

    /// Find a field by name or fail.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if neither this node nor its super chain has the field.
    pub fn meta_field(&self, name: &str) -> Result<MetaDataRc> {
        self.find_meta_field(name)
            .ok_or_else(|| Error::not_found(TYPE_FIELD, name, self))
    }

    /// All reachable fields, own fields first.
    #[must_use]
    pub fn meta_fields(&self) -> MetaDataList {
        self.children_of_type(TYPE_FIELD)
    }

    /// Returns `true` if the object is marked abstract.
    ///
    /// The private `_isAbstract` marker only applies to the node declaring it, so objects
    /// inheriting from an abstract object are concrete unless they say otherwise.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.attr_flag(ATTR_IS_ABSTRACT_PRIVATE) || self.attr_flag(ATTR_IS_ABSTRACT)
    }

    /// Install a custom producer predicate on an object node.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] if this is not an object.
    pub fn set_producer(&self, producer: ObjectProducer) -> Result<()> {
        match self.kind().as_object() {
            Some(data) => {
                *data.producer.write() = Some(producer);
                Ok(())
            }
            None => Err(invalid_metadata!("{} is not an object", self)),
        }
    }

    /// Returns `true` if this object node describes `instance`.
    ///
    /// Uses the custom producer if one is installed, otherwise matches [`ValueObject`]s by
    /// object name.
    #[must_use]
    pub fn produces(&self, instance: &dyn ObjectInstance) -> bool {
        let Some(data) = self.kind().as_object() else {
            return false;
        };

        let producer = data.producer.read().clone();
        match producer {
            Some(producer) => producer(instance),
            None => instance
                .as_any()
                .downcast_ref::<ValueObject>()
                .is_some_and(|value| value.object_name() == self.name()),
        }
    }

    /// Create a [`ValueObject`] for this object, pre-filled with field defaults.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMetadata`] if this is not an object or the object is abstract.
    pub fn new_instance(self: &Arc<Self>) -> Result<ValueObject> {
        if !self.is_type(TYPE_OBJECT) {
            return Err(invalid_metadata!("{} is not an object", self));
        }
        if self.is_abstract() {
            return Err(invalid_metadata!("Cannot instantiate abstract object {}", self));
        }

        let instance = ValueObject::new(self.name());
        for field in self.meta_fields() {
            if let Some(default) = field.default_value() {
                instance.set(field.name(), Some(default));
            }
        }
        self.attach_meta_object(&instance);
        Ok(instance)
    }

    /// Store the back-reference on instances that support it.
    pub fn attach_meta_object(self: &Arc<Self>, instance: &dyn ObjectInstance) {
        if let Some(aware) = instance.meta_aware() {
            aware.set_meta_object(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{create_attr, create_field, create_object};

    struct Plain;

    impl ObjectInstance for Plain {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_meta_field_inherited_and_cached() {
        let fruit = create_object("Fruit");
        fruit.add_child(create_field("name", "string")).unwrap();
        let apple = create_object("Apple");
        apple.set_super_data(fruit.clone()).unwrap();

        let field = apple.meta_field("name").unwrap();
        assert!(field.is_child_of(&fruit));
        assert!(apple.cache().contains_key("metaField{name}"));
        assert!(apple.meta_field("color").unwrap_err().is_not_found());
    }

    #[test]
    fn test_new_instance_defaults_and_back_reference() {
        let fruit = create_object("Fruit");
        let color = create_field("color", "string");
        color.add_child(create_attr("defaultValue", "red")).unwrap();
        fruit.add_child(color).unwrap();

        let instance = fruit.new_instance().unwrap();
        assert_eq!(instance.get("color"), Some(MetaValue::from("red")));
        assert!(Arc::ptr_eq(&instance.meta_object().unwrap(), &fruit));
        assert!(fruit.produces(&instance));
    }

    #[test]
    fn test_abstract_objects_cannot_instantiate() {
        let fruit = create_object("Fruit");
        fruit.set_attr_value(ATTR_IS_ABSTRACT_PRIVATE, true.into()).unwrap();
        assert!(fruit.new_instance().unwrap_err().is_invalid_metadata());

        let apple = create_object("Apple");
        apple.set_super_data(fruit.clone()).unwrap();
        assert!(!apple.is_abstract());
        assert!(apple.new_instance().is_ok());
    }

    #[test]
    fn test_custom_producer() {
        let object = create_object("Plain");
        assert!(!object.produces(&Plain));

        object
            .set_producer(Arc::new(|instance: &dyn ObjectInstance| {
                instance.as_any().is::<Plain>()
            }))
            .unwrap();
        assert!(object.produces(&Plain));
        assert!(!object.produces(&ValueObject::new("Plain")));
        assert!(create_field("x", "int")
            .set_producer(Arc::new(|_: &dyn ObjectInstance| true))
            .is_err());
    }
}
