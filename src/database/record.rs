use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Computes a property from the record's data properties
pub type Accessor = Arc<dyn Fn(&Map<String, Value>) -> Value + Send + Sync>;

/// Store-internal record address, independent of any `id` property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(pub u64);

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone)]
pub enum PropertyValue {
    Data(Value),
    Accessor(Accessor),
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Data(v) => f.debug_tuple("Data").field(v).finish(),
            PropertyValue::Accessor(_) => f.write_str("Accessor(..)"),
        }
    }
}

/// One own property with its descriptor flags
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
    pub enumerable: bool,
    pub writable: bool,
}

impl Property {
    pub fn data(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value: PropertyValue::Data(value), enumerable: true, writable: true }
    }

    /// Non-enumerable data property
    pub fn hidden(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value: PropertyValue::Data(value), enumerable: false, writable: true }
    }

    /// Read-only computed property
    pub fn accessor(name: impl Into<String>, accessor: Accessor) -> Self {
        Self { name: name.into(), value: PropertyValue::Accessor(accessor), enumerable: false, writable: false }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.value, PropertyValue::Accessor(_))
    }
}

/// A record as read from an object store: its address plus every own property
#[derive(Debug, Clone)]
pub struct RawRecord {
    collection: String,
    key: RecordKey,
    properties: Vec<Property>,
}

impl RawRecord {
    pub fn new(collection: impl Into<String>, key: RecordKey, properties: Vec<Property>) -> Self {
        Self { collection: collection.into(), key, properties }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn key(&self) -> RecordKey {
        self.key
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    pub fn is_writable(&self, name: &str) -> bool {
        self.property(name).map(|p| p.writable && !p.is_accessor()).unwrap_or(false)
    }

    /// Read a property; accessors are evaluated against the data properties
    pub fn get(&self, name: &str) -> Option<Value> {
        let property = self.property(name)?;
        Some(match &property.value {
            PropertyValue::Data(v) => v.clone(),
            PropertyValue::Accessor(accessor) => accessor(&self.data()),
        })
    }

    pub fn id(&self) -> Option<String> {
        self.get("id").and_then(|v| v.as_str().map(str::to_string))
    }

    /// All data properties, enumerable or not
    pub fn data(&self) -> Map<String, Value> {
        self.properties
            .iter()
            .filter_map(|p| match &p.value {
                PropertyValue::Data(v) => Some((p.name.clone(), v.clone())),
                PropertyValue::Accessor(_) => None,
            })
            .collect()
    }

    /// Overwrite a data property in place; returns false if absent or read-only
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(Property { value: PropertyValue::Data(slot), writable: true, .. }) => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Enumerable properties as a JSON object, accessors evaluated
    pub fn to_json(&self) -> Value {
        let data = self.data();
        let map: Map<String, Value> = self
            .properties
            .iter()
            .filter(|p| p.enumerable)
            .map(|p| {
                let value = match &p.value {
                    PropertyValue::Data(v) => v.clone(),
                    PropertyValue::Accessor(accessor) => accessor(&data),
                };
                (p.name.clone(), value)
            })
            .collect();
        Value::Object(map)
    }
}

impl fmt::Display for RawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record(collection: {}, key: {}, id: {:?}, properties: {})",
            self.collection,
            self.key,
            self.id(),
            self.properties.len()
        )
    }
}
