//! Turns raw store records into instance snapshots.
//!
//! Every own property is copied with its descriptor: data properties by
//! value, computed properties as their accessor. Accessors are evaluated
//! against the snapshot's own data, so a computed field follows changes made
//! to the instance rather than freezing at read time.

use std::sync::Arc;

use crate::database::{Property, PropertyValue, RawRecord};

pub fn hydrate(record: &RawRecord) -> RawRecord {
    let mut accessors = 0;
    let properties: Vec<Property> = record
        .properties()
        .iter()
        .map(|property| {
            let value = match &property.value {
                PropertyValue::Data(value) => PropertyValue::Data(value.clone()),
                PropertyValue::Accessor(accessor) => {
                    accessors += 1;
                    PropertyValue::Accessor(Arc::clone(accessor))
                }
            };
            Property {
                name: property.name.clone(),
                value,
                enumerable: property.enumerable,
                writable: property.writable,
            }
        })
        .collect();

    tracing::trace!(
        "Hydrated {} {} with {} properties ({} computed)",
        record.collection(),
        record.key(),
        properties.len(),
        accessors
    );

    RawRecord::new(record.collection(), record.key(), properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::RecordKey;
    use serde_json::{json, Map, Value};

    fn record() -> RawRecord {
        let full_name: crate::database::Accessor = Arc::new(|data: &Map<String, Value>| {
            let first = data.get("first").and_then(Value::as_str).unwrap_or_default();
            let last = data.get("last").and_then(Value::as_str).unwrap_or_default();
            json!(format!("{} {}", first, last))
        });
        RawRecord::new(
            "Person",
            RecordKey(7),
            vec![
                Property::data("first", json!("Ada")),
                Property::data("last", json!("Lovelace")),
                Property::hidden("secret", json!(42)),
                Property::accessor("full_name", full_name),
            ],
        )
    }

    #[test]
    fn copies_every_property_with_its_flags() {
        let source = record();
        let hydrated = hydrate(&source);

        assert_eq!(hydrated.key(), RecordKey(7));
        assert_eq!(hydrated.properties().len(), 4);
        let secret = hydrated.property("secret").unwrap();
        assert!(!secret.enumerable && secret.writable);
        let full_name = hydrated.property("full_name").unwrap();
        assert!(full_name.is_accessor() && !full_name.writable);
    }

    #[test]
    fn computed_fields_follow_the_snapshot() {
        let source = record();
        let mut hydrated = hydrate(&source);

        assert!(hydrated.set("first", json!("Grace")));
        assert_eq!(hydrated.get("full_name"), Some(json!("Grace Lovelace")));
        // The source record is not touched
        assert_eq!(source.get("full_name"), Some(json!("Ada Lovelace")));
    }
}
