pub mod memory;
pub mod predicate;
pub mod record;
pub mod store;

pub use memory::{CollectionSchema, MemoryStore};
pub use predicate::Predicate;
pub use record::{Accessor, Property, PropertyValue, RawRecord, RecordKey};
pub use store::{Capabilities, ObjectStore, StoreError, StoreResult, WriteTransaction};
