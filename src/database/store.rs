use serde_json::{Map, Value};
use thiserror::Error;

use crate::database::record::{RawRecord, RecordKey};
use crate::filter::StoreQuery;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced by an object store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid predicate '{predicate}': {message}")]
    InvalidPredicate { predicate: String, message: String },

    #[error("Record {key} not found in collection {collection}")]
    RecordNotFound { collection: String, key: RecordKey },

    #[error("Property '{property}' of {collection} is read-only")]
    ReadOnlyProperty { collection: String, property: String },

    #[error("A write transaction is already open on this thread")]
    TransactionInProgress,

    #[error("Store lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// What a store can do; models require both before any call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub query: bool,
    pub write_transactions: bool,
}

impl Capabilities {
    pub const FULL: Capabilities = Capabilities { query: true, write_transactions: true };
    pub const READ_ONLY: Capabilities = Capabilities { query: true, write_transactions: false };

    /// Name of the first missing capability that `required` asks for
    pub fn missing(&self, required: &Capabilities) -> Option<&'static str> {
        if required.query && !self.query {
            return Some("query");
        }
        if required.write_transactions && !self.write_transactions {
            return Some("write transactions");
        }
        None
    }
}

/// Transactional embedded object store the model layer runs on.
///
/// Collections are addressed by name. Reads never need a transaction;
/// every mutation happens inside a `WriteTransaction`.
pub trait ObjectStore: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Filter, sort, then slice one collection
    fn query(&self, query: &StoreQuery) -> StoreResult<Vec<RawRecord>>;

    /// Open a write transaction. Dropping it without `commit` rolls back.
    fn begin_write(&self) -> StoreResult<Box<dyn WriteTransaction + '_>>;
}

pub trait WriteTransaction {
    fn create(&mut self, collection: &str, fields: Map<String, Value>) -> StoreResult<RawRecord>;

    /// Read a record as staged in this transaction
    fn get(&self, collection: &str, key: RecordKey) -> StoreResult<Option<RawRecord>>;

    fn assign(&mut self, collection: &str, key: RecordKey, field: &str, value: Value) -> StoreResult<()>;

    /// Returns false when the record was already gone
    fn delete(&mut self, collection: &str, key: RecordKey) -> StoreResult<bool>;

    fn commit(self: Box<Self>) -> StoreResult<()>;
}
