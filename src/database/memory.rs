//! In-memory `ObjectStore`.
//!
//! Rows keep insertion order. Only one write transaction may be open at a
//! time: writers on other threads wait their turn, while a second write from
//! the thread already holding one fails with `TransactionInProgress`. A
//! transaction stages changes on a copy of the committed state and swaps the
//! copy in on commit, so an aborted transaction leaves nothing behind and
//! readers only ever see committed data.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use crate::database::predicate::{sort_order, Predicate};
use crate::database::record::{Accessor, Property, RawRecord, RecordKey};
use crate::database::store::{Capabilities, ObjectStore, StoreError, StoreResult, WriteTransaction};
use crate::filter::StoreQuery;

/// Per-collection property declarations
#[derive(Clone, Default)]
pub struct CollectionSchema {
    computed: Vec<(String, Accessor)>,
    hidden: Vec<String>,
}

impl CollectionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only property computed from the row's data on every read
    pub fn computed(
        mut self,
        name: impl Into<String>,
        compute: impl Fn(&Map<String, Value>) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.computed.push((name.into(), std::sync::Arc::new(compute)));
        self
    }

    /// Data property excluded from enumeration (`to_json`)
    pub fn hidden(mut self, name: impl Into<String>) -> Self {
        self.hidden.push(name.into());
        self
    }
}

#[derive(Clone, Default)]
struct Collection {
    next_key: u64,
    rows: BTreeMap<RecordKey, Map<String, Value>>,
    schema: CollectionSchema,
}

impl Collection {
    fn record(&self, name: &str, key: RecordKey, row: &Map<String, Value>) -> RawRecord {
        let mut properties: Vec<Property> = row
            .iter()
            .map(|(field, value)| {
                if self.schema.hidden.iter().any(|h| h == field) {
                    Property::hidden(field.clone(), value.clone())
                } else {
                    Property::data(field.clone(), value.clone())
                }
            })
            .collect();
        for (field, accessor) in &self.schema.computed {
            properties.push(Property::accessor(field.clone(), accessor.clone()));
        }
        RawRecord::new(name, key, properties)
    }

    fn is_computed(&self, field: &str) -> bool {
        self.schema.computed.iter().any(|(name, _)| name == field)
    }
}

#[derive(Clone, Default)]
struct MemoryState {
    collections: HashMap<String, Collection>,
}

impl MemoryState {
    fn collection_mut(&mut self, name: &str) -> &mut Collection {
        self.collections.entry(name.to_string()).or_default()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    writer: Mutex<()>,
    // Thread currently holding `writer`
    owner: Mutex<Option<ThreadId>>,
    capabilities: Option<Capabilities>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that answers queries but refuses to open write transactions
    pub fn read_only() -> Self {
        Self { capabilities: Some(Capabilities::READ_ONLY), ..Self::default() }
    }

    /// Wait for exclusive write access.
    ///
    /// The writer mutex guards no data, so a guard dropped while unwinding
    /// (a panicking hook) leaves nothing to repair and the poison is cleared.
    fn writer(&self, during: &'static str) -> StoreResult<WriterGuard<'_>> {
        let current = thread::current().id();
        if *self.owner() == Some(current) {
            return Err(StoreError::TransactionInProgress);
        }

        let guard = self.writer.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovering memory store writer lock poisoned before {}", during);
            self.writer.clear_poison();
            poisoned.into_inner()
        });
        *self.owner() = Some(current);
        Ok(WriterGuard { store: self, _guard: guard })
    }

    fn owner(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn define_collection(&self, name: &str, schema: CollectionSchema) -> StoreResult<()> {
        let _writer = self.writer("define")?;
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned("define"))?;
        state.collection_mut(name).schema = schema;
        Ok(())
    }

    /// Insert rows directly, outside any model. Returns the new keys.
    pub fn seed(&self, collection: &str, rows: Vec<Map<String, Value>>) -> StoreResult<Vec<RecordKey>> {
        let _writer = self.writer("seed")?;
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned("seed"))?;
        let target = state.collection_mut(collection);
        Ok(rows.into_iter().map(|row| insert_row(target, row)).collect())
    }

    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned("count"))?;
        Ok(state.collections.get(collection).map(|c| c.rows.len()).unwrap_or(0))
    }
}

impl ObjectStore for MemoryStore {
    fn capabilities(&self) -> Capabilities {
        self.capabilities.unwrap_or(Capabilities::FULL)
    }

    fn query(&self, query: &StoreQuery) -> StoreResult<Vec<RawRecord>> {
        let predicate = match query.predicate.as_deref() {
            Some(source) if !source.trim().is_empty() => Some(Predicate::parse(source)?),
            _ => None,
        };

        let state = self.state.read().map_err(|_| StoreError::LockPoisoned("query"))?;
        let collection = match state.collections.get(&query.collection) {
            Some(collection) => collection,
            None => return Ok(vec![]),
        };

        let mut records: Vec<RawRecord> = collection
            .rows
            .iter()
            .map(|(key, row)| collection.record(&query.collection, *key, row))
            .filter(|record| predicate.as_ref().map_or(true, |p| p.matches(record)))
            .collect();
        drop(state);

        if !query.sort.is_empty() {
            records.sort_by(|a, b| {
                for descriptor in &query.sort {
                    let left = a.get(&descriptor.field).unwrap_or(Value::Null);
                    let right = b.get(&descriptor.field).unwrap_or(Value::Null);
                    let ordering = sort_order(&left, &right);
                    let ordering = if descriptor.direction.is_descending() { ordering.reverse() } else { ordering };
                    if ordering.is_ne() {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        if let Some((start, end)) = query.range {
            let start = start.min(records.len());
            let end = end.clamp(start, records.len());
            records = records.drain(start..end).collect();
        }

        tracing::trace!("Memory query on {} returned {} records", query.collection, records.len());
        Ok(records)
    }

    fn begin_write(&self) -> StoreResult<Box<dyn WriteTransaction + '_>> {
        if !self.capabilities().write_transactions {
            return Err(StoreError::Backend("store is read-only".to_string()));
        }
        let writer = self.writer("begin_write")?;
        let staged = self.state.read().map_err(|_| StoreError::LockPoisoned("begin_write"))?.clone();
        Ok(Box::new(MemoryTransaction { store: self, _writer: writer, staged }))
    }
}

/// Exclusive write access; releases ownership before the lock itself
struct WriterGuard<'a> {
    store: &'a MemoryStore,
    _guard: MutexGuard<'a, ()>,
}

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        *self.store.owner() = None;
    }
}

fn insert_row(collection: &mut Collection, row: Map<String, Value>) -> RecordKey {
    collection.next_key += 1;
    let key = RecordKey(collection.next_key);
    collection.rows.insert(key, row);
    key
}

struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    _writer: WriterGuard<'a>,
    staged: MemoryState,
}

impl MemoryTransaction<'_> {
    fn row_mut(&mut self, collection: &str, key: RecordKey) -> StoreResult<&mut Map<String, Value>> {
        self.staged
            .collections
            .get_mut(collection)
            .and_then(|c| c.rows.get_mut(&key))
            .ok_or_else(|| StoreError::RecordNotFound { collection: collection.to_string(), key })
    }
}

impl WriteTransaction for MemoryTransaction<'_> {
    fn create(&mut self, collection: &str, fields: Map<String, Value>) -> StoreResult<RawRecord> {
        let target = self.staged.collection_mut(collection);
        if let Some(field) = fields.keys().find(|field| target.is_computed(field)) {
            return Err(StoreError::ReadOnlyProperty { collection: collection.to_string(), property: field.clone() });
        }
        let key = insert_row(target, fields);
        let row = &target.rows[&key];
        Ok(target.record(collection, key, row))
    }

    fn get(&self, collection: &str, key: RecordKey) -> StoreResult<Option<RawRecord>> {
        Ok(self
            .staged
            .collections
            .get(collection)
            .and_then(|c| c.rows.get(&key).map(|row| c.record(collection, key, row))))
    }

    fn assign(&mut self, collection: &str, key: RecordKey, field: &str, value: Value) -> StoreResult<()> {
        let computed = self.staged.collections.get(collection).map_or(false, |c| c.is_computed(field));
        if computed {
            return Err(StoreError::ReadOnlyProperty { collection: collection.to_string(), property: field.to_string() });
        }
        self.row_mut(collection, key)?.insert(field.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, collection: &str, key: RecordKey) -> StoreResult<bool> {
        Ok(self
            .staged
            .collections
            .get_mut(collection)
            .map_or(false, |c| c.rows.remove(&key).is_some()))
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        let store = self.store;
        let mut state = store.state.write().map_err(|_| StoreError::LockPoisoned("commit"))?;
        *state = self.staged;
        Ok(())
    }
}
