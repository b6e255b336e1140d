use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use crate::database::{Property, RawRecord, RecordKey, StoreError};
use crate::error::ModelResult;
use crate::model::hydrator::hydrate;
use crate::model::pending::Pending;
use crate::model::transaction::{settle, write};
use crate::model::{object_payload, Model};
use crate::observer::{HookDispatch, ModelDefinition};
use crate::types::Operation;

/// A hydrated record, owned by whoever received it.
///
/// Clones share one snapshot. The store does not track instances: reading
/// an instance never touches the store, and only this instance's own
/// `update` refreshes its snapshot.
pub struct ModelInstance<D: ModelDefinition> {
    model: Model<D>,
    record: Arc<RwLock<RawRecord>>,
}

impl<D: ModelDefinition> ModelInstance<D> {
    pub(crate) fn hydrate(model: &Model<D>, record: &RawRecord) -> Self {
        Self {
            model: model.clone(),
            record: Arc::new(RwLock::new(hydrate(record))),
        }
    }

    pub fn model(&self) -> &Model<D> {
        &self.model
    }

    pub fn key(&self) -> RecordKey {
        self.read().key()
    }

    pub fn id(&self) -> Option<String> {
        self.read().id()
    }

    /// Read a property, evaluating computed ones against this snapshot
    pub fn get(&self, name: &str) -> Option<Value> {
        self.read().get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.read().has_own(name)
    }

    pub fn properties(&self) -> Vec<Property> {
        self.read().properties().to_vec()
    }

    /// Data properties, hidden ones included
    pub fn data(&self) -> Map<String, Value> {
        self.read().data()
    }

    /// Enumerable properties as JSON
    pub fn to_json(&self) -> Value {
        self.read().to_json()
    }

    pub fn snapshot(&self) -> RawRecord {
        self.read().clone()
    }

    /// Apply `modifier` to the backing record.
    ///
    /// `before_update` runs once; only fields this instance already has as
    /// writable own properties are assigned. On commit the snapshot is
    /// refreshed and `after_update(None)` is scheduled.
    pub fn update(&self, modifier: Value) -> ModelResult<Pending<()>> {
        let store = self.model.store(Operation::Update)?;
        let modifier = object_payload(modifier, Operation::Update)?;
        let snapshot = self.snapshot();
        let key = snapshot.key();

        let mut hooks = HookDispatch::new(self.model.definition_arc());
        let outcome = write(store.as_ref(), D::NAME, Operation::Update, |txn| {
            let changes = hooks.before_update(modifier)?;
            for (field, value) in changes {
                if snapshot.is_writable(&field) {
                    txn.assign(D::NAME, key, &field, value)?;
                } else {
                    tracing::trace!("Skipping '{}' on {} {}: not a writable field", field, D::NAME, key);
                }
            }

            let fresh = txn.get(D::NAME, key)?.ok_or_else(|| StoreError::RecordNotFound {
                collection: D::NAME.to_string(),
                key,
            })?;
            hooks.stage_after_update(None);
            Ok(fresh)
        });

        let outcome = outcome.map(|fresh| self.refresh(&fresh));
        Ok(settle(Operation::Update, outcome, hooks, self.model.scheduler()))
    }

    /// Delete the backing record. `before_remove(None)` runs first and
    /// `after_remove()` is scheduled on commit.
    pub fn remove(&self) -> ModelResult<Pending<()>> {
        let store = self.model.store(Operation::Remove)?;
        let key = self.key();

        let mut hooks = HookDispatch::new(self.model.definition_arc());
        let outcome = write(store.as_ref(), D::NAME, Operation::Remove, |txn| {
            hooks.before_remove(None)?;
            if !txn.delete(D::NAME, key)? {
                return Err(StoreError::RecordNotFound { collection: D::NAME.to_string(), key }.into());
            }
            hooks.stage_after_remove();
            Ok(())
        });

        Ok(settle(Operation::Remove, outcome, hooks, self.model.scheduler()))
    }

    fn refresh(&self, fresh: &RawRecord) {
        let mut record = self.record.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *record = hydrate(fresh);
    }

    fn read(&self) -> RwLockReadGuard<'_, RawRecord> {
        // Writers only ever swap in a whole snapshot
        self.record.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<D: ModelDefinition> Clone for ModelInstance<D> {
    fn clone(&self) -> Self {
        Self { model: self.model.clone(), record: Arc::clone(&self.record) }
    }
}

impl<D: ModelDefinition> fmt::Debug for ModelInstance<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("model", &D::NAME)
            .field("key", &self.key())
            .field("data", &self.to_json())
            .finish()
    }
}

impl<D: ModelDefinition> fmt::Display for ModelInstance<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", D::NAME, self.to_json())
    }
}
