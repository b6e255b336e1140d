//! Model handles and their CRUD operations.
//!
//! A `Model<D>` binds a `ModelDefinition` to an `ObjectStore`. Reads return
//! hydrated instances directly. Writes run in exactly one store transaction
//! per call and return a `Pending` carrying its outcome; the outer `Result`
//! only holds errors raised before the transaction was attempted.

pub mod hydrator;
pub mod instance;
pub mod pending;
pub(crate) mod transaction;

pub use instance::ModelInstance;
pub use pending::Pending;

use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::config::{config, AppConfig};
use crate::database::{Capabilities, ObjectStore, RawRecord};
use crate::error::{ModelError, ModelResult};
use crate::filter::{Filter, FindOptions, StoreQuery};
use crate::observer::{HookDispatch, HookScheduler, ModelDefinition};
use crate::types::Operation;
use transaction::{settle, write};

struct ModelInner<D: ModelDefinition> {
    definition: Arc<D>,
    store: RwLock<Option<Arc<dyn ObjectStore>>>,
    scheduler: HookScheduler,
    config: AppConfig,
}

/// Handle to one model type. Clones share the definition, store binding and
/// hook scheduler.
pub struct Model<D: ModelDefinition> {
    inner: Arc<ModelInner<D>>,
}

pub struct ModelBuilder<D: ModelDefinition> {
    definition: D,
    store: Option<Arc<dyn ObjectStore>>,
    config: Option<AppConfig>,
    scheduler: Option<HookScheduler>,
}

impl<D: ModelDefinition> ModelBuilder<D> {
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this configuration instead of the process-wide `CONFIG`
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share a scheduler across models, so one `flush` drains all of them
    pub fn scheduler(mut self, scheduler: HookScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn build(self) -> Model<D> {
        let config = self.config.unwrap_or_else(|| config().clone());
        let scheduler = self.scheduler.unwrap_or_else(|| HookScheduler::new(config.hooks.dispatch));
        Model {
            inner: Arc::new(ModelInner {
                definition: Arc::new(self.definition),
                store: RwLock::new(self.store),
                scheduler,
                config,
            }),
        }
    }
}

impl<D: ModelDefinition> Model<D> {
    pub fn builder(definition: D) -> ModelBuilder<D> {
        ModelBuilder { definition, store: None, config: None, scheduler: None }
    }

    pub fn name(&self) -> &'static str {
        D::NAME
    }

    pub fn definition(&self) -> &D {
        &self.inner.definition
    }

    pub(crate) fn definition_arc(&self) -> Arc<D> {
        Arc::clone(&self.inner.definition)
    }

    pub fn scheduler(&self) -> &HookScheduler {
        &self.inner.scheduler
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Bind (or rebind) the object store used by subsequent calls
    pub fn bind(&self, store: Arc<dyn ObjectStore>) {
        let mut slot = self.inner.store.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(store);
        tracing::debug!("Bound {} to object store", D::NAME);
    }

    pub fn unbind(&self) {
        let mut slot = self.inner.store.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }

    pub fn is_bound(&self) -> bool {
        self.inner.store.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// The bound store, checked on every call
    pub(crate) fn store(&self, operation: Operation) -> ModelResult<Arc<dyn ObjectStore>> {
        let store = {
            let slot = self.inner.store.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.clone()
        };

        let store = store.ok_or_else(|| self.configuration(operation, "no object store is bound".to_string()))?;

        if let Some(missing) = store.capabilities().missing(&Capabilities::FULL) {
            return Err(self.configuration(operation, format!("bound object store does not support {}", missing)));
        }

        Ok(store)
    }

    fn configuration(&self, operation: Operation, reason: String) -> ModelError {
        tracing::warn!("{} cannot {}: {}", D::NAME, operation, reason);
        ModelError::Configuration { model: D::NAME, operation, reason }
    }

    fn compile(&self, filter: &Value, options: &FindOptions) -> ModelResult<StoreQuery> {
        let mut builder = Filter::new(D::NAME, &self.inner.config.filter)?;
        builder.where_clause(filter)?.assign(options)?;
        let query = builder.to_query()?;

        if self.inner.config.filter.debug_logging {
            tracing::debug!("{} query: predicate={:?}, sort={:?}, range={:?}", D::NAME, query.predicate, query.sort, query.range);
        }
        Ok(query)
    }

    fn hydrate_all(&self, records: &[RawRecord]) -> Vec<ModelInstance<D>> {
        records.iter().map(|record| ModelInstance::hydrate(self, record)).collect()
    }

    /// Matching records, sorted then sliced per `options`
    pub fn find(&self, filter: &Value, options: &FindOptions) -> ModelResult<Vec<ModelInstance<D>>> {
        let store = self.store(Operation::Find)?;
        let query = self.compile(filter, options)?;
        let records = store.query(&query)?;
        tracing::debug!("Found {} {} records", records.len(), D::NAME);
        Ok(self.hydrate_all(&records))
    }

    /// First matching record in store order
    pub fn find_one(&self, filter: &Value) -> ModelResult<Option<ModelInstance<D>>> {
        let store = self.store(Operation::Find)?;
        let mut builder = Filter::new(D::NAME, &self.inner.config.filter)?;
        builder.where_clause(filter)?.limit(1, Some(0));
        let query = builder.to_query()?;
        let records = store.query(&query)?;
        Ok(records.first().map(|record| ModelInstance::hydrate(self, record)))
    }

    /// Create one record. Any caller-supplied `id` is replaced by a fresh UUID.
    pub fn insert(&self, fields: Value) -> ModelResult<Pending<ModelInstance<D>>> {
        let store = self.store(Operation::Insert)?;
        let fields = object_payload(fields, Operation::Insert)?;

        let mut hooks = HookDispatch::new(self.definition_arc());
        let outcome = write(store.as_ref(), D::NAME, Operation::Insert, |txn| {
            let mut fields = hooks.before_insert(fields)?;
            fields.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));

            let record = txn.create(D::NAME, fields)?;
            let instance = ModelInstance::hydrate(self, &record);
            hooks.stage_after_insert(instance.clone());
            Ok(instance)
        });

        if let Ok(ref instance) = outcome {
            tracing::info!("Inserted {} {}", D::NAME, instance.id().unwrap_or_default());
        }
        Ok(settle(Operation::Insert, outcome, hooks, self.scheduler()))
    }

    /// Assign `modifier` to every matching record.
    ///
    /// Returns `Ok(None)` without touching the store when `modifier` is
    /// empty. Otherwise `before_update` runs once per matched record with the
    /// original modifier, and only fields the record already has are
    /// assigned. Resolves to the number of records updated.
    pub fn update(&self, filter: &Value, modifier: Value) -> ModelResult<Option<Pending<usize>>> {
        let store = self.store(Operation::Update)?;
        let modifier = object_payload(modifier, Operation::Update)?;
        if modifier.is_empty() {
            tracing::debug!("Empty modifier for {} update, nothing to do", D::NAME);
            return Ok(None);
        }

        let query = self.compile(filter, &FindOptions::default())?;
        let matched = match store.query(&query) {
            Ok(records) => records,
            Err(e) => return Ok(Some(Pending::rejected(e))),
        };

        let mut hooks = HookDispatch::new(self.definition_arc());
        let outcome = write(store.as_ref(), D::NAME, Operation::Update, |txn| {
            let mut updated: usize = 0;
            for record in &matched {
                let key = record.key();
                let changes = hooks.before_update(modifier.clone())?;

                let Some(current) = txn.get(D::NAME, key)? else {
                    tracing::trace!("{} {} vanished before update", D::NAME, key);
                    continue;
                };
                for (field, value) in changes {
                    if current.is_writable(&field) {
                        txn.assign(D::NAME, key, &field, value)?;
                    } else {
                        tracing::trace!("Skipping '{}' on {} {}: not a writable field", field, D::NAME, key);
                    }
                }

                let fresh = txn.get(D::NAME, key)?.unwrap_or(current);
                hooks.stage_after_update(Some(ModelInstance::hydrate(self, &fresh)));
                updated += 1;
            }
            Ok(updated)
        });

        if let Ok(count) = &outcome {
            tracing::info!("Updated {} {} records", count, D::NAME);
        }
        Ok(Some(settle(Operation::Update, outcome, hooks, self.scheduler())))
    }

    /// Delete every matching record in one transaction. Resolves to the
    /// number of records deleted.
    pub fn remove(&self, filter: &Value) -> ModelResult<Pending<usize>> {
        let store = self.store(Operation::Remove)?;
        let query = self.compile(filter, &FindOptions::default())?;
        let matched = match store.query(&query) {
            Ok(records) => records,
            Err(e) => return Ok(Pending::rejected(e)),
        };

        let mut hooks = HookDispatch::new(self.definition_arc());
        let outcome = write(store.as_ref(), D::NAME, Operation::Remove, |txn| {
            let mut removed: usize = 0;
            for record in &matched {
                let instance = ModelInstance::hydrate(self, record);
                hooks.before_remove(Some(&instance))?;
                if txn.delete(D::NAME, record.key())? {
                    hooks.stage_after_remove();
                    removed += 1;
                }
            }
            Ok(removed)
        });

        if let Ok(count) = &outcome {
            tracing::info!("Removed {} {} records", count, D::NAME);
        }
        Ok(settle(Operation::Remove, outcome, hooks, self.scheduler()))
    }

    /// Reserved; only the configuration check is performed
    pub fn upsert(&self, _filter: &Value, _fields: Value) -> ModelResult<Pending<ModelInstance<D>>> {
        self.store(Operation::Upsert)?;
        Err(ModelError::NotImplemented("upsert"))
    }
}

impl<D: ModelDefinition> Clone for Model<D> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<D: ModelDefinition> std::fmt::Debug for Model<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &D::NAME)
            .field("bound", &self.is_bound())
            .field("scheduler", &self.inner.scheduler)
            .finish()
    }
}

/// Write payloads must be JSON objects; `null` counts as empty
pub(crate) fn object_payload(value: Value, operation: Operation) -> ModelResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ModelError::InvalidPayload(format!("{} expects an object, got {}", operation, other))),
    }
}
