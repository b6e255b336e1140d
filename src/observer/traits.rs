use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::model::ModelInstance;
use crate::observer::error::HookError;
use crate::types::Operation;

/// The six lifecycle points a model can hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    BeforeInsert,
    BeforeUpdate,
    BeforeRemove,
    AfterInsert,
    AfterUpdate,
    AfterRemove,
}

impl HookPoint {
    /// Before-hooks run inline inside the transaction
    pub fn is_before(&self) -> bool {
        matches!(self, HookPoint::BeforeInsert | HookPoint::BeforeUpdate | HookPoint::BeforeRemove)
    }

    /// After-hooks are queued and run once the transaction has committed
    pub fn is_after(&self) -> bool {
        !self.is_before()
    }

    pub fn operation(&self) -> Operation {
        match self {
            HookPoint::BeforeInsert | HookPoint::AfterInsert => Operation::Insert,
            HookPoint::BeforeUpdate | HookPoint::AfterUpdate => Operation::Update,
            HookPoint::BeforeRemove | HookPoint::AfterRemove => Operation::Remove,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::BeforeInsert => "before_insert",
            HookPoint::BeforeUpdate => "before_update",
            HookPoint::BeforeRemove => "before_remove",
            HookPoint::AfterInsert => "after_insert",
            HookPoint::AfterUpdate => "after_update",
            HookPoint::AfterRemove => "after_remove",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model type: its collection name plus its lifecycle hooks.
///
/// Every hook defaults to pass-through. Before-hooks are synchronous and run
/// inside the write transaction; returning `Err` aborts it. After-hooks are
/// async, run from the `HookScheduler` after commit, and their errors never
/// reach the caller of the write.
///
/// Payload shapes depend on the call site: static `remove` hands each record to
/// `before_remove`, instance `remove` hands it nothing, and `after_remove`
/// never receives the deleted record.
#[async_trait]
pub trait ModelDefinition: Send + Sync + Sized + 'static {
    /// Collection name in the object store
    const NAME: &'static str;

    /// Replaces the insert payload with its return value
    fn before_insert(&self, fields: Map<String, Value>) -> Result<Map<String, Value>, HookError> {
        Ok(fields)
    }

    /// Replaces the update modifier with its return value. Called once per
    /// matched record, each time with the caller's original modifier.
    fn before_update(&self, modifier: Map<String, Value>) -> Result<Map<String, Value>, HookError> {
        Ok(modifier)
    }

    /// `Some(record)` from static `remove`, `None` from `ModelInstance::remove`
    fn before_remove(&self, _record: Option<&ModelInstance<Self>>) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_insert(&self, _record: ModelInstance<Self>) -> Result<(), HookError> {
        Ok(())
    }

    /// `Some(record)` from static `update`, `None` from `ModelInstance::update`
    async fn after_update(&self, _record: Option<ModelInstance<Self>>) -> Result<(), HookError> {
        Ok(())
    }

    async fn after_remove(&self) -> Result<(), HookError> {
        Ok(())
    }
}
