// Hook dispatch for a single write
//
// Before-hooks run inline and their errors abort the write. After-hooks are
// staged here and only handed to the scheduler once the transaction commits;
// dropping an unreleased dispatch discards them.

use futures::FutureExt;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::ModelError;
use crate::model::ModelInstance;
use crate::observer::error::HookError;
use crate::observer::scheduler::{HookScheduler, ScheduledHook};
use crate::observer::traits::{HookPoint, ModelDefinition};

pub struct HookDispatch<D: ModelDefinition> {
    definition: Arc<D>,
    staged: Vec<ScheduledHook>,
}

impl<D: ModelDefinition> HookDispatch<D> {
    pub fn new(definition: Arc<D>) -> Self {
        Self { definition, staged: Vec::new() }
    }

    pub fn before_insert(&self, fields: Map<String, Value>) -> Result<Map<String, Value>, ModelError> {
        self.definition
            .before_insert(fields)
            .map_err(|e| hook_error::<D>(HookPoint::BeforeInsert, e))
    }

    pub fn before_update(&self, modifier: Map<String, Value>) -> Result<Map<String, Value>, ModelError> {
        self.definition
            .before_update(modifier)
            .map_err(|e| hook_error::<D>(HookPoint::BeforeUpdate, e))
    }

    pub fn before_remove(&self, record: Option<&ModelInstance<D>>) -> Result<(), ModelError> {
        self.definition
            .before_remove(record)
            .map_err(|e| hook_error::<D>(HookPoint::BeforeRemove, e))
    }

    pub fn stage_after_insert(&mut self, record: ModelInstance<D>) {
        let definition = self.definition.clone();
        self.stage(HookPoint::AfterInsert, async move { definition.after_insert(record).await });
    }

    pub fn stage_after_update(&mut self, record: Option<ModelInstance<D>>) {
        let definition = self.definition.clone();
        self.stage(HookPoint::AfterUpdate, async move { definition.after_update(record).await });
    }

    pub fn stage_after_remove(&mut self) {
        let definition = self.definition.clone();
        self.stage(HookPoint::AfterRemove, async move { definition.after_remove().await });
    }

    pub fn staged(&self) -> usize {
        self.staged.len()
    }

    /// Hand the staged after-hooks to the scheduler. Call only after commit.
    pub fn release(self, scheduler: &HookScheduler) {
        if self.staged.is_empty() {
            return;
        }
        tracing::debug!("Releasing {} after-hooks for {}", self.staged.len(), D::NAME);
        scheduler.schedule(self.staged);
        scheduler.release();
    }

    fn stage<F>(&mut self, point: HookPoint, task: F)
    where
        F: std::future::Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.staged.push(ScheduledHook::new(D::NAME, point, task.boxed()));
    }
}

fn hook_error<D: ModelDefinition>(hook: HookPoint, source: HookError) -> ModelError {
    tracing::debug!("{} hook of {} rejected the write: {}", hook, D::NAME, source);
    ModelError::Hook { model: D::NAME, hook, source }
}
