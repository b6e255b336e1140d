#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use realm_model_rust::config::{AppConfig, DispatchMode};
use realm_model_rust::database::MemoryStore;
use realm_model_rust::observer::{HookError, ModelDefinition};
use realm_model_rust::{Model, ModelInstance};

/// Hook calls in the order they happened
#[derive(Clone, Default)]
pub struct HookLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl HookLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

/// Model definition that records every hook call and can be told to fail
#[derive(Default)]
pub struct Person {
    pub log: HookLog,
    pub reject_insert: bool,
    /// Reject `before_update` once this many calls have been let through
    pub reject_update_after: Option<usize>,
    pub reject_remove: bool,
    pub fail_after_hooks: bool,
    /// Merged into every insert payload by `before_insert`
    pub insert_defaults: Map<String, Value>,
    pub update_calls: Mutex<usize>,
    /// Held inside the write transaction by `before_insert`
    pub insert_delay: Option<Duration>,
    pub update_delay: Option<Duration>,
}

fn name_of(record: &ModelInstance<Person>) -> String {
    record.get("name").and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default()
}

#[async_trait]
impl ModelDefinition for Person {
    const NAME: &'static str = "Person";

    fn before_insert(&self, mut fields: Map<String, Value>) -> Result<Map<String, Value>, HookError> {
        self.log.push("before_insert");
        if let Some(delay) = self.insert_delay {
            thread::sleep(delay);
        }
        if self.reject_insert {
            return Err(HookError::rejected("insert vetoed"));
        }
        for (key, value) in &self.insert_defaults {
            fields.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Ok(fields)
    }

    fn before_update(&self, modifier: Map<String, Value>) -> Result<Map<String, Value>, HookError> {
        if let Some(delay) = self.update_delay {
            thread::sleep(delay);
        }
        let mut calls = self.update_calls.lock().unwrap();
        self.log.push(format!("before_update:{}", Value::Object(modifier.clone())));
        if matches!(self.reject_update_after, Some(limit) if *calls >= limit) {
            return Err(HookError::rejected("update vetoed"));
        }
        *calls += 1;
        Ok(modifier)
    }

    fn before_remove(&self, record: Option<&ModelInstance<Self>>) -> Result<(), HookError> {
        match record {
            Some(record) => self.log.push(format!("before_remove:{}", name_of(record))),
            None => self.log.push("before_remove"),
        }
        if self.reject_remove {
            return Err(HookError::rejected("remove vetoed"));
        }
        Ok(())
    }

    async fn after_insert(&self, record: ModelInstance<Self>) -> Result<(), HookError> {
        self.log.push(format!("after_insert:{}", name_of(&record)));
        self.after_result()
    }

    async fn after_update(&self, record: Option<ModelInstance<Self>>) -> Result<(), HookError> {
        match record {
            Some(record) => self.log.push(format!("after_update:{}", name_of(&record))),
            None => self.log.push("after_update"),
        }
        self.after_result()
    }

    async fn after_remove(&self) -> Result<(), HookError> {
        self.log.push("after_remove");
        self.after_result()
    }
}

impl Person {
    fn after_result(&self) -> Result<(), HookError> {
        if self.fail_after_hooks {
            Err(HookError::Other(anyhow::anyhow!("after-hook failure")))
        } else {
            Ok(())
        }
    }
}

/// Config with after-hooks left queued until an explicit flush
pub fn manual_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.hooks.dispatch = DispatchMode::Manual;
    config
}

pub fn person_model(definition: Person, store: &Arc<MemoryStore>) -> Model<Person> {
    Model::builder(definition).store(store.clone()).config(manual_config()).build()
}

/// A store holding the given Person rows
pub fn seeded_store(rows: Vec<Value>) -> Result<Arc<MemoryStore>> {
    let store = Arc::new(MemoryStore::new());
    let rows = rows
        .into_iter()
        .map(|row| match row {
            Value::Object(map) => map,
            other => panic!("fixture row is not an object: {}", other),
        })
        .collect();
    store.seed("Person", rows)?;
    Ok(store)
}

pub fn people() -> Vec<Value> {
    vec![
        json!({ "id": "p1", "name": "a", "age": 1 }),
        json!({ "id": "p2", "name": "b", "age": 2 }),
        json!({ "id": "p3", "age": 3 }),
        json!({ "id": "p4", "name": "a", "age": 4 }),
    ]
}

pub fn names(records: &[ModelInstance<Person>]) -> Vec<String> {
    records.iter().map(name_of).collect()
}

pub fn ages(records: &[ModelInstance<Person>]) -> Vec<i64> {
    records.iter().filter_map(|r| r.get("age").and_then(|v| v.as_i64())).collect()
}
