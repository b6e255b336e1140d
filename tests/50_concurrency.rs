mod common;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use common::{manual_config, people, person_model, seeded_store, Person};
use realm_model_rust::database::{MemoryStore, ObjectStore};
use realm_model_rust::observer::{HookError, ModelDefinition};
use realm_model_rust::{FindOptions, Model, ModelError};

const HOLD: Duration = Duration::from_millis(200);
const STAGGER: Duration = Duration::from_millis(30);

#[test]
fn concurrent_inserts_wait_for_each_other() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let model = person_model(Person { insert_delay: Some(HOLD), ..Person::default() }, &store);

    let started = Instant::now();
    let first = {
        let model = model.clone();
        thread::spawn(move || model.insert(json!({ "name": "first" })).and_then(|p| p.into_result()).map(|_| ()))
    };
    thread::sleep(STAGGER);
    let second = {
        let model = model.clone();
        thread::spawn(move || model.insert(json!({ "name": "second" })).and_then(|p| p.into_result()).map(|_| ()))
    };

    first.join().expect("first writer panicked")?;
    second.join().expect("second writer panicked")?;

    assert!(started.elapsed() >= HOLD * 2, "inserts overlapped: {:?}", started.elapsed());
    assert_eq!(store.count("Person")?, 2);
    assert_eq!(model.definition().log.count("before_insert"), 2);
    Ok(())
}

#[test]
fn later_update_wins_on_the_same_record() -> Result<()> {
    let store = seeded_store(people())?;
    let model = person_model(Person { update_delay: Some(HOLD), ..Person::default() }, &store);

    let first = {
        let model = model.clone();
        thread::spawn(move || -> Result<Option<usize>, ModelError> {
            model.update(&json!({ "id": "p1" }), json!({ "age": 10 }))?.map(|p| p.into_result()).transpose()
        })
    };
    thread::sleep(STAGGER);
    let second = {
        let model = model.clone();
        thread::spawn(move || -> Result<Option<usize>, ModelError> {
            model.update(&json!({ "id": "p1" }), json!({ "age": 20 }))?.map(|p| p.into_result()).transpose()
        })
    };

    assert_eq!(first.join().expect("first writer panicked")?, Some(1));
    assert_eq!(second.join().expect("second writer panicked")?, Some(1));

    let p1 = model.find_one(&json!({ "id": "p1" }))?.expect("p1 still exists");
    assert_eq!(p1.get("age"), Some(json!(20)));
    Ok(())
}

#[test]
fn reads_do_not_wait_for_an_open_write() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let model = person_model(Person { insert_delay: Some(HOLD * 2), ..Person::default() }, &store);

    let writer = {
        let model = model.clone();
        thread::spawn(move || model.insert(json!({ "name": "slow" })).and_then(|p| p.into_result()).map(|_| ()))
    };
    thread::sleep(STAGGER);

    let started = Instant::now();
    let during = model.find(&json!({}), &FindOptions::default())?;
    assert!(started.elapsed() < HOLD, "read blocked for {:?}", started.elapsed());
    assert!(during.is_empty());

    writer.join().expect("writer panicked")?;
    assert_eq!(model.find(&json!({}), &FindOptions::default())?.len(), 1);
    Ok(())
}

/// Opens a second write on the same store from inside its own write
struct Reentrant {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl ModelDefinition for Reentrant {
    const NAME: &'static str = "Person";

    fn before_insert(&self, fields: Map<String, Value>) -> Result<Map<String, Value>, HookError> {
        self.store.begin_write().map_err(|e| HookError::Other(e.into()))?;
        Ok(fields)
    }
}

#[test]
fn nested_write_from_a_hook_fails_instead_of_deadlocking() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let model = Model::builder(Reentrant { store: store.clone() })
        .store(store.clone())
        .config(manual_config())
        .build();

    let err = model.insert(json!({ "name": "a" }))?.into_result().unwrap_err();
    assert!(matches!(err, ModelError::Hook { .. }), "unexpected error: {}", err);
    assert_eq!(store.count("Person")?, 0);

    // The outer transaction was released
    store.seed("Person", vec![Map::new()])?;
    assert_eq!(store.count("Person")?, 1);
    Ok(())
}

/// Panics in `before_insert` the first time it is called
#[derive(Default)]
struct PanicsOnce {
    panicked: AtomicBool,
}

#[async_trait]
impl ModelDefinition for PanicsOnce {
    const NAME: &'static str = "Person";

    fn before_insert(&self, fields: Map<String, Value>) -> Result<Map<String, Value>, HookError> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("before_insert blew up");
        }
        Ok(fields)
    }
}

#[test]
fn panicking_hook_leaves_the_store_writable() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let model = Model::builder(PanicsOnce::default())
        .store(store.clone())
        .config(manual_config())
        .build();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| model.insert(json!({ "name": "a" }))));
    assert!(outcome.is_err());
    assert_eq!(store.count("Person")?, 0);

    let record = model.insert(json!({ "name": "b" }))?.into_result()?;
    assert_eq!(record.get("name"), Some(json!("b")));
    assert_eq!(store.count("Person")?, 1);
    Ok(())
}
