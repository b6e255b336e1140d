mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map};

use common::{manual_config, people, person_model, seeded_store, Person};
use realm_model_rust::config::{AppConfig, DispatchMode};
use realm_model_rust::database::MemoryStore;
use realm_model_rust::observer::{FlushReport, HookError, HookScheduler, ModelDefinition};
use realm_model_rust::{FindOptions, HookPoint, Model, ModelError, ModelInstance};

/// Records how many rows the store held when each after-insert ran
struct Audit {
    store: Arc<MemoryStore>,
    seen: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl ModelDefinition for Audit {
    const NAME: &'static str = "Audit";

    async fn after_insert(&self, _record: ModelInstance<Self>) -> Result<(), HookError> {
        let count = self.store.count(Self::NAME).map_err(anyhow::Error::from)?;
        self.seen.lock().unwrap().push(count);
        Ok(())
    }
}

#[tokio::test]
async fn after_hooks_wait_for_flush() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let model = person_model(Person::default(), &store);
    let log = model.definition().log.clone();

    let created = model.insert(json!({ "name": "a" }))?.await?;
    assert_eq!(created.get("name"), Some(json!("a")));
    assert_eq!(log.events(), vec!["before_insert"]);
    assert_eq!(model.scheduler().pending(), 1);

    let report = model.scheduler().flush().await;
    assert_eq!(report, FlushReport { executed: 1, failed: 0 });
    assert_eq!(log.events(), vec!["before_insert", "after_insert:a"]);
    Ok(())
}

#[tokio::test]
async fn after_hooks_see_committed_state() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let audit = Model::builder(Audit { store: store.clone(), seen: seen.clone() })
        .store(store.clone())
        .config(manual_config())
        .build();

    audit.insert(json!({ "action": "login" }))?.await?;
    audit.scheduler().flush().await;
    audit.insert(json!({ "action": "logout" }))?.await?;
    audit.scheduler().flush().await;

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn before_insert_can_transform_the_payload() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut defaults = Map::new();
    defaults.insert("role".to_string(), json!("member"));
    let model = person_model(Person { insert_defaults: defaults, ..Person::default() }, &store);

    let created = model.insert(json!({ "name": "a" }))?.await?;
    assert_eq!(created.get("role"), Some(json!("member")));
    Ok(())
}

#[tokio::test]
async fn failing_before_insert_leaves_store_untouched() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let model = person_model(Person { reject_insert: true, ..Person::default() }, &store);

    let err = model.insert(json!({ "name": "a" }))?.await.unwrap_err();
    assert!(
        matches!(err, ModelError::Hook { hook: HookPoint::BeforeInsert, model: "Person", .. }),
        "got {:?}",
        err
    );
    assert_eq!(store.count("Person")?, 0);
    assert_eq!(model.scheduler().pending(), 0);
    Ok(())
}

#[tokio::test]
async fn failing_before_update_rolls_back_every_record() -> Result<()> {
    let store = seeded_store(people())?;
    let model = person_model(Person { reject_update_after: Some(1), ..Person::default() }, &store);

    let err = model
        .update(&json!({ "name": "a" }), json!({ "age": 100 }))?
        .expect("pending")
        .await
        .unwrap_err();
    assert!(err.is_hook(), "got {:?}", err);

    // The first record passed its hook but the transaction still aborted
    let untouched = model.find(&json!({ "age": 100 }), &FindOptions::default())?;
    assert!(untouched.is_empty());
    assert_eq!(model.definition().log.count("before_update"), 2);
    assert_eq!(model.scheduler().pending(), 0);
    Ok(())
}

#[tokio::test]
async fn failing_before_remove_deletes_nothing() -> Result<()> {
    let store = seeded_store(people())?;
    let model = person_model(Person { reject_remove: true, ..Person::default() }, &store);

    let err = model.remove(&json!({}))?.await.unwrap_err();
    assert!(matches!(err, ModelError::Hook { hook: HookPoint::BeforeRemove, .. }), "got {:?}", err);
    assert_eq!(store.count("Person")?, 4);

    let record = model.find_one(&json!({ "id": "p1" }))?.expect("p1");
    assert!(record.remove()?.await.is_err());
    assert_eq!(store.count("Person")?, 4);
    Ok(())
}

#[tokio::test]
async fn after_hook_errors_never_reach_the_caller() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let model = person_model(Person { fail_after_hooks: true, ..Person::default() }, &store);

    let created = model.insert(json!({ "name": "a" }))?.await?;
    created.update(json!({ "name": "b" }))?.await?;
    created.remove()?.await?;

    let report = model.scheduler().flush().await;
    assert_eq!(report, FlushReport { executed: 3, failed: 3 });
    assert_eq!(store.count("Person")?, 0);
    Ok(())
}

#[tokio::test]
async fn spawn_mode_runs_after_hooks_in_background() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut config = AppConfig::default();
    config.hooks.dispatch = DispatchMode::Spawn;
    let model = Model::builder(Person::default()).store(store.clone()).config(config).build();
    let log = model.definition().log.clone();

    model.insert(json!({ "name": "a" }))?.await?;

    for _ in 0..50 {
        if log.count("after_insert") == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(log.events(), vec!["before_insert", "after_insert:a"]);
    Ok(())
}

#[tokio::test]
async fn one_scheduler_can_serve_several_models() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let scheduler = HookScheduler::new(DispatchMode::Manual);
    let people_model = Model::builder(Person::default())
        .store(store.clone())
        .scheduler(scheduler.clone())
        .build();
    let audit = Model::builder(Audit { store: store.clone(), seen: Arc::new(Mutex::new(Vec::new())) })
        .store(store.clone())
        .scheduler(scheduler.clone())
        .build();

    people_model.insert(json!({ "name": "a" }))?.await?;
    audit.insert(json!({ "action": "created a" }))?.await?;
    assert_eq!(scheduler.pending(), 2);

    let report = scheduler.flush().await;
    assert_eq!(report.executed, 2);
    assert_eq!(people_model.definition().log.count("after_insert"), 1);
    assert_eq!(*audit.definition().seen.lock().unwrap(), vec![1]);
    Ok(())
}

#[tokio::test]
async fn update_hooks_receive_the_updated_record() -> Result<()> {
    let store = seeded_store(vec![json!({ "name": "a", "age": 1 })])?;
    let model = person_model(Person::default(), &store);

    model.update(&json!({ "name": "a" }), json!({ "name": "z" }))?.expect("pending").await?;
    model.scheduler().flush().await;

    let events = model.definition().log.events();
    assert_eq!(events, vec![r#"before_update:{"name":"z"}"#.to_string(), "after_update:z".to_string()]);
    Ok(())
}
