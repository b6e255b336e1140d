use anyhow::{anyhow, Context};
use clap::Args;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::utils::{output_records, parse_json_arg};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::{MemoryStore, ObjectStore};
use crate::filter::{Filter, FindOptions};

#[derive(Args)]
pub struct FindArgs {
    #[arg(long, help = "JSON fixture file: {\"Collection\": [records...]}")]
    pub fixture: PathBuf,

    #[arg(long, help = "Collection to query")]
    pub collection: String,

    #[arg(long, help = "JSON filter")]
    pub filter: Option<String>,

    #[arg(long, help = "JSON find options (limit, offset, sort)")]
    pub options: Option<String>,
}

/// Load every collection of a fixture file into a fresh in-memory store
pub fn load_fixture(path: &Path) -> anyhow::Result<MemoryStore> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read fixture {}", path.display()))?;
    let fixture: Map<String, Value> =
        serde_json::from_str(&raw).with_context(|| format!("Fixture {} is not a JSON object", path.display()))?;

    let store = MemoryStore::new();
    for (collection, rows) in fixture {
        let rows = match rows {
            Value::Array(rows) => rows,
            _ => return Err(anyhow!("Fixture collection '{}' must be an array of records", collection)),
        };

        let records = rows
            .into_iter()
            .map(|row| match row {
                Value::Object(record) => Ok(record),
                other => Err(anyhow!("Fixture record in '{}' is not an object: {}", collection, other)),
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let keys = store.seed(&collection, records)?;
        tracing::info!("Loaded {} {} records from fixture", keys.len(), collection);
    }

    Ok(store)
}

pub async fn handle(args: FindArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = load_fixture(&args.fixture)?;

    let filter = match args.filter {
        Some(ref raw) => parse_json_arg("filter", raw)?,
        None => Value::Null,
    };
    let options = match args.options {
        Some(ref raw) => FindOptions::from_json_str(raw)?,
        None => FindOptions::default(),
    };

    let mut builder = Filter::new(args.collection.clone(), &config().filter)?;
    builder.where_clause(&filter)?.assign(&options)?;
    let query = builder.to_query()?;

    let records = store.query(&query)?;
    let records = records.iter().map(|record| record.to_json()).collect();
    output_records(&output_format, &args.collection, records)
}
