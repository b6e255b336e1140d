use anyhow::Context;
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::filter::{SortDescriptor, StoreQuery};

/// Parse a JSON command-line argument, naming the argument on failure
pub fn parse_json_arg(name: &str, raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--{} is not valid JSON", name))
}

pub fn query_to_json(query: &StoreQuery) -> Value {
    json!({
        "collection": query.collection,
        "predicate": query.predicate,
        "sort": query.sort,
        "range": query.range.map(|(start, end)| json!([start, end])),
    })
}

fn describe_sort(sort: &[SortDescriptor]) -> String {
    sort.iter()
        .map(|s| format!("{} {}", s.field, if s.direction.is_descending() { "DESC" } else { "ASC" }))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Output a compiled query in the appropriate format
pub fn output_query(output_format: &OutputFormat, query: &StoreQuery) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&query_to_json(query))?);
        }
        OutputFormat::Text => {
            println!("{}", query.predicate.as_deref().unwrap_or("TRUEPREDICATE"));
            if !query.sort.is_empty() {
                println!("SORT({})", describe_sort(&query.sort));
            }
            if let Some((start, end)) = query.range {
                println!("RANGE({}, {})", start, end);
            }
        }
    }
    Ok(())
}

/// Output records in the appropriate format
pub fn output_records(output_format: &OutputFormat, collection: &str, records: Vec<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&Value::Array(records))?);
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No {} records matched", collection);
            }
            for record in records {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }
    Ok(())
}
