use clap::Args;

use crate::cli::utils::{output_query, parse_json_arg};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::filter::{Filter, FindOptions};

const FILTER_HELP: &str = "JSON filter, e.g. '{\"age\": {\">\": 30}}'";

#[derive(Args)]
pub struct CompileArgs {
    #[arg(help = FILTER_HELP)]
    pub filter: String,

    #[arg(long, help = "Collection the query targets", default_value = "Record")]
    pub collection: String,

    #[arg(long, help = "JSON find options (limit, offset, sort)")]
    pub options: Option<String>,
}

pub async fn handle(args: CompileArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let filter = parse_json_arg("filter", &args.filter)?;
    let options = match args.options {
        Some(raw) => FindOptions::from_json_str(&raw)?,
        None => FindOptions::default(),
    };

    let mut builder = Filter::new(args.collection, &config().filter)?;
    builder.where_clause(&filter)?.assign(&options)?;
    let query = builder.to_query()?;

    tracing::debug!("Compiled {} into {:?}", args.filter, query.predicate);
    output_query(&output_format, &query)
}
