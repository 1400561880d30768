//! Command runner behind the `dbq` binary.
//!
//! Loads the `--source` data file into the selected in-memory store, builds
//! the query from the command-line options and runs one retrieval.

pub mod report;

use log::info;

use crate::backend::memory::{read_jsonl_documents, MemoryKeyValueStore, MemorySearchStore};
use crate::backend::{Collection, KeyValueSource, RecordSource, SearchSource};
use crate::config::{parse_conditions, BackendKind, Command, OutputArgs, QueryArgs};
use crate::engine::{GetOptions, KeySource, Objects, Retrieval, ScanOptions};
use crate::error_handling::{ConfigurationError, DbqError};
use crate::export::SinkConfig;

// Re-export public API
pub use report::print_outcome;

/// Result of one command.
#[derive(Debug)]
pub enum Outcome {
    /// Records from `get` or `scan`, or a summary of what was exported
    Records(Retrieval),
    /// Result of `count`
    Count(u64),
}

/// Runs one CLI command.
///
/// # Errors
///
/// Any configuration, backend or file error raised while loading the data
/// file, building the query or retrieving.
pub async fn run(command: Command) -> Result<Outcome, DbqError> {
    let source = &command.query().source;
    let documents = read_jsonl_documents(&source.source, &source.key_field)?;
    info!(
        "Loaded {} records from {}",
        documents.len(),
        source.source.display()
    );

    match source.backend {
        BackendKind::Kv => {
            let collection = Collection::new(&source.namespace, &source.set);
            let store = MemoryKeyValueStore::new(collection.clone()).with_records(documents);
            execute(Objects::new(KeyValueSource::new(store, collection)), command).await
        }
        BackendKind::Search => {
            let index = source.set.clone();
            let store = MemorySearchStore::new(&index).with_documents(documents);
            execute(Objects::new(SearchSource::new(store, index)), command).await
        }
    }
}

async fn execute<S: RecordSource>(
    mut objects: Objects<S>,
    command: Command,
) -> Result<Outcome, DbqError> {
    build_query(&mut objects, command.query())?;

    match command {
        Command::Get(args) => {
            let keys = KeySource::from_options(args.pks, args.pk_file)?;
            let mut options = GetOptions::new(keys)
                .with_batch_size(args.batch_size)
                .with_workers(args.workers);
            if let Some(sink) = sink_config(&args.output)? {
                options = options.with_sink(sink);
            }
            Ok(Outcome::Records(objects.get(options).await?))
        }
        Command::Scan(args) => {
            let mut options = ScanOptions::new(args.limits());
            if let Some(sink) = sink_config(&args.output)? {
                options = options.with_sink(sink);
            }
            Ok(Outcome::Records(objects.scan(options).await?))
        }
        Command::Count(_) => Ok(Outcome::Count(objects.count().await?)),
    }
}

/// Applies the filter, select and sort options to the builder.
pub fn build_query<S: RecordSource>(
    objects: &mut Objects<S>,
    args: &QueryArgs,
) -> Result<(), ConfigurationError> {
    objects.filter(parse_conditions(&args.filters)?);
    objects.exclude(parse_conditions(&args.exclusions)?);
    if !args.alternatives.is_empty() {
        objects.should(parse_conditions(&args.alternatives)?)?;
    }
    if !args.select.is_empty() {
        objects.select(&args.select);
    }
    if !args.sort.is_empty() {
        objects.sort(&args.sort)?;
    }
    Ok(())
}

fn sink_config(output: &OutputArgs) -> Result<Option<SinkConfig>, ConfigurationError> {
    output
        .save_file
        .as_deref()
        .map(|path| SinkConfig::parse(path, &output.save_format))
        .transpose()
}
