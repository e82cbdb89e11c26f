use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use schemamap::{
    MappingBatch, MappingStore, SearchOptions, build_schema_tree, build_value_tree,
    coverage_report, mapping_batch_schema, reconcile, search,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "schemamap",
    about = "Inspect JSON Schema trees and reconcile spreadsheet field mappings"
)]
struct Cli {
    /// Log debug events from the library to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tree compiled from a schema document.
    Tree(TreeArgs),
    /// Search a schema tree by path, description and rules.
    Search(SearchArgs),
    /// Annotate a schema tree with a mapping batch.
    Reconcile(ReconcileArgs),
    /// Print the JSON Schema of the mapping batch format.
    MappingSchema,
}

#[derive(Parser, Debug)]
struct TreeArgs {
    /// JSON Schema document (or plain JSON with --values).
    input: PathBuf,

    /// Treat the input as plain data instead of a schema.
    #[arg(long)]
    values: bool,
}

#[derive(Parser, Debug)]
struct SearchArgs {
    /// JSON Schema document.
    schema: PathBuf,

    /// Case-insensitive query.
    query: String,

    /// Maximum number of results.
    #[arg(long)]
    limit: Option<usize>,

    /// Separator placed between node names in result paths.
    #[arg(long)]
    separator: Option<String>,
}

#[derive(Parser, Debug)]
struct ReconcileArgs {
    /// JSON Schema document.
    schema: PathBuf,

    /// Mapping batch (`.json`, `.yaml` or `.yml`).
    mappings: PathBuf,

    /// Print a coverage report instead of the annotated tree.
    #[arg(long)]
    coverage: bool,

    /// Fail when a required leaf is left unmapped.
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Tree(args) => run_tree(args),
        Command::Search(args) => run_search(args),
        Command::Reconcile(args) => run_reconcile(args),
        Command::MappingSchema => print_json(&mapping_batch_schema()?),
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "schemamap=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_tree(args: TreeArgs) -> Result<()> {
    let input = read_json(&args.input)?;
    let tree = if args.values {
        build_value_tree(&input)
    } else {
        build_schema_tree(&input)
    };
    print_json(&tree)
}

fn run_search(args: SearchArgs) -> Result<()> {
    let schema = read_json(&args.schema)?;
    let mut options = SearchOptions::default();
    if let Some(limit) = args.limit {
        options.max_results = limit;
    }
    if let Some(separator) = args.separator {
        options.path_separator = separator;
    }
    let entries = search::flatten_with(&build_schema_tree(&schema), &options);
    print_json(&search::search_with(&entries, &args.query, &options))
}

fn run_reconcile(args: ReconcileArgs) -> Result<()> {
    let schema = read_json(&args.schema)?;
    let batch = read_batch(&args.mappings)?;

    let mut store = MappingStore::new();
    store.import(batch)?;
    let tree = reconcile(&build_schema_tree(&schema), store.mappings());
    let report = coverage_report(&tree);

    if args.coverage {
        print_json(&report)?;
    } else {
        print_json(&tree)?;
    }

    if args.strict && !report.is_complete() {
        bail!(
            "{} required field(s) unmapped: {}",
            report.unmapped_required.len(),
            report.unmapped_required.join(", ")
        );
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<JsonValue> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn read_batch(path: &Path) -> Result<MappingBatch> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    let batch = if is_yaml {
        MappingBatch::from_yaml_str(&text)
    } else {
        MappingBatch::from_json_str(&text)
    };
    batch.with_context(|| format!("failed to load mappings from {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
