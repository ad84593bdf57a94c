//! flatbed: flatten nested JSON or XML into a table
//!
//! Usage:
//!   # JSON document (array, single object or NDJSON), rows as JSON Lines
//!   flatbed data.json
//!
//!   # XML, one record per <record> element, shown as a table
//!   flatbed --format xml --row-tag record data.xml --output table
//!
//!   # Keep rows whose lists are empty, print both schemas first
//!   flatbed data.json --empty-lists null --print-schema

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use flatbed::flatten::{EmptyListPolicy, FlattenConfig, SchemaFlattener};
use flatbed::ingest::{self, Format, IngestOptions};
use flatbed::output::{render_table, JsonLinesWriter};
use log::{debug, info};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputMode {
    /// One JSON object per row
    Jsonl,
    /// Boxed text table
    Table,
}

#[derive(Parser, Debug)]
#[command(name = "flatbed")]
#[command(about = "Flatten nested JSON or XML records into scalar columns", long_about = None)]
struct Args {
    /// Input file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Input format: json or xml
    #[arg(long, short = 'f', default_value = "json")]
    format: Format,

    /// Element that marks one record (required for XML)
    #[arg(long)]
    row_tag: Option<String>,

    /// Separator between parent and child column names (default: "_")
    #[arg(long)]
    separator: Option<String>,

    /// What to do with rows whose list is empty: drop or null (default: drop)
    #[arg(long)]
    empty_lists: Option<EmptyListPolicy>,

    /// Maximum nesting depth (default: 64)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Output mode
    #[arg(long, short = 'o', value_enum, default_value_t = OutputMode::Jsonl)]
    output: OutputMode,

    /// Only print the first N rows
    #[arg(long)]
    limit: Option<usize>,

    /// Print the nested and flattened schemas before the rows
    #[arg(long)]
    print_schema: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    // Build config
    let mut config = FlattenConfig::default();
    if let Some(sep) = args.separator {
        config.separator = sep;
    }
    if let Some(policy) = args.empty_lists {
        config.empty_lists = policy;
    }
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    debug!("flatten config: {:?}", config);

    let options = IngestOptions {
        format: args.format,
        row_tag: args.row_tag,
    };
    let document = ingest::load_path(&args.input, &options)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let flattener = SchemaFlattener::new(&document.schema, config).context("Failed to plan flattening")?;
    info!(
        "{} input fields flatten to {} columns in {} steps",
        document.schema.fields().len(),
        flattener.flat_schema().len(),
        flattener.plan().steps.len()
    );
    if flattener.plan().is_noop() {
        info!("schema is already flat; records pass through unchanged");
    }

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if args.print_schema {
        writeln!(out, "{}", document.schema.tree_string())?;
        writeln!(out, "{}", flattener.flat_schema().to_schema().tree_string())?;
    }

    let rows = flattener
        .flatten_par(document.records)
        .context("Failed to flatten records")?;
    info!("produced {} flat rows", rows.len());

    match args.output {
        OutputMode::Table => {
            write!(out, "{}", render_table(flattener.flat_schema(), &rows, Some(args.limit.unwrap_or(20))))?;
            out.flush()?;
        }
        OutputMode::Jsonl => {
            let shown = args.limit.map_or(rows.len(), |n| n.min(rows.len()));
            let mut writer = JsonLinesWriter::new(out);
            writer.write_rows(&rows[..shown]).context("Failed to write rows")?;
            writer.flush()?;
        }
    }

    Ok(())
}
