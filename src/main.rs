//! Binary entry point for hydrofile.
//!
//! Exports project tables to model input files and imports delimited files
//! back into the project database, driven by a table catalog.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use hydrofile::config::CatalogTable;
use hydrofile::io::{DelimitedOptions, write_delimited};
use hydrofile::observability::{self, LoggingConfig};
use hydrofile::{
    Catalog, CodecConfig, ImportOptions, ImportService, OverwritePolicy, RecordQuery, RecordStore,
    SqliteStore, TableWriter,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Hydrofile - fixed-width and delimited codec for model input files.
#[derive(Parser)]
#[command(name = "hydrofile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Project database.
    #[arg(long, global = true, env = "HYDROFILE_DB", default_value = "project.sqlite")]
    db: PathBuf,

    /// Table catalog, overriding the configured one.
    #[arg(long, global = true, env = "HYDROFILE_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Create every catalog table in the project database.
    Init,

    /// List catalog tables with their row counts.
    Tables,

    /// Write tables to fixed-width (or CSV) files.
    Export {
        /// Tables to export; all catalog tables when omitted.
        tables: Vec<String>,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Write comma-separated files instead of fixed-width ones.
        #[arg(long)]
        csv: bool,

        /// Omit the banner line.
        #[arg(long)]
        no_banner: bool,
    },

    /// Read a delimited or fixed-width file into a table.
    Import {
        /// Target table.
        table: String,

        /// Input file.
        file: PathBuf,

        /// What to do with rows whose name already exists.
        #[arg(short, long, default_value = "ignore")]
        policy: OverwritePolicy,

        /// Minimum number of columns per row.
        #[arg(long)]
        expected_columns: Option<usize>,

        /// The first column holds a source id.
        #[arg(long)]
        id_column: bool,

        /// Lowercase the name column.
        #[arg(long)]
        lowercase_names: bool,

        /// Read a whitespace-separated model file instead of a delimited one.
        #[arg(long)]
        fixed_width: bool,

        /// First data line of a fixed-width file.
        #[arg(long, default_value_t = hydrofile::io::DEFAULT_START_LINE)]
        start_line: usize,

        /// Write the source-id to new-id map as JSON.
        #[arg(long)]
        id_map: Option<PathBuf>,

        /// Remap a reference field through an earlier id map (`field=map.json`).
        #[arg(long)]
        replace_ids: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(&config.logging, cli.verbose);
    if let Err(e) = observability::init(&logging) {
        eprintln!("Warning: logging disabled: {e}");
    }

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<CodecConfig> {
    match path {
        Some(path) => CodecConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(CodecConfig::load_default()),
    }
}

fn run(cli: Cli, config: CodecConfig) -> Result<()> {
    let catalog = load_catalog(cli.catalog.as_deref(), &config)?;
    let store = open_store(&cli.db, &catalog)?;

    match cli.command {
        Commands::Init => cmd_init(&cli.db, &catalog),
        Commands::Tables => cmd_tables(store.as_ref(), &catalog),
        Commands::Export {
            tables,
            output,
            csv,
            no_banner,
        } => cmd_export(
            store.as_ref(),
            &catalog,
            config,
            &tables,
            &output,
            csv,
            no_banner,
        ),
        Commands::Import {
            table,
            file,
            policy,
            expected_columns,
            id_column,
            lowercase_names,
            fixed_width,
            start_line,
            id_map,
            replace_ids,
        } => {
            let mut options = ImportOptions::new().with_overwrite(policy);
            if let Some(columns) = expected_columns {
                options = options.with_expected_columns(columns);
            }
            if id_column {
                options = options.with_id_column();
            }
            if lowercase_names {
                options = options.with_lowercase_names();
            }
            if fixed_width {
                options = options.fixed_width(start_line);
            }
            if id_map.is_some() {
                options = options.with_id_map();
            }
            if let Some(spec) = replace_ids {
                let (field, ids) = load_replace_ids(&spec)?;
                options = options.with_replace_ids(field, &ids);
            }
            cmd_import(store, &table, &file, &options, id_map.as_deref())
        },
    }
}

fn load_catalog(path: Option<&Path>, config: &CodecConfig) -> Result<Catalog> {
    let Some(path) = path.or(config.catalog_path.as_deref()) else {
        bail!("no table catalog: pass --catalog or set `catalog` in the config file");
    };
    Catalog::load_from_file(path).with_context(|| format!("loading catalog {}", path.display()))
}

fn open_store(db: &Path, catalog: &Catalog) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(db)?;
    for schema in catalog.schemas() {
        store
            .create_table(schema)
            .with_context(|| format!("registering table '{}'", schema.name))?;
    }
    Ok(Arc::new(store))
}

fn cmd_init(db: &Path, catalog: &Catalog) -> Result<()> {
    println!(
        "Initialized {} with {} tables",
        db.display(),
        catalog.tables.len()
    );
    Ok(())
}

fn cmd_tables(store: &dyn RecordStore, catalog: &Catalog) -> Result<()> {
    for table in &catalog.tables {
        let rows = store.count(&RecordQuery::new(table.schema.name.clone()))?;
        println!(
            "{:<24} {:>8}  {}",
            table.schema.name,
            rows,
            table.file_name()
        );
    }
    Ok(())
}

fn cmd_export(
    store: &dyn RecordStore,
    catalog: &Catalog,
    config: CodecConfig,
    tables: &[String],
    output: &Path,
    csv: bool,
    no_banner: bool,
) -> Result<()> {
    let selected: Vec<&CatalogTable> = if tables.is_empty() {
        catalog.tables.iter().collect()
    } else {
        tables
            .iter()
            .map(|name| catalog.table(name))
            .collect::<hydrofile::Result<_>>()?
    };

    std::fs::create_dir_all(output)
        .with_context(|| format!("creating output directory {}", output.display()))?;

    let atomic = config.atomic_writes;
    let writer = TableWriter::new(config);
    for table in selected {
        let query = table.layout.query(&table.schema);
        let outcome = if csv {
            let path = output.join(format!("{}.csv", table.schema.name));
            let mut options = DelimitedOptions::default();
            options.atomic = atomic;
            write_delimited(store, &query, &path, &options)?
        } else {
            let path = output.join(table.file_name());
            let columns = table.layout.resolve(&table.schema, writer.config(), store)?;
            let mut options = table.layout.write_options();
            if no_banner {
                options = options.without_banner();
            }
            writer.write_table(store, &query, &columns, &path, &options)?
        };

        if outcome.written {
            println!("{}: {} rows", outcome.path.display(), outcome.rows);
        } else {
            println!("{}: skipped (no rows)", outcome.path.display());
        }
    }
    Ok(())
}

fn cmd_import(
    store: Arc<SqliteStore>,
    table: &str,
    file: &Path,
    options: &ImportOptions,
    id_map_path: Option<&Path>,
) -> Result<()> {
    let service = ImportService::new(store);
    let result = service.read_records(file, table, options)?;

    println!(
        "{}: {} rows read, {} inserted, {} replaced, {} renamed, {} ignored",
        file.display(),
        result.processed,
        result.inserted,
        result.replaced,
        result.renamed,
        result.ignored
    );

    if let (Some(path), Some(ids)) = (id_map_path, &result.id_map) {
        let json = serde_json::to_string_pretty(ids)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing id map {}", path.display()))?;
        println!("Id map written to {}", path.display());
    }
    Ok(())
}

fn load_replace_ids(spec: &str) -> Result<(String, BTreeMap<String, i64>)> {
    let Some((field, path)) = spec.split_once('=') else {
        bail!("--replace-ids expects FIELD=MAP.json, got '{spec}'");
    };
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading id map {path}"))?;
    let ids: BTreeMap<String, i64> =
        serde_json::from_str(&contents).with_context(|| format!("parsing id map {path}"))?;
    Ok((field.to_string(), ids))
}
