mod registry;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use fixturegen_core::{
    Error as CoreError, SchemaDescriptor, load_schema_path, redact_connection_string,
    schema_json_schema,
};
use fixturegen_generate::{
    CancelFlag, CsvSink, GeneratedValue, GenerationError, Generator, PersistenceSink,
    PopulationRequest, Populator,
};
use fixturegen_postgres::{PgSchemaSource, PgSink, SchemaSource, SourceOptions};
use registry::{RunContext, RunOptions, init_logging, start_run, write_json_atomic, write_report};
use settings::{Settings, SettingsError, load_settings};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
}

#[derive(Parser, Debug)]
#[command(name = "fixturegen", version, about = "Generate fixture rows for relational schemas")]
struct Cli {
    /// Settings file; missing files fall back to defaults.
    #[arg(long, global = true, default_value = "fixturegen.toml")]
    settings: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the population order of the schema.
    Plan(SourceArgs),
    /// Generate and persist fixture rows.
    Populate(PopulateArgs),
    /// Create the described tables on PostgreSQL.
    CreateTables(SourceArgs),
    /// Drop the described tables on PostgreSQL.
    DropTables(DropArgs),
    /// Print the JSON Schema of schema description files.
    JsonSchema(JsonSchemaArgs),
}

#[derive(Args, Debug, Clone)]
struct SourceArgs {
    /// Schema description file (JSON or TOML).
    #[arg(long, value_name = "PATH")]
    schema: Option<PathBuf>,
    /// PostgreSQL connection string.
    #[arg(long, value_name = "CONNECTION_STRING", env = "DATABASE_URL", hide_env_values = true)]
    conn: Option<String>,
    /// PostgreSQL namespace to read and write.
    #[arg(long, value_name = "NAME")]
    db_schema: Option<String>,
}

#[derive(Args, Debug)]
struct PopulateArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Write CSV files to this directory instead of inserting into PostgreSQL.
    #[arg(long, value_name = "DIR")]
    csv: Option<PathBuf>,
    /// Row count for a table, as `table=N`.
    #[arg(long = "rows", value_name = "TABLE=N", value_parser = parse_row_count)]
    rows: Vec<(String, i64)>,
    /// Constant value for a column, as `table.column=value`.
    #[arg(long = "fixed", value_name = "TABLE.COLUMN=VALUE", value_parser = parse_fixed)]
    fixed: Vec<FixedValue>,
    /// Seed for every random draw.
    #[arg(long)]
    seed: Option<u64>,
    /// Output directory for run artifacts.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
}

#[derive(Args, Debug)]
struct DropArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Confirm dropping the tables.
    #[arg(long, default_value_t = false)]
    yes: bool,
}

#[derive(Args, Debug)]
struct JsonSchemaArgs {
    /// Write the JSON Schema here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
struct FixedValue {
    table: String,
    column: String,
    value: GeneratedValue,
    raw: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = load_settings(&cli.settings)?;

    match cli.command {
        Command::Plan(args) => {
            init_logging(None)?;
            run_plan(&settings, args).await
        }
        Command::Populate(args) => run_populate(&settings, args).await,
        Command::CreateTables(args) => {
            init_logging(None)?;
            run_create_tables(&settings, args).await
        }
        Command::DropTables(args) => {
            init_logging(None)?;
            run_drop_tables(&settings, args).await
        }
        Command::JsonSchema(args) => run_json_schema(args),
    }
}

async fn run_plan(settings: &Settings, args: SourceArgs) -> Result<(), CliError> {
    let pool = connect_optional(settings, &args).await?;
    let schema = load_schema(settings, &args, pool.as_ref()).await?;
    let populator = Populator::new(settings.populate_options(None));
    let plan = populator.plan(&schema)?;
    for (position, table) in plan.tables().iter().enumerate() {
        println!("{:>3}. {}", position + 1, table.name);
    }
    Ok(())
}

async fn run_populate(settings: &Settings, args: PopulateArgs) -> Result<(), CliError> {
    let PopulateArgs {
        source,
        csv,
        rows,
        fixed,
        seed,
        run_dir,
    } = args;

    let options = settings.populate_options(seed);
    let conn = connection_string(settings, &source);
    let mut counts = settings.rows.clone();
    counts.extend(rows);

    let run_ctx = RunContext {
        run_id: Uuid::new_v4().to_string(),
        started_at: chrono::Utc::now(),
        run_dir,
        options: RunOptions {
            seed: options.seed,
            schema_path: source.schema.clone(),
            sink: if csv.is_some() { "csv" } else { "postgres" }.to_string(),
            rows: counts.clone(),
            fixed: fixed.iter().map(|value| value.raw.clone()).collect(),
            default_rows_min: options.default_rows_min,
            default_rows_max: options.default_rows_max,
            generator: options.generator.clone(),
        },
        connection: conn.as_deref().map(redact_connection_string),
    };
    let run_paths = start_run(&run_ctx)?;
    init_logging(Some(&run_paths.logs_path))?;
    info!(run_id = %run_ctx.run_id, run_dir = %run_paths.root.display(), "run started");

    let pool = if csv.is_some() && source.schema.is_some() {
        None
    } else {
        Some(connect(settings, &source).await?)
    };
    let schema = load_schema(settings, &source, pool.as_ref()).await?;

    let mut request = PopulationRequest::new();
    for (table, count) in counts {
        request = request.rows(table, count);
    }
    for (table, column, value) in settings.fixed_values()? {
        request = request.override_column(table, column, Generator::constant(value));
    }
    for value in fixed {
        request = request.override_column(value.table, value.column, Generator::constant(value.value));
    }

    let mut sink: Box<dyn PersistenceSink> = match (csv, pool) {
        (Some(dir), _) => Box::new(CsvSink::new(dir)),
        (None, Some(pool)) => Box::new(PgSink::new(pool).with_schema(db_schema(settings, &source))),
        (None, None) => {
            return Err(CliError::InvalidConfig(
                "either --csv or a connection string is required".to_string(),
            ));
        }
    };

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling after the current table");
            on_interrupt.cancel();
        }
    });

    let populator = Populator::new(options).with_run_id(run_ctx.run_id.clone());
    let report = populator
        .run_with_cancel(&schema, &request, sink.as_mut(), &cancel)
        .await?;
    write_report(&run_paths, &report)?;

    for table in &report.tables {
        println!("{:<32} {:>8} rows", table.table, table.rows_inserted);
    }
    info!(
        run_id = %run_ctx.run_id,
        rows_total = report.rows_total,
        report = %run_paths.report_path.display(),
        "run finished"
    );
    Ok(())
}

async fn run_create_tables(settings: &Settings, args: SourceArgs) -> Result<(), CliError> {
    let pool = connect(settings, &args).await?;
    let schema = load_schema(settings, &args, Some(&pool)).await?;
    let plan = Populator::new(settings.populate_options(None)).plan(&schema)?;
    let db_schema = db_schema(settings, &args);
    let created = fixturegen_postgres::create_tables(&pool, Some(&db_schema), &plan).await?;
    println!("created {created} tables");
    Ok(())
}

async fn run_drop_tables(settings: &Settings, args: DropArgs) -> Result<(), CliError> {
    if !args.yes {
        return Err(CliError::InvalidConfig(
            "drop-tables removes data; pass --yes to confirm".to_string(),
        ));
    }
    let pool = connect(settings, &args.source).await?;
    let schema = load_schema(settings, &args.source, Some(&pool)).await?;
    let plan = Populator::new(settings.populate_options(None)).plan(&schema)?;
    let db_schema = db_schema(settings, &args.source);
    let dropped = fixturegen_postgres::drop_tables(&pool, Some(&db_schema), &plan).await?;
    println!("dropped {dropped} tables");
    Ok(())
}

fn run_json_schema(args: JsonSchemaArgs) -> Result<(), CliError> {
    let schema = schema_json_schema()?;
    match args.out {
        Some(path) => write_json_atomic(&path, &schema)?,
        None => println!(
            "{}",
            serde_json::to_string_pretty(&schema).map_err(CoreError::from)?
        ),
    }
    Ok(())
}

fn connection_string(settings: &Settings, args: &SourceArgs) -> Option<String> {
    args.conn.clone().or_else(|| settings.database_url.clone())
}

fn db_schema(settings: &Settings, args: &SourceArgs) -> String {
    args.db_schema
        .clone()
        .unwrap_or_else(|| settings.db_schema.clone())
}

async fn connect(settings: &Settings, args: &SourceArgs) -> Result<PgPool, CliError> {
    let conn = connection_string(settings, args).ok_or_else(|| {
        CliError::InvalidConfig("a connection string is required (--conn or DATABASE_URL)".to_string())
    })?;
    let engine = detect_engine(&conn)?;
    info!(engine, "connecting");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&conn)
        .await?;
    Ok(pool)
}

async fn connect_optional(settings: &Settings, args: &SourceArgs) -> Result<Option<PgPool>, CliError> {
    if args.schema.is_some() {
        return Ok(None);
    }
    connect(settings, args).await.map(Some)
}

/// Schema from the description file when given, otherwise from the catalog.
async fn load_schema(
    settings: &Settings,
    args: &SourceArgs,
    pool: Option<&PgPool>,
) -> Result<SchemaDescriptor, CliError> {
    if let Some(path) = &args.schema {
        return load_schema_file(path);
    }
    let pool = pool.ok_or_else(|| {
        CliError::InvalidConfig("either --schema or a connection string is required".to_string())
    })?;
    let source = PgSchemaSource::new(pool.clone());
    let options = SourceOptions {
        schema: db_schema(settings, args),
        tables: None,
    };
    Ok(source.load_schema(&options).await?)
}

fn load_schema_file(path: &Path) -> Result<SchemaDescriptor, CliError> {
    let schema = load_schema_path(path)?;
    info!(path = %path.display(), tables = schema.tables.len(), "schema file loaded");
    Ok(schema)
}

fn detect_engine(conn: &str) -> Result<&'static str, CliError> {
    if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(CliError::UnsupportedEngine(redact_connection_string(conn).redacted))
    }
}

fn parse_row_count(raw: &str) -> Result<(String, i64), String> {
    let (table, count) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TABLE=N, got '{raw}'"))?;
    let table = table.trim();
    if table.is_empty() {
        return Err(format!("missing table name in '{raw}'"));
    }
    let count: i64 = count
        .trim()
        .parse()
        .map_err(|_| format!("invalid row count in '{raw}'"))?;
    if count < 0 {
        return Err(format!("row count must not be negative in '{raw}'"));
    }
    Ok((table.to_string(), count))
}

fn parse_fixed(raw: &str) -> Result<FixedValue, String> {
    let (target, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TABLE.COLUMN=VALUE, got '{raw}'"))?;
    let (table, column) = target
        .split_once('.')
        .filter(|(table, column)| !table.is_empty() && !column.is_empty())
        .ok_or_else(|| format!("expected TABLE.COLUMN before '=', got '{target}'"))?;

    let value = if let Ok(number) = value.parse::<i64>() {
        GeneratedValue::Int(number)
    } else if let Ok(flag) = value.parse::<bool>() {
        GeneratedValue::Bool(flag)
    } else {
        GeneratedValue::Text(value.to_string())
    };

    Ok(FixedValue {
        table: table.to_string(),
        column: column.to_string(),
        value,
        raw: raw.to_string(),
    })
}
