mod config;
mod registry;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use schemalink_core::{
    Dialect, Error as CoreError, JoinType, QuoteStyle, SNAPSHOT_FORMAT_VERSION, diff, render,
    resolve,
};
use schemalink_introspect::{PostgresSource, discover};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

use config::{ConfigError, SchemalinkConfig};
use registry::{
    RunContext, RunOptions, init_run_logging, init_stderr_logging, read_snapshot, start_run,
    write_discovery,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
}

#[derive(Parser, Debug)]
#[command(name = "schemalink", version, about = "Schema relationship discovery and join synthesis")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a live catalog and write a schema graph snapshot.
    Discover(DiscoverArgs),
    /// Resolve a join over a snapshot and print it as SQL.
    Join(JoinArgs),
    /// Compare two snapshots.
    Diff(DiffArgs),
}

#[derive(Args, Debug)]
struct DiscoverArgs {
    /// Database connection string (flag form).
    #[arg(long, value_name = "CONNECTION_STRING", conflicts_with = "conn_pos")]
    conn: Option<String>,
    /// Database connection string (positional form).
    #[arg(value_name = "CONNECTION_STRING", required_unless_present = "conn")]
    conn_pos: Option<String>,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Optional extra output path for snapshot.json.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Schema name(s) to include.
    #[arg(long, value_name = "SCHEMA")]
    schema: Vec<String>,
    /// Settings file; defaults to ./schemalink.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Skip value sampling regardless of the settings file.
    #[arg(long, default_value_t = false)]
    no_sampling: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QuoteArg {
    None,
    Double,
    Backtick,
    Bracket,
}

impl From<QuoteArg> for QuoteStyle {
    fn from(value: QuoteArg) -> Self {
        match value {
            QuoteArg::None => QuoteStyle::None,
            QuoteArg::Double => QuoteStyle::DoubleQuote,
            QuoteArg::Backtick => QuoteStyle::Backtick,
            QuoteArg::Bracket => QuoteStyle::Bracket,
        }
    }
}

#[derive(Args, Debug)]
struct JoinArgs {
    /// Snapshot produced by `discover`.
    #[arg(long)]
    snapshot: PathBuf,
    /// Tables to join; the first one is the root. Name a table twice for a self-join.
    #[arg(required = true, num_args = 2..)]
    tables: Vec<String>,
    /// Identifier quoting.
    #[arg(long, value_enum, default_value = "double")]
    quote: QuoteArg,
    /// Emit LEFT JOIN instead of JOIN.
    #[arg(long, default_value_t = false)]
    left: bool,
    /// Do not prefix tables with their schema.
    #[arg(long, default_value_t = false)]
    no_schema: bool,
    /// Print the resolved path as JSON instead of SQL.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct DiffArgs {
    old: PathBuf,
    new: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Discover(args) => run_discover(args).await,
        Command::Join(args) => run_join(args),
        Command::Diff(args) => run_diff(args),
    }
}

async fn run_discover(args: DiscoverArgs) -> Result<(), CliError> {
    let DiscoverArgs {
        conn,
        conn_pos,
        run_dir,
        out,
        schema,
        config,
        no_sampling,
    } = args;

    let conn = match (conn, conn_pos) {
        (Some(value), None) => value,
        (None, Some(value)) => value,
        (Some(_), Some(_)) => {
            return Err(CliError::InvalidConfig(
                "use either --conn or positional connection string".to_string(),
            ));
        }
        (None, None) => {
            return Err(CliError::InvalidConfig(
                "connection string is required".to_string(),
            ));
        }
    };
    let engine = detect_engine(&conn)?;

    let (mut settings, config_path) = SchemalinkConfig::load(config.as_deref())?;
    if no_sampling {
        settings.sampling.enabled = false;
    }
    let schemas = (!schema.is_empty()).then_some(schema);

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        engine: engine.to_string(),
        format_version: SNAPSHOT_FORMAT_VERSION.to_string(),
        run_dir,
        out,
        options: RunOptions {
            schemas: schemas.clone(),
            config_path,
            settings: settings.clone(),
        },
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(event = "run_started", run_id = %run_id, engine = %engine);

    let timer = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(settings.sampling.concurrency.max(1) as u32 + 1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&conn)
        .await?;

    let mut source = PostgresSource::new(pool);
    if let Some(schemas) = schemas {
        source = source.with_schemas(schemas);
    }

    let discovery = discover(&source, &settings.discover_options()).await?;
    for warning in &discovery.warnings {
        tracing::warn!(
            event = "discovery_warning",
            code = ?warning.code,
            subject = %warning.subject,
            message = %warning.message
        );
    }

    write_discovery(&run_paths, &discovery, run_ctx.out.as_deref())?;
    tracing::info!(event = "snapshot_written", path = %run_paths.snapshot_path.display());

    println!("{}", serde_json::to_string_pretty(&discovery.stats)?);
    eprintln!("run written to {}", run_paths.root.display());

    let duration_ms = timer.elapsed().as_millis();
    tracing::info!(event = "run_finished", status = "success", duration_ms = duration_ms);

    Ok(())
}

fn run_join(args: JoinArgs) -> Result<(), CliError> {
    init_stderr_logging()?;

    let graph = read_snapshot(&args.snapshot)?;
    let path = resolve(&graph, args.tables.as_slice())?;
    tracing::info!(
        event = "join_resolved",
        version = %graph.version(),
        steps = path.steps.len()
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&path)?);
        return Ok(());
    }

    let dialect = Dialect {
        quote: args.quote.into(),
        join_type: if args.left { JoinType::Left } else { JoinType::Inner },
        qualify_schema: !args.no_schema,
    };
    println!("{}", render(&path, &dialect));
    Ok(())
}

fn run_diff(args: DiffArgs) -> Result<(), CliError> {
    init_stderr_logging()?;

    let old = read_snapshot(&args.old)?;
    let new = read_snapshot(&args.new)?;
    let result = diff(&old, &new);
    tracing::info!(
        event = "snapshots_diffed",
        old = %old.version(),
        new = %new.version(),
        changes = result.changed.len(),
        empty = result.is_empty()
    );

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn detect_engine(conn: &str) -> Result<&'static str, CliError> {
    if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(CliError::UnsupportedEngine(
            conn.split("://").next().unwrap_or_default().to_string(),
        ))
    }
}
