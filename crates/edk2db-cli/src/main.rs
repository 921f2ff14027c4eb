mod logging;
mod output;
mod settings;

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use edk2db::queries::{
    ComponentQuery, EnvironmentQuery, LibraryQuery, LicenseQuery, UnusedLibraryQuery,
};
use edk2db::tables::{
    DEFAULT_SOURCE_EXTENSIONS, InfTable, InfTableOptions, PackageTable, SourceTable,
    SourceTableOptions, default_jobs,
};
use edk2db::{AdvancedQuery, DbError, Edk2Db, Edk2Path, Env, RunId};
use thiserror::Error;

use logging::init_logging;
use output::{Format, write_rows};
use settings::load_settings;

const DEFAULT_DATABASE: &str = "edk2db.sqlite3";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("database error: {0}")]
    Db(#[from] DbError),
    #[error("workspace error: {0}")]
    Core(#[from] edk2db_core::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid settings file: {0}")]
    Settings(#[from] toml::de::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("database not found: {}", .0.display())]
    MissingDatabase(PathBuf),
}

#[derive(Parser, Debug)]
#[command(name = "edk2db", version, about = "Build and query SQLite databases of EDK2 workspaces")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a workspace into a database.
    Parse(ParseArgs),
    /// Run a query against an existing database.
    Query(QueryArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TableKind {
    Source,
    Inf,
    Package,
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Workspace root.
    #[arg(long)]
    workspace: Option<PathBuf>,
    /// Database file to create or update.
    #[arg(long)]
    db: Option<PathBuf>,
    /// Additional package path (absolute or workspace relative).
    #[arg(long = "package-path", value_name = "DIR")]
    package_paths: Vec<PathBuf>,
    /// Environment value recorded with the run.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    env: Vec<(String, String)>,
    /// Tables to generate. The environment table is always generated.
    #[arg(long, value_enum, value_delimiter = ',')]
    tables: Vec<TableKind>,
    /// Worker threads for file parsing.
    #[arg(long)]
    jobs: Option<usize>,
    /// Classify source lines as code, comment or blank.
    #[arg(long, default_value_t = false)]
    source_stats: bool,
    /// TOML settings file supplying defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write JSON logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Database file to read.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Json, global = true)]
    format: Format,
    /// TOML settings file supplying the database path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    kind: QueryKind,
}

#[derive(Subcommand, Debug)]
enum QueryKind {
    /// Source files without an SPDX license identifier.
    License {
        /// Only report paths matching this pattern.
        #[arg(long)]
        include: Vec<String>,
        /// Skip paths matching this pattern.
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Library instances, optionally filtered by class.
    Library {
        #[arg(long)]
        library: Option<String>,
    },
    /// Components and the library classes they use.
    Components {
        /// Path pattern (regular expression).
        #[arg(long, default_value = "")]
        component: String,
        #[arg(long)]
        env_id: Option<String>,
    },
    /// Library instances no module consumes.
    UnusedLibraries {
        #[arg(long)]
        env_id: Option<String>,
    },
    /// Recorded parse runs.
    Environments {
        #[arg(long)]
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Parse(args) => run_parse(args).await,
        Command::Query(args) => run_query(args).await,
    }
}

async fn run_parse(args: ParseArgs) -> Result<(), CliError> {
    let settings = load_settings(args.config.as_deref())?;
    init_logging(args.log_file.as_deref().or(settings.log_file.as_deref()))?;

    let workspace = args
        .workspace
        .or(settings.workspace)
        .ok_or_else(|| CliError::InvalidConfig("a workspace is required".to_string()))?;
    let database = args
        .db
        .or(settings.database)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
    let package_paths = if args.package_paths.is_empty() {
        settings.package_paths
    } else {
        args.package_paths
    };
    let jobs = args.jobs.or(settings.jobs).unwrap_or_else(default_jobs);
    if jobs == 0 {
        return Err(CliError::InvalidConfig("--jobs must be at least 1".to_string()));
    }

    let mut env: Env = settings.env;
    env.extend(args.env);

    let tables = if args.tables.is_empty() {
        vec![TableKind::Source, TableKind::Inf, TableKind::Package]
    } else {
        args.tables
    };

    let edk2path = Edk2Path::new(&workspace, &package_paths)?;
    let mut db = Edk2Db::open(&database, Some(edk2path)).await?;
    for table in tables {
        match table {
            TableKind::Source => {
                db.register(SourceTable::new(SourceTableOptions {
                    jobs,
                    source_stats: args.source_stats || settings.source_stats,
                    extensions: settings.source_extensions.clone().unwrap_or_else(|| {
                        DEFAULT_SOURCE_EXTENSIONS
                            .iter()
                            .map(|ext| ext.to_string())
                            .collect()
                    }),
                }));
            }
            TableKind::Inf => {
                db.register(InfTable::new(InfTableOptions { jobs }));
            }
            TableKind::Package => {
                db.register(PackageTable);
            }
        }
    }

    let timer = Instant::now();
    let run_id = db.parse(&env).await?;
    db.close().await?;

    tracing::info!(
        event = "run_finished",
        run_id = %run_id,
        database = %database.display(),
        duration_ms = timer.elapsed().as_millis() as u64
    );
    println!("{run_id}");
    Ok(())
}

async fn run_query(args: QueryArgs) -> Result<(), CliError> {
    let settings = load_settings(args.config.as_deref())?;
    init_logging(settings.log_file.as_deref())?;

    let database = args
        .db
        .or(settings.database)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
    if !database.is_file() {
        return Err(CliError::MissingDatabase(database));
    }

    let mut db = Edk2Db::open(&database, None).await?;
    let format = args.format;
    match args.kind {
        QueryKind::License { include, exclude } => {
            print_query(&mut db, &LicenseQuery { include, exclude }, format).await?
        }
        QueryKind::Library { library } => {
            print_query(&mut db, &LibraryQuery { library }, format).await?
        }
        QueryKind::Components { component, env_id } => {
            let query = ComponentQuery {
                component,
                env_id: env_id.map(RunId::from),
            };
            print_query(&mut db, &query, format).await?
        }
        QueryKind::UnusedLibraries { env_id } => {
            let query = UnusedLibraryQuery {
                env_id: env_id.map(RunId::from),
            };
            print_query(&mut db, &query, format).await?
        }
        QueryKind::Environments { id } => {
            let query = EnvironmentQuery {
                id: id.map(RunId::from),
            };
            print_query(&mut db, &query, format).await?
        }
    }
    db.close().await?;
    Ok(())
}

async fn print_query<Q>(db: &mut Edk2Db, query: &Q, format: Format) -> Result<(), CliError>
where
    Q: AdvancedQuery,
    Q::Row: serde::Serialize,
{
    let rows = db.search(query).await?;
    tracing::debug!(event = "query_finished", rows = rows.len());
    write_rows(&rows, format, io::stdout().lock())
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
