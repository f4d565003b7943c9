//! pl-core CLI: build and publish one partition.

use clap::{Parser, Subcommand};
use pl_config::{resolve_config_path, LoaderConfig};
use pl_core::exit_codes::ExitCode;
use pl_core::input::read_rows_file;
use pl_core::logging::{self, LogFormat};
use pl_core::remote::{Impersonation, LocalImpersonation, MemoryFileSystem};
use pl_core::PartitionJob;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(name = "pl-core")]
#[command(about = "Build columnar parts offline and publish them")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $PL_CONFIG, then the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one partition from a JSON Lines file and publish its fragments
    Run {
        /// JSON Lines file, one object per row keyed by column name
        #[arg(short, long)]
        rows: PathBuf,

        /// Publish to an in-memory filesystem instead of the configured root
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the build instructions for the configured table
    RenderSql,

    /// Validate the configuration
    Check,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format, logging::default_filter(cli.verbose));

    let result = match cli.command {
        Commands::Run { rows, dry_run } => run(cli.config.as_deref(), &rows, dry_run),
        Commands::RenderSql => render_sql(cli.config.as_deref()),
        Commands::Check => load_config(cli.config.as_deref()).map(|config| {
            println!("configuration for {} is valid", config.table_ident());
        }),
    };
    let code = result.err().unwrap_or(ExitCode::Success);
    std::process::exit(code.as_i32());
}

fn load_config(cli: Option<&Path>) -> Result<LoaderConfig, ExitCode> {
    let Some((path, source)) = resolve_config_path(cli) else {
        eprintln!("error: no configuration file given");
        return Err(ExitCode::ConfigError);
    };
    debug!(path = %path.display(), source = ?source, "loading configuration");
    LoaderConfig::load_validated(&path).map_err(|e| {
        eprintln!("error: {}", e);
        ExitCode::ConfigError
    })
}

fn render_sql(cli: Option<&Path>) -> Result<(), ExitCode> {
    let config = load_config(cli)?;
    let job = PartitionJob::from_config(&config, Arc::new(MemoryFileSystem::new())).map_err(
        |e| {
            eprintln!("error: {}", e);
            ExitCode::from(e.kind())
        },
    )?;
    println!("{}", job.build_sql());
    Ok(())
}

fn run(cli: Option<&Path>, rows_path: &Path, dry_run: bool) -> Result<(), ExitCode> {
    let config = load_config(cli)?;
    let impersonation: Arc<dyn Impersonation> = if dry_run {
        Arc::new(MemoryFileSystem::new())
    } else {
        Arc::new(LocalImpersonation::new())
    };
    let job = PartitionJob::from_config(&config, impersonation).map_err(|e| {
        eprintln!("error: {}", e);
        ExitCode::from(e.kind())
    })?;

    let rows = read_rows_file(rows_path, job.encoder().layout()).map_err(|e| {
        eprintln!("error: {}", e);
        ExitCode::InputError
    })?;

    let report = job.run(rows).map_err(|e| {
        eprintln!("error: {}", e);
        ExitCode::from(e.kind())
    })?;

    let json = serde_json::to_string_pretty(&report).map_err(|e| {
        eprintln!("error: {}", e);
        ExitCode::InternalError
    })?;
    println!("{}", json);
    Ok(())
}
