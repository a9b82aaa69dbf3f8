use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "allot",
    about = "allot: max-min fair allocation of units to families",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an allocation spec.
    ///
    /// The spec is a JSON object with `units` (list of IDs) and `families`
    /// (map of family ID to ranked unit IDs, most preferred first).
    Solve {
        /// Path to the spec JSON file
        #[arg(short, long)]
        spec: PathBuf,
        /// Path to allot.toml (default: built-in settings)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Key for audit records (default: generated)
        #[arg(long)]
        execution_id: Option<String>,
        /// Append task audit records to this JSON-lines file
        #[arg(long)]
        audit_log: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a spec and show how it would be solved
    Check {
        #[arg(short, long)]
        spec: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show the effective configuration, or write a scaffold
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write an allot.toml scaffold instead
        #[arg(long)]
        init: bool,
        /// Where --init writes the scaffold
        #[arg(short, long, default_value = "allot.toml")]
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive("allot=info".parse()?);
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Solve {
            spec,
            config,
            execution_id,
            audit_log,
            json,
        } => commands::solve::solve(&commands::solve::SolveArgs {
            spec,
            config,
            execution_id,
            audit_log,
            json,
        }),
        Commands::Check { spec, config } => commands::check::check(&spec, config.as_deref()),
        Commands::Config { config, init, path } => {
            if init {
                commands::config::init(&path)
            } else {
                commands::config::show(config.as_deref())
            }
        }
    }
}
