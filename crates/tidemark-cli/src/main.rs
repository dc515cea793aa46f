mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tidemark",
    version,
    about = "Incremental dataset-to-Postgres sync with a data-quality gate"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one incremental sync
    Run {
        /// Optional pipeline YAML file; environment variables override it
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Validate configuration, read the watermark, and test database connectivity
    Check {
        /// Optional pipeline YAML file; environment variables override it
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config } => {
            commands::run::execute(config.as_deref(), cli.log_level.as_deref()).await
        }
        Commands::Check { config } => {
            commands::check::execute(config.as_deref(), cli.log_level.as_deref()).await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "tidemark failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(commands::EXIT_FAILURE)
        }
    }
}
