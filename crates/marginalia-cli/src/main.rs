use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod commands;
mod config;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "marginalia", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/marginalia/marginalia.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    ///
    /// Brings the database from its recorded version up to the newest
    /// released version, strictly in ascending order. For each pending
    /// version:
    ///
    /// - Runs the migration's statements in their issued order
    /// - Records the version in the schema_version audit table
    /// - Stops at the first failure, leaving later versions unapplied
    ///
    /// A structural change that is already in place (for example a column
    /// added by a run that crashed before recording it) is recognized and
    /// counted as applied, so a restart always converges.
    ///
    /// The application refuses to start serving when migrations fail; this
    /// command mirrors that contract by exiting non-zero.
    Migrate,
    /// Show schema version and pending migrations
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List applied migrations with their timestamps
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.db {
        Some(path) => Config::load_with_db_path(path)?,
        None => Config::load()?,
    };
    let db_path = config.database_path;

    // Ensure database directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match cli.command {
        Commands::Migrate => {
            commands::run_migrate(&db_path)?;
        }
        Commands::Status { json } => {
            commands::show_status(&db_path, json)?;
        }
        Commands::History { json } => {
            commands::show_history(&db_path, json)?;
        }
    }

    Ok(())
}
