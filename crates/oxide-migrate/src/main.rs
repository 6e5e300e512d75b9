//! oxide-migrate CLI
//!
//! Command-line tool for keeping a database in step with model definitions.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_migrate::prelude::*;

/// Automatic schema migrations from model definitions.
#[derive(Parser)]
#[command(name = "oxide-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Schema to inspect and migrate (dialect default if not specified).
    #[arg(short, long)]
    schema: Option<String>,

    /// Table to leave alone, as `table` or `schema.table`. Repeatable.
    #[arg(short, long)]
    exclude: Vec<String>,

    /// JSON file with the model definitions.
    #[arg(short, long, env = "OXIDE_MODELS")]
    models: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the live schema as JSON.
    Inspect,

    /// Print the changes the models require.
    Diff,

    /// Print the DDL for the changes without executing it.
    Sql,

    /// Apply the changes and record them.
    Migrate {
        /// Replay the changes in memory and print the resulting schema.
        #[arg(long)]
        dry_run: bool,
    },

    /// List applied changesets.
    History,
}

fn models(path: Option<&Path>) -> anyhow::Result<ModelRegistry> {
    let path = path.ok_or_else(|| anyhow::anyhow!("--models is required for this command"))?;
    Ok(load_models(path)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = InspectorConfig::new();
    if let Some(schema) = &cli.schema {
        config = config.with_schema(schema);
    }
    for table in &cli.exclude {
        config = config.exclude(table);
    }

    let migrator = AutoMigrator::connect(&cli.database, config).await?;

    match cli.command {
        Commands::Inspect => {
            let state = migrator.inspect_database().await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }

        Commands::Diff => {
            let registry = models(cli.models.as_deref())?;
            let changeset = migrator.plan(&registry).await?;
            if changeset.is_empty() {
                info!("No changes detected.");
            } else {
                print!("{changeset}");
            }
        }

        Commands::Sql => {
            let registry = models(cli.models.as_deref())?;
            let changeset = migrator.plan(&registry).await?;
            for sql in migrator.sql(&changeset)? {
                println!("{sql};");
            }
        }

        Commands::Migrate { dry_run } => {
            let registry = models(cli.models.as_deref())?;
            if dry_run {
                info!("Dry run mode - the database will not be changed.");
                let (changeset, state) = migrator.dry_run(&registry).await?;
                print!("{changeset}");
                println!("\n{state}");
            } else {
                let changeset = migrator.migrate(&registry).await?;
                print!("{changeset}");
            }
        }

        Commands::History => {
            let history = migrator.history();
            history.ensure_table().await?;
            let applied = history.get_applied().await?;

            if applied.is_empty() {
                info!("No changesets have been applied yet.");
            } else {
                println!("\nApplied changesets:");
                println!("{:-<60}", "");

                for migration in &applied {
                    println!(
                        " [X] {} ({})",
                        migration.name,
                        migration.applied_at.format("%Y-%m-%d %H:%M:%S")
                    );
                    for operation in &migration.operations {
                        println!("     {operation}");
                    }
                }
                println!();
            }
        }
    }

    Ok(())
}
