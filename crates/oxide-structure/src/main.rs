//! oxide-structure CLI
//!
//! Command-line tool for converging MySQL tables to JSON definitions.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_structure::prelude::*;

/// Declarative table-structure convergence for MySQL.
#[derive(Parser)]
#[command(name = "oxide-structure")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL.
    #[arg(short, long, env = "DATABASE_URL")]
    database: String,

    /// Configuration file (JSON).
    #[arg(short, long, env = "OXIDE_STRUCTURE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Converge a table to its definition.
    Converge {
        /// Table definition file (JSON).
        #[arg(short = 'f', long)]
        definition: PathBuf,

        /// Drop columns and indexes the definition does not declare.
        #[arg(long)]
        explicit: bool,

        /// Drop and recreate the table.
        #[arg(long)]
        drop: bool,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the live structure of a table.
    Inspect {
        /// Table name, including any prefix.
        #[arg(short, long)]
        table: String,
    },

    /// List tables.
    Tables {
        /// `LIKE` pattern to filter by.
        #[arg(short, long)]
        like: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => StructureConfig::from_file(path)?,
        None => StructureConfig::default(),
    };

    let driver: Arc<dyn DatabaseDriver> = Arc::new(MySqlDriver::connect(&cli.database).await?);
    let mut registry = StructureRegistry::new();
    registry.register(DEFAULT_CONNECTION, driver.clone(), config);

    match cli.command {
        Commands::Converge {
            definition,
            explicit,
            drop,
            dry_run,
        } => {
            let definition = TableDefinition::from_file(&definition)?;
            let mut structure = registry.structure(DEFAULT_CONNECTION)?;
            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
                structure.capture(true);
            }

            definition.apply(&mut structure)?;
            let statements = structure.converge(explicit, drop).await?;

            if statements.is_empty() {
                info!(table = %definition.name, "Table is up to date.");
            }
            for sql in &statements {
                println!("{};", sql);
            }
        }

        Commands::Inspect { table } => {
            let dialect = Arc::new(MySqlDialect::new());
            let mut reader = LiveSchemaReader::new(driver, dialect.clone());

            if !reader.table_exists(&table).await? {
                anyhow::bail!("table '{}' does not exist", table);
            }

            let engine = reader.table_engine(&table).await?;
            println!(
                "\n{} ({})",
                table,
                engine.as_deref().unwrap_or("unknown engine")
            );
            println!("{:-<60}", "");
            for column in reader.existing_columns(&table).await?.values() {
                println!("  {}", dialect.column_definition(column, false));
            }
            for fragment in reader.existing_indexes(&table).await?.values() {
                println!("  {}", fragment);
            }
            println!();
        }

        Commands::Tables { like } => {
            for table in driver.list_tables(like.as_deref()).await? {
                println!("{}", table);
            }
        }
    }

    Ok(())
}
