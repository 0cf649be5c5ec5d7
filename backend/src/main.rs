//! Userload CLI - run the user ETL batch
//!
//! ```bash
//! userload                          # Full batch with settings from env / .env
//! userload run -i users.csv         # Full batch with overrides
//! userload transform                # File round-trip only, no database
//! userload load processed.csv       # Load an already processed file
//! userload queries                  # Show the report catalog
//! ```
//!
//! Settings: `USERLOAD_INPUT`, `USERLOAD_OUTPUT`, `USERLOAD_DELIMITER`,
//! `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`,
//! `DB_CONNECT_TIMEOUT_SECS`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use userload::batch::run_file_stages;
use userload::{load_processed, run_batch, BatchConfig, BatchLog, TracingLog, CATALOG};

#[derive(Parser)]
#[command(name = "userload")]
#[command(about = "Validate user records, load them into PostgreSQL and run reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args, Default)]
struct FileOverrides {
    /// Input file (default: USERLOAD_INPUT)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (default: USERLOAD_OUTPUT)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Field delimiter (default: USERLOAD_DELIMITER or ';')
    #[arg(short, long)]
    delimiter: Option<char>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full batch: read, transform, write, load, report (the default)
    Run(FileOverrides),

    /// Read, transform and write only
    Transform(FileOverrides),

    /// Load a processed file into the database, then run the reports
    Load {
        /// Processed file, as written by `transform`
        input: PathBuf,

        /// Field delimiter (default: USERLOAD_DELIMITER or ';')
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Show the report catalog
    Queries,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command.unwrap_or(Commands::Run(FileOverrides::default())) {
        Commands::Run(overrides) => cmd_run(overrides),
        Commands::Transform(overrides) => cmd_transform(overrides),
        Commands::Load { input, delimiter } => cmd_load(input, delimiter),
        Commands::Queries => cmd_queries(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries the JSON report.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("userload=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("userload=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(overrides: FileOverrides) -> Result<BatchConfig, Box<dyn std::error::Error>> {
    let config = BatchConfig::from_env()?.with_overrides(
        overrides.input,
        overrides.output,
        overrides.delimiter,
    )?;
    Ok(config)
}

fn cmd_run(overrides: FileOverrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;
    let report = run_batch(&config, Arc::new(TracingLog))?;
    print_json(&report)
}

fn cmd_transform(overrides: FileOverrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;
    let log = TracingLog;
    let (rows_read, result) = run_file_stages(&config, &log)?;
    log.success(
        "batch",
        format!(
            "Transform finished: {} read, {} written, {} dropped",
            rows_read,
            result.records.len(),
            result.dropped()
        ),
    );
    Ok(())
}

fn cmd_load(input: PathBuf, delimiter: Option<char>) -> Result<(), Box<dyn std::error::Error>> {
    let config = BatchConfig::from_env()?.with_overrides(None, None, delimiter)?;
    let report = load_processed(&input, &config, Arc::new(TracingLog))?;
    print_json(&report)
}

fn cmd_queries() -> Result<(), Box<dyn std::error::Error>> {
    for query in CATALOG {
        println!("📄 {}", query.name);
        println!("   {}", query.description);
        println!("   {}", query.sql);
        println!();
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
