//! Silo CLI - corpus ingestion for retrieval-augmented question answering.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Silo - ingest a mixed-media corpus into a vector index
#[derive(Parser)]
#[command(name = "silo")]
#[command(version)]
#[command(about = "Ingest a mixed-media corpus into a vector index", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize silo (create config and ledger)
    Init,

    /// Run a batch ingestion over a file or directory
    Run {
        /// Path to the file or directory to ingest
        path: String,

        /// Maximum files processed in parallel (default: from config)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Wall-clock ceiling for this run in minutes (default: from config)
        #[arg(short, long)]
        deadline_minutes: Option<u64>,

        /// Show what would be ingested without processing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show ledger status
    Status,

    /// Clear the ledger, forcing full reprocessing on the next run
    Reset,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("silo=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("silo=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Run {
            path,
            concurrency,
            deadline_minutes,
            dry_run,
        } => commands::run::run(&path, concurrency, deadline_minutes, dry_run),
        Commands::Status => commands::status::run(),
        Commands::Reset => commands::reset::run(),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
