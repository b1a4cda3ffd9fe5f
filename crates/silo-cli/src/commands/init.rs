//! Initialize silo.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use silo_config::Config;
use silo_ledger::{Ledger, DEFAULT_STALE_AFTER_MINUTES};

pub fn run() -> Result<()> {
    let paths = get_paths()?;

    if paths.is_initialized() {
        println!("{} Silo is already initialized.", "Note:".yellow().bold());
        println!("  Config: {}", paths.config_file.display());
        println!("  Ledger: {}", paths.ledger_file.display());
        return Ok(());
    }

    println!("{}", "Initializing silo...".cyan().bold());

    paths.ensure_dirs().context("Failed to create directories")?;
    println!("  {} Created directories", "✓".green());

    Config::create_default_file(&paths.config_file).context("Failed to create config file")?;
    println!(
        "  {} Created config: {}",
        "✓".green(),
        paths.config_file.display()
    );

    let _ledger = Ledger::open(&paths.ledger_file, DEFAULT_STALE_AFTER_MINUTES)
        .context("Failed to initialize ledger")?;
    println!(
        "  {} Created ledger: {}",
        "✓".green(),
        paths.ledger_file.display()
    );

    println!();
    println!("{}", "Silo initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Point provider/index hosts at your services: edit the config above");
    println!("  2. Ingest a corpus: {}", "silo run ~/corpus".cyan());
    println!("  3. Check progress: {}", "silo status".cyan());

    Ok(())
}
