//! CLI command implementations.

pub mod init;
pub mod reset;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use silo_config::{AppPaths, Config};
use silo_ledger::Ledger;

/// Get the application paths.
pub fn get_paths() -> Result<AppPaths> {
    AppPaths::new().context("Failed to determine application directories")
}

/// Load the configuration from the default location.
pub fn load_config() -> Result<Config> {
    Config::load().context("Failed to load configuration")
}

/// Open the ledger, ensuring silo is initialized.
pub fn open_ledger(config: &Config) -> Result<Ledger> {
    let paths = get_paths()?;

    if !paths.is_initialized() {
        anyhow::bail!("Silo is not initialized. Run 'silo init' first.");
    }

    let path = config
        .ledger
        .path
        .clone()
        .unwrap_or_else(|| paths.ledger_file.clone());
    Ledger::open(&path, config.ledger.stale_after_minutes).context("Failed to open ledger")
}
