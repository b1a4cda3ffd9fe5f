//! Reset command - clear the ledger.

use super::{load_config, open_ledger};
use anyhow::Result;
use colored::Colorize;

pub fn run() -> Result<()> {
    let config = load_config()?;
    let ledger = open_ledger(&config)?;

    let removed = ledger.reset()?;
    println!(
        "{} Removed {} ledger records. The next run will reprocess everything.",
        "Reset:".green().bold(),
        removed
    );

    Ok(())
}
