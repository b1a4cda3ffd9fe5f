//! Status command - show ledger state.

use super::{load_config, open_ledger};
use anyhow::Result;
use colored::Colorize;

pub fn run() -> Result<()> {
    let config = load_config()?;
    let ledger = open_ledger(&config)?;

    println!("{}", "Silo Status".cyan().bold());
    println!("{}", "─".repeat(50));

    let counts = ledger.counts()?;

    println!();
    println!("{}", "Ledger".white().bold());
    println!("  {} Unclaimed: {}", "○".yellow(), counts.unclaimed);
    println!("  {} In progress: {}", "◐".blue(), counts.in_progress);
    println!("  {} Done: {}", "●".green(), counts.done);
    if counts.failed > 0 {
        println!("  {} Failed: {}", "✗".red(), counts.failed);
    }

    let failed = ledger.list_failed()?;
    if !failed.is_empty() {
        println!();
        println!("{}", "Failed Files".red().bold());
        for record in failed.iter().take(5) {
            let retry_hint = match record.retryable {
                Some(true) => " (retryable)",
                _ => "",
            };
            println!(
                "  {} {} after {} attempt(s){}",
                "✗".red(),
                record.file_id,
                record.attempts,
                retry_hint
            );
            if let Some(ref cause) = record.error {
                println!("    {}", cause.dimmed());
            }
        }
        if failed.len() > 5 {
            println!("  ...and {} more", failed.len() - 5);
        }
        println!();
        println!(
            "{}",
            "Failed files stay failed until 'silo reset'.".dimmed()
        );
    }

    if counts.total() == 0 {
        println!();
        println!(
            "{}",
            "Ledger is empty. Use 'silo run <path>' to ingest a corpus.".dimmed()
        );
    }

    Ok(())
}
