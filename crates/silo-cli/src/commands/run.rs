//! Run command - drive a batch ingestion over a file or directory.

use super::{get_paths, load_config, open_ledger};
use anyhow::{Context, Result};
use colored::Colorize;
use silo_core::{
    ChunkSink, Embedder, FileCandidate, MediaType, SpeakerNamer, Transcriber, VisionDescriber,
};
use silo_index::VectorIndexClient;
use silo_ingest::{ChunkPlan, Pipeline, Scheduler};
use silo_provider::ModelClient;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use walkdir::WalkDir;

pub fn run(
    path: &str,
    concurrency: Option<usize>,
    deadline_minutes: Option<u64>,
    dry_run: bool,
) -> Result<()> {
    let config = load_config()?;
    let _paths = get_paths()?;

    let root = Path::new(path);
    if !root.exists() {
        anyhow::bail!("Path does not exist: {}", root.display());
    }

    let candidates = discover(root)?;
    if candidates.is_empty() {
        println!(
            "{}",
            "No ingestible files found (text, image, audio, video).".yellow()
        );
        return Ok(());
    }

    if dry_run {
        println!(
            "{} {} file(s)",
            "Would ingest:".cyan().bold(),
            candidates.len()
        );
        for candidate in &candidates {
            println!("  {} ({})", candidate.file_id, candidate.media_type);
        }
        return Ok(());
    }

    let concurrency = concurrency.unwrap_or(config.run.concurrency);
    let deadline_minutes = deadline_minutes.unwrap_or(config.run.deadline_minutes);

    let ledger = open_ledger(&config)?;
    let model = Arc::new(ModelClient::from_config(&config.provider)?);
    let index = Arc::new(VectorIndexClient::from_config(&config.index)?);
    let plan = ChunkPlan::new(config.chunking.chunk_size, config.chunking.overlap_fraction)?;

    let pipeline = Pipeline::new(
        Arc::clone(&model) as Arc<dyn Transcriber>,
        Arc::clone(&model) as Arc<dyn VisionDescriber>,
        Arc::clone(&model) as Arc<dyn SpeakerNamer>,
        model as Arc<dyn Embedder>,
        index as Arc<dyn ChunkSink>,
        plan,
    );
    let scheduler = Scheduler::new(ledger, Arc::new(pipeline), concurrency);

    println!(
        "{} {} file(s), concurrency {}, deadline {} min",
        "Ingesting:".cyan().bold(),
        candidates.len(),
        concurrency,
        deadline_minutes
    );

    let rt = Runtime::new().context("Failed to create async runtime")?;
    let report = rt.block_on(async {
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(deadline_minutes * 60);
        scheduler.run(candidates, deadline).await
    })?;

    println!();
    println!("{}", "Run Report".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("  Run id: {}", report.run_id.as_str().dimmed());
    println!("  {} Done: {}", "●".green(), report.done);
    if report.failed > 0 {
        println!("  {} Failed: {}", "✗".red(), report.failed);
    }
    if report.skipped_done > 0 {
        println!("  {} Already done: {}", "○".dimmed(), report.skipped_done);
    }
    if report.skipped_in_progress > 0 {
        println!(
            "  {} Held by another worker: {}",
            "◐".blue(),
            report.skipped_in_progress
        );
    }
    if report.skipped_failed > 0 {
        println!(
            "  {} Failed on a previous run: {}",
            "✗".dimmed(),
            report.skipped_failed
        );
    }
    if report.abandoned > 0 {
        println!(
            "  {} Abandoned at deadline: {}",
            "…".yellow(),
            report.abandoned
        );
    }

    for failure in report.failures.iter().take(5) {
        println!("    {} {}", "✗".red(), failure.file_id);
        println!("      {}", failure.cause.dimmed());
    }
    if report.failures.len() > 5 {
        println!("    ...and {} more", report.failures.len() - 5);
    }

    if report.failed > 0 {
        anyhow::bail!("{} file(s) failed; see report above", report.failed);
    }
    Ok(())
}

/// Walk a file or directory and build candidates for every file whose
/// extension maps to a supported media type. Identity is the canonical
/// path, so re-running over the same tree yields the same file ids.
fn discover(root: &Path) -> Result<Vec<FileCandidate>> {
    let mut candidates = Vec::new();

    if root.is_file() {
        if let Some(candidate) = candidate_for(root)? {
            candidates.push(candidate);
        }
    } else {
        for entry in WalkDir::new(root) {
            let entry = entry.context("Failed to walk directory")?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(candidate) = candidate_for(entry.path())? {
                candidates.push(candidate);
            }
        }
    }

    candidates.sort_by(|a, b| a.file_id.cmp(&b.file_id));
    Ok(candidates)
}

fn candidate_for(path: &Path) -> Result<Option<FileCandidate>> {
    let media_type = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(MediaType::from_extension);
    let Some(media_type) = media_type else {
        tracing::debug!("Skipping {} (unsupported extension)", path.display());
        return Ok(None);
    };

    let canonical = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    Ok(Some(FileCandidate::new(
        canonical.to_string_lossy().into_owned(),
        media_type,
        canonical,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "text").unwrap();
        std::fs::write(dir.path().join("b.mp3"), "audio").unwrap();
        std::fs::write(dir.path().join("c.exe"), "binary").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/d.png"), "image").unwrap();

        let candidates = discover(dir.path()).unwrap();
        assert_eq!(candidates.len(), 3);
        let types: Vec<MediaType> = candidates.iter().map(|c| c.media_type).collect();
        assert!(types.contains(&MediaType::Text));
        assert!(types.contains(&MediaType::Audio));
        assert!(types.contains(&MediaType::Image));
    }

    #[test]
    fn test_discover_single_file_and_stable_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("only.md");
        std::fs::write(&path, "# doc").unwrap();

        let first = discover(&path).unwrap();
        let second = discover(&path).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].file_id, second[0].file_id);
    }
}
