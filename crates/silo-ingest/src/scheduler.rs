//! Bounded-concurrency batch scheduler.
//!
//! Drives a batch of candidates through the ledger and the pipeline with at
//! most `concurrency` files in flight. The deadline gates dispatch only:
//! once it passes, remaining candidates are abandoned without ever being
//! claimed, while files already in flight run to completion and settle
//! their ledger records normally.

use crate::error::{IngestError, IngestResult};
use crate::pipeline::Pipeline;
use silo_core::{new_run_id, FailedFile, FileCandidate, FileId, RunReport};
use silo_ledger::{ClaimOutcome, Ledger};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

enum FileOutcome {
    Done,
    Failed(FailedFile),
}

/// Orchestrates one batch run.
pub struct Scheduler {
    ledger: Ledger,
    pipeline: Arc<Pipeline>,
    concurrency: usize,
}

impl Scheduler {
    pub fn new(ledger: Ledger, pipeline: Arc<Pipeline>, concurrency: usize) -> Self {
        Self {
            ledger,
            pipeline,
            concurrency: concurrency.max(1),
        }
    }

    /// Run the batch until every candidate is settled or the deadline
    /// passes. Claims happen here, on the dispatch path, so a candidate
    /// that is never dispatched leaves no ledger trace.
    pub async fn run(
        &self,
        candidates: Vec<FileCandidate>,
        deadline: Instant,
    ) -> IngestResult<RunReport> {
        self.pipeline.ensure_index().await?;

        let run_id = new_run_id();
        info!(
            "Starting batch {} of {} candidates, concurrency {}",
            run_id,
            candidates.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<FileOutcome> = JoinSet::new();
        let mut report = RunReport {
            run_id,
            ..RunReport::default()
        };

        // Maps spawned task ids to file ids so a panicked worker can still
        // be reported against its file.
        let mut task_files: HashMap<tokio::task::Id, FileId> = HashMap::new();
        let mut dispatch_error: Option<IngestError> = None;

        for candidate in candidates {
            if Instant::now() >= deadline {
                report.abandoned += 1;
                continue;
            }

            // Waiting for a slot counts against the deadline too.
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break, // the semaphore is never closed
            };
            if Instant::now() >= deadline {
                report.abandoned += 1;
                continue;
            }

            let outcome = match self.ledger.claim(&candidate.file_id, candidate.media_type) {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Ledger is unusable; stop dispatching but let in-flight
                    // files settle before surfacing the error.
                    error!(
                        "Claim on {} failed: {}; stopping dispatch",
                        candidate.file_id, e
                    );
                    dispatch_error = Some(e.into());
                    break;
                }
            };

            match outcome {
                ClaimOutcome::AlreadyDone => report.skipped_done += 1,
                ClaimOutcome::AlreadyInProgress => report.skipped_in_progress += 1,
                ClaimOutcome::AlreadyFailed => report.skipped_failed += 1,
                ClaimOutcome::Acquired => {
                    let pipeline = Arc::clone(&self.pipeline);
                    let ledger = self.ledger.clone();
                    let file_id = candidate.file_id.clone();
                    let handle = tasks.spawn(async move {
                        let _permit = permit;
                        process_one(pipeline, ledger, candidate).await
                    });
                    task_files.insert(handle.id(), file_id);
                }
            }
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, FileOutcome::Done)) => report.done += 1,
                Ok((_, FileOutcome::Failed(failure))) => {
                    report.failed += 1;
                    report.failures.push(failure);
                }
                Err(e) => {
                    let file_id = task_files
                        .get(&e.id())
                        .cloned()
                        .unwrap_or_else(|| "<unknown>".to_string());
                    let cause = format!("worker task panicked: {}", e);
                    error!("Worker task for {} did not finish: {}", file_id, e);
                    if let Err(ledger_err) = self.ledger.fail(&file_id, &cause, true) {
                        error!("Could not record failure for {}: {}", file_id, ledger_err);
                    }
                    report.failed += 1;
                    report.failures.push(FailedFile { file_id, cause });
                }
            }
        }

        if let Some(e) = dispatch_error {
            return Err(e);
        }

        info!(
            "Batch {} finished: {} done, {} failed, {} skipped, {} abandoned",
            report.run_id,
            report.done,
            report.failed,
            report.skipped_done + report.skipped_in_progress + report.skipped_failed,
            report.abandoned
        );
        Ok(report)
    }
}

/// Process one claimed candidate and settle its ledger record.
async fn process_one(
    pipeline: Arc<Pipeline>,
    ledger: Ledger,
    candidate: FileCandidate,
) -> FileOutcome {
    let file_id = candidate.file_id.clone();

    match pipeline.process(&candidate).await {
        Ok(chunks) => match ledger.complete(&file_id) {
            Ok(()) => {
                info!("Completed {} ({} chunks)", file_id, chunks);
                FileOutcome::Done
            }
            Err(e) => FileOutcome::Failed(FailedFile {
                file_id,
                cause: format!("completed but could not settle ledger record: {}", e),
            }),
        },
        Err(e) => {
            let cause = e.to_string();
            warn!("Failed {}: {}", file_id, cause);
            if let Err(ledger_err) = ledger.fail(&file_id, &cause, e.is_retryable()) {
                error!("Could not record failure for {}: {}", file_id, ledger_err);
            }
            FileOutcome::Failed(FailedFile { file_id, cause })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkPlan;
    use crate::test_util::{
        CountingEmbedder, FakeDescriber, FakeNamer, FakeTranscriber, RecordingSink,
    };
    use silo_core::{ChunkSink, Embedder, MediaType, RecordStatus};
    use std::path::Path;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Harness {
        _dir: tempfile::TempDir,
        ledger: Ledger,
        embedder: Arc<CountingEmbedder>,
        sink: Arc<RecordingSink>,
        scheduler: Scheduler,
        candidates: Vec<FileCandidate>,
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    fn write_candidate(dir: &Path, name: &str, body: &str) -> FileCandidate {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        FileCandidate::new(format!("corpus/{}", name), MediaType::Text, path)
    }

    /// Three small text files behind a file-backed ledger.
    fn harness(embedder: CountingEmbedder, concurrency: usize) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("ledger.db"), 120).unwrap();

        let candidates = vec![
            write_candidate(dir.path(), "a.txt", &"a".repeat(120)),
            write_candidate(dir.path(), "b.txt", &"b".repeat(50)),
            write_candidate(dir.path(), "c.txt", &"c".repeat(210)),
        ];

        let embedder = Arc::new(embedder);
        let sink = Arc::new(RecordingSink::default());
        let pipeline = Pipeline::new(
            Arc::new(FakeTranscriber::default()),
            Arc::new(FakeDescriber::new("")),
            Arc::new(FakeNamer::default()),
            Arc::clone(&embedder) as Arc<dyn Embedder>,
            Arc::clone(&sink) as Arc<dyn ChunkSink>,
            ChunkPlan::new(100, 0.0).unwrap(),
        );
        let scheduler = Scheduler::new(ledger.clone(), Arc::new(pipeline), concurrency);

        Harness {
            _dir: dir,
            ledger,
            embedder,
            sink,
            scheduler,
            candidates,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_run_is_a_no_op() {
        let h = harness(CountingEmbedder::default(), 2);

        let first = h
            .scheduler
            .run(h.candidates.clone(), far_deadline())
            .await
            .unwrap();
        assert_eq!(first.done, 3);
        assert_eq!(first.failed, 0);
        assert_eq!(h.sink.indexed_files(), 3);
        assert!(!first.run_id.is_empty());

        let calls_after_first = h.embedder.calls.load(Ordering::SeqCst);

        let second = h
            .scheduler
            .run(h.candidates.clone(), far_deadline())
            .await
            .unwrap();
        assert_eq!(second.done, 0);
        assert_eq!(second.skipped_done, 3);
        // No provider work at all on the re-run.
        assert_eq!(h.embedder.calls.load(Ordering::SeqCst), calls_after_first);
        // Every run gets its own id.
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panicking_worker_is_reported_against_its_file() {
        let h = harness(CountingEmbedder::panicking_on("c"), 2);

        let report = h
            .scheduler
            .run(h.candidates.clone(), far_deadline())
            .await
            .unwrap();
        assert_eq!(report.done, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].file_id, "corpus/c.txt");
        assert!(report.failures[0].cause.contains("panicked"));

        // The record is settled, not left in_progress.
        let record = h.ledger.get(&"corpus/c.txt".to_string()).unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.retryable, Some(true));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_broken_ledger_surfaces_an_error() {
        let h = harness(CountingEmbedder::default(), 2);

        // Make the ledger backend unusable out from under the scheduler.
        let conn = rusqlite::Connection::open(h._dir.path().join("ledger.db")).unwrap();
        conn.execute("DROP TABLE files", []).unwrap();

        let err = h
            .scheduler
            .run(h.candidates.clone(), far_deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Ledger(_)));
        assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.sink.indexed_files(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_one_bad_file_does_not_sink_the_batch() {
        let h = harness(CountingEmbedder::poisoned_by("c"), 2);

        let report = h
            .scheduler
            .run(h.candidates.clone(), far_deadline())
            .await
            .unwrap();
        assert_eq!(report.done, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].file_id, "corpus/c.txt");
        assert!(report.failures[0].cause.contains("embedding"));
        assert_eq!(h.sink.indexed_files(), 2);

        let record = h.ledger.get(&"corpus/c.txt".to_string()).unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.retryable, Some(false));

        // Failed records stay failed on the next run.
        let second = h
            .scheduler
            .run(h.candidates.clone(), far_deadline())
            .await
            .unwrap();
        assert_eq!(second.skipped_done, 2);
        assert_eq!(second.skipped_failed, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_elapsed_deadline_abandons_without_claiming() {
        let h = harness(CountingEmbedder::default(), 2);

        let report = h
            .scheduler
            .run(h.candidates.clone(), Instant::now())
            .await
            .unwrap();
        assert_eq!(report.abandoned, 3);
        assert_eq!(report.done, 0);
        assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
        // Abandoned candidates leave no ledger trace.
        assert_eq!(h.ledger.counts().unwrap().total(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_held_claims_are_skipped() {
        let h = harness(CountingEmbedder::default(), 2);

        // Another worker holds one of the files.
        h.ledger
            .claim(&"corpus/b.txt".to_string(), MediaType::Text)
            .unwrap();

        let report = h
            .scheduler
            .run(h.candidates.clone(), far_deadline())
            .await
            .unwrap();
        assert_eq!(report.done, 2);
        assert_eq!(report.skipped_in_progress, 1);
        assert!(h.sink.chunks_for("corpus/b.txt").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reset_makes_everything_eligible_again() {
        let h = harness(CountingEmbedder::default(), 3);

        h.scheduler
            .run(h.candidates.clone(), far_deadline())
            .await
            .unwrap();
        let calls_after_first = h.embedder.calls.load(Ordering::SeqCst);

        assert_eq!(h.ledger.reset().unwrap(), 3);

        let report = h
            .scheduler
            .run(h.candidates.clone(), far_deadline())
            .await
            .unwrap();
        assert_eq!(report.done, 3);
        assert_eq!(
            h.embedder.calls.load(Ordering::SeqCst),
            calls_after_first * 2
        );
    }
}
