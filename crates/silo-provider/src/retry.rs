//! Bounded retry with exponential backoff for transient provider errors.

use silo_core::{ProviderError, ProviderResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Base delay for the first retry; doubles on each subsequent attempt.
const BASE_DELAY_MS: u64 = 500;

/// Run `op`, retrying transient errors up to `max_retries` times with
/// exponential backoff. An exhausted transient error is converted to
/// Permanent so the file fails instead of looping forever; permanent
/// errors pass through on the first occurrence.
pub async fn with_retry<T, F, Fut>(max_retries: u32, op_name: &str, mut op: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt <= max_retries => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt - 1));
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    op_name,
                    attempt,
                    max_retries + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) if e.is_retryable() => return Err(e.into_permanent(attempt)),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result: ProviderResult<i32> = with_retry(3, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::Transient("throttled".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_become_permanent() {
        let calls = AtomicU32::new(0);
        let result: ProviderResult<i32> = with_retry(2, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Transient("timeout".into())) }
        })
        .await;

        let err = result.unwrap_err();
        assert!(!err.is_retryable());
        // max_retries + 1 total attempts
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let result: ProviderResult<i32> = with_retry(5, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Permanent("bad input".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
