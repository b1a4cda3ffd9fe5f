//! Provider error taxonomy.
//!
//! Every external call site classifies its failures as transient (worth
//! retrying with backoff) or permanent (fail the file immediately).

use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors returned by extraction, attribution, embedding, and index providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Throttling, timeouts, connection failures. Retried with backoff.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Malformed input, rejected requests, schema-violating responses.
    #[error("permanent provider error: {0}")]
    Permanent(String),

    /// The provider cannot handle this media or format at all.
    #[error("unsupported input: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Whether the call site should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Convert an exhausted transient error into a permanent one,
    /// preserving the cause.
    pub fn into_permanent(self, attempts: u32) -> ProviderError {
        match self {
            ProviderError::Transient(msg) => {
                ProviderError::Permanent(format!("gave up after {} attempts: {}", attempts, msg))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Transient("429".into()).is_retryable());
        assert!(!ProviderError::Permanent("bad schema".into()).is_retryable());
        assert!(!ProviderError::Unsupported("tiff".into()).is_retryable());
    }

    #[test]
    fn test_exhausted_transient_becomes_permanent() {
        let err = ProviderError::Transient("timeout".into()).into_permanent(3);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("timeout"));
    }
}
