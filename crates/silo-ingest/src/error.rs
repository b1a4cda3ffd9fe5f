//! Error types for the ingestion pipeline.

use silo_core::ProviderError;
use silo_ledger::LedgerError;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// The pipeline stage a failure surfaced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Chunking,
    Embedding,
    Indexing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Extracting => "extracting",
            Stage::Chunking => "chunking",
            Stage::Embedding => "embedding",
            Stage::Indexing => "indexing",
        };
        write!(f, "{}", name)
    }
}

/// Errors that can occur while ingesting.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("invalid chunking configuration: {0}")]
    InvalidChunking(String),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: ProviderError,
    },
}

impl IngestError {
    pub fn stage(stage: Stage, source: ProviderError) -> Self {
        IngestError::Stage { stage, source }
    }

    /// Whether the underlying cause was still transient when the file
    /// failed. Recorded in the ledger as a coarse remediation hint.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Stage { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}
