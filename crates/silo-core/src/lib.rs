//! Silo Core - Domain types and provider contracts for the silo ingestion engine.

mod error;
mod traits;
mod types;

pub use error::{ProviderError, ProviderResult};
pub use traits::{ChunkSink, Embedder, SpeakerNamer, Transcriber, VisionDescriber};
pub use types::*;
