//! Silo Provider - HTTP clients for the model server.
//!
//! Implements the silo-core provider traits against an Ollama-style model
//! API (embeddings, generation) and a transcription service that returns
//! speaker-labelled segments. Transient failures are retried with bounded
//! exponential backoff before the error is handed to the pipeline.

mod attribution;
mod client;
mod retry;
mod types;

pub use attribution::parse_attribution_response;
pub use client::ModelClient;
pub use retry::with_retry;
