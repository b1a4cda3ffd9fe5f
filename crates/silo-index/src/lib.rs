//! Silo Index - Vector index client.
//!
//! Writes `{vector, text, metadata}` documents into an OpenSearch-style
//! index. All of one file's chunks go in a single bulk request with
//! deterministic document ids, so a rerun after a failure overwrites rather
//! than duplicating.

mod client;

pub use client::{chunk_doc_id, VectorIndexClient};
