//! HTTP client for the vector index.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use silo_config::IndexConfig;
use silo_core::{
    ChunkSink, EmbeddedChunk, FileId, MediaType, ProviderError, ProviderResult,
};
use silo_provider::with_retry;
use tracing::{debug, info};

/// Bounded retries for transient index errors.
const INDEX_MAX_RETRIES: u32 = 3;

/// Deterministic document id for a chunk: a short hash of the parent file
/// id plus the sequence index. Stable across reruns of the same file.
pub fn chunk_doc_id(file_id: &str, sequence_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_id.as_bytes());
    let digest = hasher.finalize();
    let prefix: String = digest[..6].iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}_{}", prefix, sequence_index)
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
}

/// Client for an OpenSearch-style vector index.
#[derive(Clone)]
pub struct VectorIndexClient {
    client: Client,
    host: String,
    index_name: String,
}

impl VectorIndexClient {
    pub fn from_config(config: &IndexConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Permanent(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            index_name: config.index_name.clone(),
        })
    }

    fn map_request_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_connect() || e.is_timeout() {
            ProviderError::Transient(format!("cannot reach index at {}: {}", self.host, e))
        } else {
            ProviderError::Transient(format!("index request failed: {}", e))
        }
    }
}

impl VectorIndexClient {
    /// Create the index if it does not exist. Idempotent.
    async fn ensure_index_once(&self) -> ProviderResult<()> {
        let url = format!("{}/{}", self.host, self.index_name);

        let head = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if head.status().is_success() {
            debug!("Index {} already exists", self.index_name);
            return Ok(());
        }

        let body = json!({
            "settings": { "index": { "knn": true } },
            "mappings": {
                "properties": {
                    "embedding": { "type": "knn_vector" },
                    "passage": { "type": "text" },
                    "metadata": { "type": "object", "enabled": true }
                }
            }
        });

        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Losing a create race to another run is fine.
            if text.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(ProviderError::Permanent(format!(
                "failed to create index {}: {} {}",
                self.index_name, status, text
            )));
        }

        info!("Created index {}", self.index_name);
        Ok(())
    }

    async fn upsert_once(
        &self,
        file_id: &FileId,
        media_type: MediaType,
        chunks: &[EmbeddedChunk],
    ) -> ProviderResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut body = String::new();
        for embedded in chunks {
            let chunk = &embedded.chunk;
            let doc_id = chunk_doc_id(file_id, chunk.sequence_index);

            let action = json!({ "index": { "_index": self.index_name, "_id": doc_id } });
            let document = json!({
                "passage": chunk.text,
                "embedding": embedded.vector,
                "type": media_type.as_str(),
                "metadata": {
                    "doc_id": doc_id,
                    "source": file_id,
                    "sequence_index": chunk.sequence_index,
                    "start_offset": chunk.start_offset,
                    "end_offset": chunk.end_offset,
                },
            });

            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&document.to_string());
            body.push('\n');
        }

        let url = format!("{}/_bulk", self.host);
        let response = self
            .client
            .post(&url)
            .header("content-type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(ProviderError::Transient(format!(
                    "bulk upsert returned {}: {}",
                    status, text
                )))
            } else {
                Err(ProviderError::Permanent(format!(
                    "bulk upsert rejected: {} {}",
                    status, text
                )))
            };
        }

        let bulk: BulkResponse = response.json().await.map_err(|e| {
            ProviderError::Permanent(format!("malformed bulk response: {}", e))
        })?;

        // A partial bulk failure must fail the whole file; the rerun will
        // overwrite whatever landed thanks to the deterministic ids.
        if bulk.errors {
            return Err(ProviderError::Transient(format!(
                "bulk upsert for {} reported item-level errors",
                file_id
            )));
        }

        info!("Indexed {} chunks for {}", chunks.len(), file_id);
        Ok(())
    }
}

#[async_trait]
impl ChunkSink for VectorIndexClient {
    /// Called once at the start of a run, before any write.
    async fn ensure_index(&self) -> ProviderResult<()> {
        with_retry(INDEX_MAX_RETRIES, "ensure index", || self.ensure_index_once()).await
    }

    /// Upsert all of one file's chunks in a single bulk request. A rerun
    /// overwrites in place thanks to the deterministic ids, so retrying the
    /// whole batch is safe.
    async fn upsert_chunks(
        &self,
        file_id: &FileId,
        media_type: MediaType,
        chunks: &[EmbeddedChunk],
    ) -> ProviderResult<()> {
        with_retry(INDEX_MAX_RETRIES, "bulk upsert", || {
            self.upsert_once(file_id, media_type, chunks)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_ids_are_deterministic() {
        let a = chunk_doc_id("s3://corpus/a.txt", 0);
        let b = chunk_doc_id("s3://corpus/a.txt", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_doc_ids_distinguish_sequence_and_file() {
        let a0 = chunk_doc_id("s3://corpus/a.txt", 0);
        let a1 = chunk_doc_id("s3://corpus/a.txt", 1);
        let b0 = chunk_doc_id("s3://corpus/b.txt", 0);
        assert_ne!(a0, a1);
        assert_ne!(a0, b0);
        assert!(a0.ends_with("_0"));
        assert!(a1.ends_with("_1"));
    }
}
