//! HTTP client for the model server and transcription service.

use crate::attribution::{parse_attribution_response, ATTRIBUTION_PROMPT};
use crate::retry::with_retry;
use crate::types::*;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use silo_config::ProviderConfig;
use silo_core::{
    Embedder, ProviderError, ProviderResult, SpeakerAttribution, SpeakerNamer, TranscriptSegment,
    Transcriber, VisionDescriber,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const IMAGE_DESCRIPTION_PROMPT: &str = "Describe this image in detail. Transcribe any text \
visible in it verbatim. The description will be indexed for document retrieval, so be \
specific about names, numbers, and diagrams.";

/// Client for the model server (embeddings, generation) and the
/// transcription service. Clones share the underlying connection pool.
#[derive(Clone)]
pub struct ModelClient {
    client: Client,
    host: String,
    transcribe_host: String,
    embedding_model: String,
    generation_model: String,
    max_retries: u32,
}

impl ModelClient {
    /// Create a client from configuration.
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            transcribe_host: config.transcribe_host.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Check whether the model server answers at all.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.host);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn map_request_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_connect() {
            ProviderError::Transient(format!("cannot reach {}: {}", self.host, e))
        } else if e.is_timeout() {
            ProviderError::Transient(format!("request timed out: {}", e))
        } else {
            ProviderError::Transient(format!("request failed: {}", e))
        }
    }

    async fn check_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            Err(ProviderError::Transient(format!(
                "provider returned {}: {}",
                status, body
            )))
        } else {
            Err(ProviderError::Permanent(format!(
                "provider rejected request with {}: {}",
                status, body
            )))
        }
    }

    async fn embed_once(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.host);
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;
        let response = Self::check_status(response).await?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Permanent(format!("malformed embedding response: {}", e)))?;

        debug!("Embedded {} chars into {} dims", text.len(), body.embedding.len());
        Ok(body.embedding)
    }

    async fn generate_once(&self, request: &GenerateRequest) -> ProviderResult<String> {
        let url = format!("{}/api/generate", self.host);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;
        let response = Self::check_status(response).await?;

        let body: GenerateResponse = response.json().await.map_err(|e| {
            ProviderError::Permanent(format!("malformed generation response: {}", e))
        })?;

        Ok(body.response)
    }

    async fn transcribe_once(&self, path: &Path) -> ProviderResult<Vec<TranscriptSegment>> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ProviderError::Permanent(format!("cannot read {}: {}", path.display(), e)))?;

        let url = format!("{}/transcribe", self.transcribe_host);
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("media")
            .to_string();

        let response = self
            .client
            .post(&url)
            .query(&[("diarize", "true"), ("filename", filename.as_str())])
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;
        let response = Self::check_status(response).await?;

        let body: TranscribeResponse = response.json().await.map_err(|e| {
            ProviderError::Permanent(format!("malformed transcription response: {}", e))
        })?;

        info!(
            "Transcribed {} into {} segments",
            path.display(),
            body.segments.len()
        );

        Ok(body
            .segments
            .into_iter()
            .map(|s| TranscriptSegment {
                speaker_label: s.speaker,
                text: s.text.trim().to_string(),
                start: s.start,
                end: s.end,
            })
            .collect())
    }
}

#[async_trait]
impl Embedder for ModelClient {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        with_retry(self.max_retries, "embed", || self.embed_once(text)).await
    }
}

#[async_trait]
impl VisionDescriber for ModelClient {
    async fn describe(&self, path: &Path) -> ProviderResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ProviderError::Permanent(format!("cannot read {}: {}", path.display(), e)))?;
        let encoded = BASE64.encode(&bytes);

        let request = GenerateRequest::new(&self.generation_model, IMAGE_DESCRIPTION_PROMPT)
            .with_images(vec![encoded]);

        with_retry(self.max_retries, "describe image", || {
            self.generate_once(&request)
        })
        .await
    }
}

#[async_trait]
impl Transcriber for ModelClient {
    async fn transcribe(&self, path: &Path) -> ProviderResult<Vec<TranscriptSegment>> {
        with_retry(self.max_retries, "transcribe", || self.transcribe_once(path)).await
    }
}

#[async_trait]
impl SpeakerNamer for ModelClient {
    async fn identify(&self, labelled_transcript: &str) -> ProviderResult<Vec<SpeakerAttribution>> {
        let prompt = ATTRIBUTION_PROMPT.replace("{transcript}", labelled_transcript);
        let request = GenerateRequest::new(&self.generation_model, prompt)
            .with_options(GenerateOptions {
                temperature: Some(0.0),
                num_predict: None,
            });

        let response = with_retry(self.max_retries, "identify speakers", || {
            self.generate_once(&request)
        })
        .await?;

        // Schema violations are Permanent and not retried.
        parse_attribution_response(&response)
    }
}
