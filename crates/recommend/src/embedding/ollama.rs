use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use crate::settings::{env_parse, env_value};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_URL: &str = "http://localhost:11434/api/embed";
const DEFAULT_MODEL: &str = "qwen3-embedding:0.6b";
const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Full endpoint URL, e.g. `http://localhost:11434/api/embed`.
    pub url: String,
    pub model: String,
    /// Texts per HTTP request.
    pub batch_size: usize,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl OllamaConfig {
    /// Reads `DAILYPAPER_EMBEDDING_{URL,MODEL,BATCH_SIZE,TIMEOUT_MS}` over defaults.
    pub fn from_env() -> EmbeddingResult<Self> {
        let mut config = Self::default();
        if let Some(raw) = env_value("DAILYPAPER_EMBEDDING_URL") {
            Url::parse(&raw).map_err(|e| {
                EmbeddingError::Config(format!("invalid DAILYPAPER_EMBEDDING_URL {raw}: {e}"))
            })?;
            config.url = raw;
        }
        if let Some(model) = env_value("DAILYPAPER_EMBEDDING_MODEL") {
            config.model = model;
        }
        if let Some(size) = env_parse::<usize>("DAILYPAPER_EMBEDDING_BATCH_SIZE") {
            config.batch_size = size.max(1);
        }
        if let Some(ms) = env_parse::<u64>("DAILYPAPER_EMBEDDING_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

/// Ollama `/api/embed` client.
#[derive(Debug, Clone)]
pub struct OllamaEmbedding {
    config: OllamaConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Option<Vec<Vec<f32>>>,
}

impl OllamaEmbedding {
    pub fn new(config: OllamaConfig) -> EmbeddingResult<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn embed_chunk(&self, chunk: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let resp = self
            .client
            .post(&self.config.url)
            .json(&EmbedRequest {
                model: &self.config.model,
                input: chunk,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        let vectors = parsed.embeddings.ok_or_else(|| {
            EmbeddingError::InvalidResponse("missing 'embeddings' field".to_string())
        })?;
        if vectors.len() != chunk.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: chunk.len(),
                actual: vectors.len(),
            });
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size.max(1)) {
            debug!(model = %self.config.model, size = chunk.len(), "embedding batch");
            out.extend(self.embed_chunk(chunk).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
