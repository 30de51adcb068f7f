//! Text embedding backends.
//!
//! Every backend returns one L2-normalized vector per input, in input order,
//! so cosine similarity in the vector store reduces to a dot product.

use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;

    /// Output size, inferred by encoding a single probe text.
    async fn probe_dimensions(&self, probe_text: &str) -> Result<usize, SearchError> {
        let vectors = self.encode(&[probe_text.to_string()]).await?;
        match vectors.first() {
            Some(vector) if !vector.is_empty() => Ok(vector.len()),
            _ => Err(SearchError::Embedding(format!(
                "model {} returned no vector for the probe text",
                self.model_name()
            ))),
        }
    }
}

pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

/// Hashed character-trigram embedder. Deterministic and offline.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        // Texts shorter than a trigram hash as a single token.
        let tokens = if chars.len() < 3 {
            vec![lowered.clone()]
        } else {
            chars
                .windows(3)
                .map(|window| window.iter().collect::<String>())
                .collect::<Vec<_>>()
        };
        for token in tokens {
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        "char-trigram"
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub micro_batch_size: usize,
    pub timeout: Duration,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "BAAI/bge-base-en-v1.5".to_string(),
            base_url: "http://localhost:8080/v1".to_string(),
            api_key: None,
            micro_batch_size: 16,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Client for an OpenAI-compatible `/embeddings` endpoint serving the named model.
///
/// Inputs are sent in micro-batches so a large indexing batch never has to be
/// held by the model server at once.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    micro_batch_size: usize,
}

impl HttpEmbedder {
    pub fn new(settings: EmbeddingSettings) -> Result<Self, SearchError> {
        if settings.model.trim().is_empty() {
            return Err(SearchError::Request("missing embedding model name".to_string()));
        }
        let base = url::Url::parse(settings.base_url.trim_end_matches('/'))?;
        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base.as_str().trim_end_matches('/')),
            model: settings.model,
            api_key: settings.api_key.filter(|key| !key.trim().is_empty()),
            micro_batch_size: settings.micro_batch_size.max(1),
        })
    }

    async fn embed_micro_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(SearchError::BackendResponse {
                backend: "embeddings".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        parsed.into_vectors(inputs.len())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for inputs in texts.chunks(self.micro_batch_size) {
            debug!(model = %self.model, inputs = inputs.len(), "embedding micro-batch");
            vectors.extend(self.embed_micro_batch(inputs).await?);
        }
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbeddingResponse {
    fn into_vectors(mut self, expected_len: usize) -> Result<Vec<Vec<f32>>, SearchError> {
        if self.data.len() != expected_len {
            return Err(SearchError::Embedding(format!(
                "server returned {} embeddings for {} inputs",
                self.data.len(),
                expected_len
            )));
        }

        self.data.sort_by_key(|entry| entry.index);
        let vectors = self
            .data
            .into_iter()
            .map(|entry| {
                let mut vector = entry.embedding;
                l2_normalize(&mut vector);
                vector
            })
            .collect::<Vec<_>>();

        if let Some(first) = vectors.first() {
            let dimensions = first.len();
            if vectors.iter().any(|vector| vector.len() != dimensions) {
                return Err(SearchError::Embedding(
                    "server returned vectors of mixed dimensionality".to_string(),
                ));
            }
        }

        Ok(vectors)
    }
}
