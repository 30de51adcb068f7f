use crate::traits::{check_aligned, VectorStore};
use crate::{Chunk, ScoredChunk, SearchError};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone)]
pub struct QdrantSettings {
    pub url: String,
    pub collection: String,
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "university_policies".to_string(),
        }
    }
}

/// Qdrant over its REST API.
pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(settings: &QdrantSettings) -> Result<Self, SearchError> {
        let endpoint = Url::parse(&settings.url)?;
        if settings.collection.trim().is_empty() {
            return Err(SearchError::Request("collection name is empty".to_string()));
        }

        Ok(Self {
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            collection: settings.collection.clone(),
            client: Client::new(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    /// Configured vector size, or `None` when the collection does not exist.
    async fn collection_vector_size(&self) -> Result<Option<usize>, SearchError> {
        let response = self.client.get(self.collection_url()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let parsed: Value = ensure_success(response).await?.json().await?;
        vector_size_from_info(&parsed).map(Some)
    }
}

async fn ensure_success(response: Response) -> Result<Response, SearchError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(SearchError::BackendResponse {
        backend: "qdrant".to_string(),
        details: format!("{status}: {body}"),
    })
}

fn vector_size_from_info(info: &Value) -> Result<usize, SearchError> {
    let vectors = info
        .pointer("/result/config/params/vectors")
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "qdrant".to_string(),
            details: "collection info has no vector params".to_string(),
        })?;

    vectors
        .get("size")
        .and_then(Value::as_u64)
        .map(|size| size as usize)
        .ok_or_else(|| SearchError::BackendResponse {
            backend: "qdrant".to_string(),
            details: "collection uses named vectors; expected a single unnamed vector".to_string(),
        })
}

fn hits_from_search(parsed: &Value) -> Result<Vec<ScoredChunk>, SearchError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.into_iter()
        .map(|hit| {
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32;
            let payload = hit.get("payload").cloned().unwrap_or(Value::Null);
            let payload: Chunk = serde_json::from_value(payload).map_err(|error| {
                SearchError::BackendResponse {
                    backend: "qdrant".to_string(),
                    details: format!("point {} has a malformed payload: {error}", hit["id"]),
                }
            })?;
            Ok(ScoredChunk { score, payload })
        })
        .collect()
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ping(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .get(format!("{}/collections", self.endpoint))
            .send()
            .await
            .map_err(|error| SearchError::NotReady(error.to_string()))?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<bool, SearchError> {
        if let Some(existing) = self.collection_vector_size().await? {
            if existing != dimensions {
                return Err(SearchError::DimensionMismatch {
                    collection: self.collection.clone(),
                    expected: existing,
                    actual: dimensions,
                });
            }
            debug!(collection = %self.collection, dimensions, "collection already exists");
            return Ok(false);
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": dimensions, "distance": "Cosine" },
            }))
            .send()
            .await?;
        ensure_success(response).await?;
        info!(collection = %self.collection, dimensions, "created collection");
        Ok(true)
    }

    async fn upsert(
        &self,
        ids: &[u64],
        vectors: &[Vec<f32>],
        payloads: &[Chunk],
    ) -> Result<(), SearchError> {
        check_aligned(ids, vectors, payloads)?;
        if ids.is_empty() {
            return Ok(());
        }

        let points = ids
            .iter()
            .zip(vectors)
            .zip(payloads)
            .map(|((id, vector), payload)| -> Result<Value, SearchError> {
                Ok(json!({
                    "id": id,
                    "vector": vector,
                    "payload": serde_json::to_value(payload)?,
                }))
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, SearchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": vector,
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let parsed: Value = ensure_success(response).await?.json().await?;
        hits_from_search(&parsed)
    }

    async fn delete_collection(&self) -> Result<(), SearchError> {
        let response = self.client.delete(self.collection_url()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await?;
        info!(collection = %self.collection, "deleted collection");
        Ok(())
    }
}
