use crate::traits::{check_aligned, VectorStore};
use crate::{Chunk, IndexedPoint, ScoredChunk, SearchError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct Collection {
    dimensions: usize,
    points: BTreeMap<u64, (Vec<f32>, Chunk)>,
}

/// In-process store with the same contract as a remote collection.
/// Used for offline index builds and tests.
#[derive(Debug)]
pub struct InMemoryVectorStore {
    collection: String,
    state: Mutex<Option<Collection>>,
}

impl InMemoryVectorStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            state: Mutex::new(None),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Collection>>, SearchError> {
        self.state
            .lock()
            .map_err(|_| SearchError::Request("in-memory store lock poisoned".to_string()))
    }

    /// All stored points ordered by id.
    pub fn points(&self) -> Result<Vec<IndexedPoint>, SearchError> {
        Ok(self
            .lock()?
            .as_ref()
            .map(|collection| {
                collection
                    .points
                    .iter()
                    .map(|(id, (vector, chunk))| IndexedPoint {
                        id: *id,
                        vector: vector.clone(),
                        payload: chunk.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn dimensions(&self) -> Result<Option<usize>, SearchError> {
        Ok(self.lock()?.as_ref().map(|collection| collection.dimensions))
    }
}

fn cosine(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(l, r)| l * r).sum::<f32>();
    let left_norm = left.iter().map(|v| v * v).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|v| v * v).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ping(&self) -> Result<(), SearchError> {
        self.lock().map(|_| ())
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<bool, SearchError> {
        let mut state = self.lock()?;
        match state.as_ref() {
            Some(existing) if existing.dimensions != dimensions => {
                Err(SearchError::DimensionMismatch {
                    collection: self.collection.clone(),
                    expected: existing.dimensions,
                    actual: dimensions,
                })
            }
            Some(_) => Ok(false),
            None => {
                *state = Some(Collection {
                    dimensions,
                    points: BTreeMap::new(),
                });
                Ok(true)
            }
        }
    }

    async fn upsert(
        &self,
        ids: &[u64],
        vectors: &[Vec<f32>],
        payloads: &[Chunk],
    ) -> Result<(), SearchError> {
        check_aligned(ids, vectors, payloads)?;
        let mut state = self.lock()?;
        let collection = state.as_mut().ok_or_else(|| SearchError::BackendResponse {
            backend: "memory".to_string(),
            details: format!("collection {} does not exist", self.collection),
        })?;

        for ((id, vector), payload) in ids.iter().zip(vectors).zip(payloads) {
            if vector.len() != collection.dimensions {
                return Err(SearchError::DimensionMismatch {
                    collection: self.collection.clone(),
                    expected: collection.dimensions,
                    actual: vector.len(),
                });
            }
            collection
                .points
                .insert(*id, (vector.clone(), payload.clone()));
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, SearchError> {
        let state = self.lock()?;
        let Some(collection) = state.as_ref() else {
            return Ok(Vec::new());
        };
        if !collection.points.is_empty() && vector.len() != collection.dimensions {
            return Err(SearchError::DimensionMismatch {
                collection: self.collection.clone(),
                expected: collection.dimensions,
                actual: vector.len(),
            });
        }

        let mut scored = collection
            .points
            .iter()
            .map(|(id, (stored, chunk))| (*id, cosine(vector, stored), chunk))
            .collect::<Vec<_>>();
        // Best first; equal scores keep id order.
        scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, score, chunk)| ScoredChunk {
                score,
                payload: chunk.clone(),
            })
            .collect())
    }

    async fn delete_collection(&self) -> Result<(), SearchError> {
        *self.lock()? = None;
        Ok(())
    }
}
