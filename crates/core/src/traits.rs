use crate::{Chunk, ScoredChunk, SearchError};
use async_trait::async_trait;

/// A named, fixed-dimensionality similarity index (cosine distance).
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn collection(&self) -> &str;

    /// Cheap liveness call, used while waiting for the service at startup.
    async fn ping(&self) -> Result<(), SearchError>;

    /// Creates the collection if missing and returns `true` when it did.
    /// An existing collection with a different vector size is a
    /// [`SearchError::DimensionMismatch`].
    async fn ensure_collection(&self, dimensions: usize) -> Result<bool, SearchError>;

    /// Inserts or replaces points by id. `ids`, `vectors` and `payloads` are
    /// positionally aligned. Not atomic across the batch.
    async fn upsert(
        &self,
        ids: &[u64],
        vectors: &[Vec<f32>],
        payloads: &[Chunk],
    ) -> Result<(), SearchError>;

    /// Up to `limit` nearest points, best score first. Empty when the
    /// collection is empty or absent.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, SearchError>;

    async fn delete_collection(&self) -> Result<(), SearchError>;
}

pub(crate) fn check_aligned(
    ids: &[u64],
    vectors: &[Vec<f32>],
    payloads: &[Chunk],
) -> Result<(), SearchError> {
    if ids.len() != vectors.len() || ids.len() != payloads.len() {
        return Err(SearchError::Request(format!(
            "upsert sequences are misaligned: {} ids, {} vectors, {} payloads",
            ids.len(),
            vectors.len(),
            payloads.len()
        )));
    }
    Ok(())
}
