use crate::embeddings::Embedder;
use crate::traits::VectorStore;
use crate::{ScoredChunk, SearchError};
use tracing::debug;

/// Query-time path: embed the question, return the nearest stored chunks.
pub struct Retriever<E, S>
where
    E: Embedder,
    S: VectorStore,
{
    embedder: E,
    store: S,
}

impl<E, S> Retriever<E, S>
where
    E: Embedder,
    S: VectorStore,
{
    pub fn new(embedder: E, store: S) -> Self {
        Self { embedder, store }
    }

    /// Best-first hits; an empty result means nothing relevant was found.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, SearchError> {
        let vectors = self.embedder.encode(&[query.to_string()]).await?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            SearchError::Embedding(format!(
                "model {} returned no vector for the query",
                self.embedder.model_name()
            ))
        })?;

        let hits = self.store.search(&vector, top_k).await?;
        debug!(top_k, hits = hits.len(), collection = self.store.collection(), "retrieved");
        Ok(hits)
    }
}
