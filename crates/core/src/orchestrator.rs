//! Resumable index build: documents -> chunk file -> embedded batches -> store.
//!
//! Two durable checkpoints make a rerun cheap and deterministic. The chunk
//! file pins the output of extraction and chunking; once it exists it is
//! loaded instead of re-derived. The state file counts committed batches and
//! is rewritten after every successful upsert, so an interrupted build resumes
//! at the first uncommitted batch. Point ids are positional, so any rerun over
//! the same chunk file writes the same ids.
//!
//! One writer per collection is assumed; concurrent builds against the same
//! collection are unsupported.

use crate::chunk_file::{digest_file, read_chunk_file, write_chunk_file};
use crate::config::IndexSettings;
use crate::embeddings::Embedder;
use crate::extractor::TextExtractor;
use crate::ingest::ingest_folder;
use crate::models::{point_id, Chunk};
use crate::state::{clear_state, load_state, save_state, Checkpoint, JobPhase, JobState};
use crate::traits::VectorStore;
use crate::{IndexError, SearchError};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub chunk_count: usize,
    pub chunks_loaded_from_file: bool,
    pub dimensions: usize,
    pub total_batches: usize,
    pub start_batch: usize,
    pub batches_committed: usize,
}

pub struct IndexBuilder<X, E, S>
where
    X: TextExtractor,
    E: Embedder,
    S: VectorStore,
{
    settings: IndexSettings,
    extractor: X,
    embedder: E,
    store: S,
}

impl<X, E, S> IndexBuilder<X, E, S>
where
    X: TextExtractor,
    E: Embedder,
    S: VectorStore,
{
    pub fn new(settings: IndexSettings, extractor: X, embedder: E, store: S) -> Self {
        Self {
            settings,
            extractor,
            embedder,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Forgets committed batches so the next run starts from batch 0.
    pub fn reset_progress(&self) -> Result<bool, IndexError> {
        clear_state(&self.settings.state_file_path())
    }

    /// Drops the collection, the checkpoint and the chunk file, so the next
    /// run rebuilds everything and no point from an earlier corpus survives.
    pub async fn discard(&self) -> Result<(), IndexError> {
        self.wait_for_store().await?;
        self.store.delete_collection().await?;
        self.reset_progress()?;

        let chunk_path = self.settings.chunk_file_path();
        match std::fs::remove_file(&chunk_path) {
            Ok(()) => info!(path = %chunk_path.display(), "removed chunk file"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }
        info!(collection = self.store.collection(), "discarded previous build");
        Ok(())
    }

    pub async fn run(&self) -> Result<IndexReport, IndexError> {
        self.settings.validate()?;

        let (chunks, chunks_loaded_from_file) = self.load_or_build_chunks().await?;
        if chunks.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }
        let chunk_digest = digest_file(&self.settings.chunk_file_path())?;

        self.wait_for_store().await?;

        let dimensions = self.embedder.probe_dimensions(&chunks[0].text).await?;

        let batch_size = self.settings.batch_size;
        let total_batches = chunks.len().div_ceil(batch_size);
        let mut state = self.resume_state(&chunk_digest, chunks.len(), total_batches, dimensions)?;

        let created = self.store.ensure_collection(dimensions).await?;
        let mut start_batch = state.resume_batch(batch_size).min(total_batches);
        if created && start_batch > 0 {
            warn!(
                collection = self.store.collection(),
                start_batch, "collection was missing, committed batches are lost; starting over"
            );
            start_batch = 0;
        }
        state.cursor = Checkpoint {
            last_completed_batch: start_batch,
            total_batches,
        };
        state.batch_size = Some(batch_size);
        state.dimensions = Some(dimensions);
        state.collection = Some(self.store.collection().to_string());

        let mut report = IndexReport {
            chunk_count: chunks.len(),
            chunks_loaded_from_file,
            dimensions,
            total_batches,
            start_batch,
            batches_committed: 0,
        };

        if state.cursor.is_complete() {
            state.phase = JobPhase::Complete;
            save_state(&self.settings.state_file_path(), &state)?;
            info!(
                collection = self.store.collection(),
                total_batches, "all batches already committed, nothing to do"
            );
            return Ok(report);
        }

        if start_batch > 0 {
            info!(start_batch, total_batches, "resuming from checkpoint");
        }

        for batch in start_batch..total_batches {
            self.index_batch(&chunks, batch, dimensions).await?;
            state.advance(batch);
            save_state(&self.settings.state_file_path(), &state)?;
            report.batches_committed += 1;
            info!(
                batch = batch + 1,
                total_batches,
                collection = self.store.collection(),
                "committed batch"
            );
        }

        info!(
            chunks = chunks.len(),
            batches = report.batches_committed,
            "index build complete"
        );
        Ok(report)
    }

    async fn load_or_build_chunks(&self) -> Result<(Vec<Chunk>, bool), IndexError> {
        let chunk_path = self.settings.chunk_file_path();
        if chunk_path.exists() {
            let chunks = read_chunk_file(&chunk_path)?;
            info!(path = %chunk_path.display(), chunks = chunks.len(), "loaded existing chunk file");
            return Ok((chunks, true));
        }

        let chunks = ingest_folder(&self.extractor, &self.settings.raw_dir, self.settings.chunking()).await?;
        if chunks.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }
        write_chunk_file(&chunk_path, &chunks)?;
        info!(path = %chunk_path.display(), chunks = chunks.len(), "wrote chunk file");
        Ok((chunks, false))
    }

    async fn wait_for_store(&self) -> Result<(), IndexError> {
        self.settings
            .connectivity_retry
            .run("vector store connectivity", |_| self.store.ping())
            .await
            .map_err(|exhausted| IndexError::Connectivity {
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            })
    }

    fn resume_state(
        &self,
        chunk_digest: &str,
        chunk_count: usize,
        total_batches: usize,
        dimensions: usize,
    ) -> Result<JobState, IndexError> {
        let state_path = self.settings.state_file_path();
        let Some(mut state) = load_state(&state_path)? else {
            let mut state = JobState::new(
                total_batches,
                self.settings.batch_size,
                chunk_count,
                chunk_digest.to_string(),
            );
            state.collection = Some(self.store.collection().to_string());
            save_state(&state_path, &state)?;
            return Ok(state);
        };

        let stale = state.chunk_count.is_some_and(|count| count != chunk_count)
            || state
                .chunk_file_sha256
                .as_deref()
                .is_some_and(|digest| digest != chunk_digest)
            || (state.batch_size.is_none() && state.cursor.total_batches != total_batches);
        if stale {
            return Err(IndexError::State(format!(
                "{} does not match the current chunk file; restart the build",
                state_path.display()
            )));
        }

        if let Some(recorded) = state
            .collection
            .as_deref()
            .filter(|recorded| *recorded != self.store.collection())
        {
            return Err(IndexError::State(format!(
                "{} tracks collection {recorded}, not {}; restart the build",
                state_path.display(),
                self.store.collection()
            )));
        }

        if let Some(recorded) = state.dimensions.filter(|recorded| *recorded != dimensions) {
            return Err(IndexError::State(format!(
                "embedding size changed from {recorded} to {dimensions} since the build started; restart the build"
            )));
        }

        state.chunk_count = Some(chunk_count);
        state.chunk_file_sha256 = Some(chunk_digest.to_string());
        Ok(state)
    }

    async fn index_batch(
        &self,
        chunks: &[Chunk],
        batch: usize,
        dimensions: usize,
    ) -> Result<(), IndexError> {
        let batch_size = self.settings.batch_size;
        let begin = batch * batch_size;
        let end = (begin + batch_size).min(chunks.len());
        let slice = &chunks[begin..end];

        let texts = slice.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
        let vectors = self.embedder.encode(&texts).await?;
        if vectors.len() != slice.len() {
            return Err(SearchError::Embedding(format!(
                "model {} returned {} vectors for {} texts",
                self.embedder.model_name(),
                vectors.len(),
                slice.len()
            ))
            .into());
        }
        if let Some(vector) = vectors.iter().find(|vector| vector.len() != dimensions) {
            return Err(SearchError::DimensionMismatch {
                collection: self.store.collection().to_string(),
                expected: dimensions,
                actual: vector.len(),
            }
            .into());
        }

        let ids = (begin..end).map(point_id).collect::<Vec<_>>();
        self.settings
            .upsert_retry
            .run("upsert", |_| self.store.upsert(&ids, &vectors, slice))
            .await
            .map_err(|exhausted| IndexError::Upsert {
                batch,
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::extractor::Page;
    use crate::models::IngestionOptions;
    use crate::retry::RetryPolicy;
    use crate::state::JobPhase;
    use crate::stores::InMemoryVectorStore;
    use crate::{IngestError, ScoredChunk};
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    #[derive(Clone, Default)]
    struct CountingExtractor {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextExtractor for CountingExtractor {
        async fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            Ok((1..=3)
                .map(|page_number| Page {
                    page_number,
                    text: format!(
                        "{stem} policy page {page_number} covers enrolment deadlines refunds appeals and conduct rules"
                    ),
                })
                .collect())
        }
    }

    /// Wraps the in-memory store; fails pings and chosen upserts on demand.
    struct FlakyStore {
        inner: InMemoryVectorStore,
        ping_failures: AtomicUsize,
        fail_upsert_from_id: Option<u64>,
        upsert_failures: AtomicUsize,
        upsert_calls: AtomicUsize,
    }

    impl FlakyStore {
        fn new(inner: InMemoryVectorStore) -> Self {
            Self {
                inner,
                ping_failures: AtomicUsize::new(0),
                fail_upsert_from_id: None,
                upsert_failures: AtomicUsize::new(0),
                upsert_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VectorStore for FlakyStore {
        fn collection(&self) -> &str {
            self.inner.collection()
        }

        async fn ping(&self) -> Result<(), SearchError> {
            if self.ping_failures.load(Ordering::SeqCst) > 0 {
                self.ping_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(SearchError::NotReady("connection refused".to_string()));
            }
            self.inner.ping().await
        }

        async fn ensure_collection(&self, dimensions: usize) -> Result<bool, SearchError> {
            self.inner.ensure_collection(dimensions).await
        }

        async fn upsert(
            &self,
            ids: &[u64],
            vectors: &[Vec<f32>],
            payloads: &[Chunk],
        ) -> Result<(), SearchError> {
            self.upsert_calls.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .fail_upsert_from_id
                .is_some_and(|from| ids.iter().any(|id| *id >= from));
            if failing && self.upsert_failures.load(Ordering::SeqCst) > 0 {
                self.upsert_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(SearchError::BackendResponse {
                    backend: "flaky".to_string(),
                    details: "503 Service Unavailable".to_string(),
                });
            }
            self.inner.upsert(ids, vectors, payloads).await
        }

        async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, SearchError> {
            self.inner.search(vector, limit).await
        }

        async fn delete_collection(&self) -> Result<(), SearchError> {
            self.inner.delete_collection().await
        }
    }

    fn workspace(documents: &[&str]) -> Result<(TempDir, IndexSettings), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let raw_dir = dir.path().join("raw");
        fs::create_dir_all(&raw_dir)?;
        for name in documents {
            fs::write(raw_dir.join(name), b"%PDF-1.4")?;
        }

        let settings = IndexSettings {
            raw_dir,
            processed_dir: dir.path().join("processed"),
            ingestion: IngestionOptions {
                chunk_words: 6,
                chunk_overlap: 2,
            },
            batch_size: 4,
            connectivity_retry: RetryPolicy::immediate(3),
            upsert_retry: RetryPolicy::immediate(3),
        };
        Ok((dir, settings))
    }

    fn builder(
        settings: &IndexSettings,
        extractor: &CountingExtractor,
        store: FlakyStore,
    ) -> IndexBuilder<CountingExtractor, CharacterNgramEmbedder, FlakyStore> {
        IndexBuilder::new(
            settings.clone(),
            extractor.clone(),
            CharacterNgramEmbedder { dimensions: 32 },
            store,
        )
    }

    fn fresh_store() -> FlakyStore {
        FlakyStore::new(InMemoryVectorStore::new("policies"))
    }

    #[tokio::test]
    async fn builds_positional_ids_over_every_chunk() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["fees.pdf", "leave.pdf"])?;
        let extractor = CountingExtractor::default();
        let builder = builder(&settings, &extractor, fresh_store());

        let report = builder.run().await?;
        let chunks = read_chunk_file(&settings.chunk_file_path())?;
        let points = builder.store().inner.points()?;

        assert!(!report.chunks_loaded_from_file);
        assert_eq!(report.chunk_count, chunks.len());
        assert_eq!(report.total_batches, chunks.len().div_ceil(4));
        assert_eq!(report.batches_committed, report.total_batches);
        assert_eq!(points.len(), chunks.len());
        for (position, point) in points.iter().enumerate() {
            assert_eq!(point.id, position as u64 + 1);
            assert_eq!(point.payload, chunks[position]);
            assert_eq!(point.vector.len(), 32);
        }
        assert_eq!(chunks[0].chunk_id, "fees_p1_c0");

        let state = load_state(&settings.state_file_path())?.expect("state written");
        assert_eq!(state.phase, JobPhase::Complete);
        assert_eq!(state.cursor.last_completed_batch, report.total_batches);
        Ok(())
    }

    #[tokio::test]
    async fn rebuild_from_chunk_file_reproduces_the_collection() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["conduct.pdf"])?;
        let extractor = CountingExtractor::default();

        let first = builder(&settings, &extractor, fresh_store());
        first.run().await?;
        let first_points = first.store().inner.points()?;

        first.reset_progress()?;
        let second = builder(&settings, &extractor, fresh_store());
        let report = second.run().await?;

        assert!(report.chunks_loaded_from_file);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.store().inner.points()?, first_points);
        Ok(())
    }

    #[tokio::test]
    async fn failed_batch_resumes_exactly_there() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["appeals.pdf", "housing.pdf"])?;
        let extractor = CountingExtractor::default();

        let uninterrupted = builder(&settings, &extractor, fresh_store());
        uninterrupted.run().await?;
        let expected = uninterrupted.store().inner.points()?;
        uninterrupted.reset_progress()?;

        // Batch index 2 covers ids 9..=12 and fails on all three attempts.
        let mut flaky = fresh_store();
        flaky.fail_upsert_from_id = Some(9);
        flaky.upsert_failures = AtomicUsize::new(3);
        let interrupted = builder(&settings, &extractor, flaky);

        match interrupted.run().await {
            Err(IndexError::Upsert { batch, attempts, .. }) => {
                assert_eq!(batch, 2);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected upsert failure, got {other:?}"),
        }
        let state = load_state(&settings.state_file_path())?.expect("state kept");
        assert_eq!(state.cursor.last_completed_batch, 2);
        assert_eq!(interrupted.store().inner.points()?.len(), 8);

        let FlakyStore { inner, .. } = interrupted.store;
        let resumed = builder(&settings, &extractor, FlakyStore::new(inner));
        let report = resumed.run().await?;

        assert_eq!(report.start_batch, 2);
        assert_eq!(report.batches_committed, report.total_batches - 2);
        assert_eq!(resumed.store().inner.points()?, expected);
        Ok(())
    }

    #[tokio::test]
    async fn transient_upsert_failure_is_retried() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["grading.pdf"])?;
        let extractor = CountingExtractor::default();
        let mut flaky = fresh_store();
        flaky.fail_upsert_from_id = Some(1);
        flaky.upsert_failures = AtomicUsize::new(2);

        let builder = builder(&settings, &extractor, flaky);
        let report = builder.run().await?;

        assert_eq!(
            builder.store().upsert_calls.load(Ordering::SeqCst),
            report.total_batches + 2
        );
        Ok(())
    }

    #[tokio::test]
    async fn completed_checkpoint_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["library.pdf"])?;
        let extractor = CountingExtractor::default();
        let first = builder(&settings, &extractor, fresh_store());
        first.run().await?;

        let FlakyStore { inner, .. } = first.store;
        let second = builder(&settings, &extractor, FlakyStore::new(inner));
        let report = second.run().await?;

        assert_eq!(report.batches_committed, 0);
        assert_eq!(report.start_batch, report.total_batches);
        assert_eq!(second.store().upsert_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn store_that_never_answers_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["library.pdf"])?;
        let extractor = CountingExtractor::default();
        let store = fresh_store();
        store.ping_failures.store(10, Ordering::SeqCst);

        let builder = builder(&settings, &extractor, store);
        match builder.run().await {
            Err(IndexError::Connectivity { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(source, SearchError::NotReady(_)));
            }
            other => panic!("expected connectivity failure, got {other:?}"),
        }
        assert!(settings.chunk_file_path().exists());
        assert!(!settings.state_file_path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn store_that_comes_up_late_is_awaited() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["library.pdf"])?;
        let extractor = CountingExtractor::default();
        let store = fresh_store();
        store.ping_failures.store(2, Ordering::SeqCst);

        builder(&settings, &extractor, store).run().await?;
        Ok(())
    }

    #[tokio::test]
    async fn missing_documents_stop_before_the_store() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&[])?;
        let extractor = CountingExtractor::default();
        let builder = builder(&settings, &extractor, fresh_store());

        assert!(matches!(
            builder.run().await,
            Err(IndexError::Ingest(IngestError::NoInput(_)))
        ));
        assert_eq!(builder.store().inner.dimensions()?, None);
        Ok(())
    }

    #[tokio::test]
    async fn empty_chunk_file_is_an_empty_corpus() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["blank.pdf"])?;
        fs::create_dir_all(&settings.processed_dir)?;
        fs::write(settings.chunk_file_path(), "")?;

        let extractor = CountingExtractor::default();
        let builder = builder(&settings, &extractor, fresh_store());
        assert!(matches!(builder.run().await, Err(IndexError::EmptyCorpus)));
        Ok(())
    }

    #[tokio::test]
    async fn changed_chunk_file_invalidates_checkpoint() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["library.pdf"])?;
        let extractor = CountingExtractor::default();
        builder(&settings, &extractor, fresh_store()).run().await?;

        let mut chunks = read_chunk_file(&settings.chunk_file_path())?;
        chunks.pop();
        write_chunk_file(&settings.chunk_file_path(), &chunks)?;

        let result = builder(&settings, &extractor, fresh_store()).run().await;
        assert!(matches!(result, Err(IndexError::State(_))));
        Ok(())
    }

    #[tokio::test]
    async fn existing_collection_of_other_size_fails_fast() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["library.pdf"])?;
        let extractor = CountingExtractor::default();
        let inner = InMemoryVectorStore::new("policies");
        inner.ensure_collection(768).await?;

        let builder = builder(&settings, &extractor, FlakyStore::new(inner));
        assert!(matches!(
            builder.run().await,
            Err(IndexError::Store(SearchError::DimensionMismatch { expected: 768, actual: 32, .. }))
        ));
        assert_eq!(builder.store().upsert_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn batch_size_change_keeps_ids_stable() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut settings) = workspace(&["appeals.pdf", "housing.pdf"])?;
        let extractor = CountingExtractor::default();

        let reference = builder(&settings, &extractor, fresh_store());
        reference.run().await?;
        let expected = reference.store().inner.points()?;
        reference.reset_progress()?;

        let mut flaky = fresh_store();
        flaky.fail_upsert_from_id = Some(9);
        flaky.upsert_failures = AtomicUsize::new(3);
        let interrupted = builder(&settings, &extractor, flaky);
        assert!(interrupted.run().await.is_err());

        settings.batch_size = 3;
        let FlakyStore { inner, .. } = interrupted.store;
        let resumed = builder(&settings, &extractor, FlakyStore::new(inner));
        let report = resumed.run().await?;

        // 8 chunks committed under size 4 -> batch 2 under size 3 (ids 7..).
        assert_eq!(report.start_batch, 2);
        assert_eq!(resumed.store().inner.points()?, expected);
        Ok(())
    }

    #[tokio::test]
    async fn checkpoint_from_another_collection_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["library.pdf"])?;
        let extractor = CountingExtractor::default();
        builder(&settings, &extractor, FlakyStore::new(InMemoryVectorStore::new("old")))
            .run()
            .await?;

        let renamed = builder(&settings, &extractor, FlakyStore::new(InMemoryVectorStore::new("new")));
        assert!(matches!(renamed.run().await, Err(IndexError::State(_))));
        assert_eq!(renamed.store().inner.points()?.len(), 0);
        assert_eq!(renamed.store().inner.dimensions()?, None);
        Ok(())
    }

    #[tokio::test]
    async fn vanished_collection_is_rebuilt_from_the_first_batch() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["appeals.pdf", "housing.pdf"])?;
        let extractor = CountingExtractor::default();
        let first = builder(&settings, &extractor, fresh_store());
        first.run().await?;
        let expected = first.store().inner.points()?;

        let FlakyStore { inner, .. } = first.store;
        inner.delete_collection().await?;
        let second = builder(&settings, &extractor, FlakyStore::new(inner));
        let report = second.run().await?;

        assert_eq!(report.start_batch, 0);
        assert_eq!(report.batches_committed, report.total_batches);
        assert_eq!(second.store().inner.points()?, expected);
        Ok(())
    }

    #[tokio::test]
    async fn discard_leaves_no_points_from_the_larger_corpus() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, settings) = workspace(&["appeals.pdf", "housing.pdf"])?;
        let extractor = CountingExtractor::default();
        let first = builder(&settings, &extractor, fresh_store());
        first.run().await?;
        assert_eq!(first.store().inner.points()?.len(), 18);

        fs::remove_file(settings.raw_dir.join("housing.pdf"))?;
        let FlakyStore { inner, .. } = first.store;
        let second = builder(&settings, &extractor, FlakyStore::new(inner));
        second.discard().await?;
        assert!(!settings.chunk_file_path().exists());
        assert!(!settings.state_file_path().exists());

        let report = second.run().await?;
        let points = second.store().inner.points()?;
        assert!(!report.chunks_loaded_from_file);
        assert_eq!(report.chunk_count, 9);
        assert_eq!(points.len(), 9);
        assert!(points.iter().all(|point| point.payload.source_document == "appeals.pdf"));
        Ok(())
    }
}
