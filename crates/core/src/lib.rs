pub mod answer;
pub mod chunk_file;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod retriever;
pub mod retry;
pub mod state;
pub mod stores;
pub mod traits;

pub use answer::{ask, build_prompt, format_contexts, AnswerComposer, AnswerPrompt, NOT_FOUND_ANSWER};
pub use chunk_file::{digest_file, read_chunk_file, write_chunk_file};
pub use chunking::{build_page_chunks, chunk_text, make_chunk_id, ChunkingConfig};
pub use config::{IndexSettings, DEFAULT_BATCH_SIZE, DEFAULT_TOP_K};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, EmbeddingSettings, HttpEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{IndexError, IngestError, SearchError};
pub use extractor::{LopdfExtractor, OcrEndpointConfig, OcrFallbackExtractor, Page, TextExtractor};
pub use ingest::{discover_pdf_files, ingest_documents, ingest_folder};
pub use models::{point_id, Answer, Chunk, Citation, IndexedPoint, IngestionOptions, ScoredChunk};
pub use normalizer::{normalize_text, normalize_whitespace};
pub use orchestrator::{IndexBuilder, IndexReport};
pub use retriever::Retriever;
pub use retry::{Backoff, RetryExhausted, RetryPolicy};
pub use state::{Checkpoint, JobPhase, JobState};
pub use stores::{InMemoryVectorStore, QdrantSettings, QdrantStore};
pub use traits::VectorStore;
