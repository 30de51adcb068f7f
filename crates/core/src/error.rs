use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to extract text from {}: {reason}", .path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("no pdf files found in {}", .0.display())]
    NoInput(PathBuf),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("chunk file line {line}: {reason}")]
    ChunkFile { line: usize, reason: String },

    #[error("duplicate chunk id in corpus: {0}")]
    DuplicateChunkId(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("multimodal OCR failed: {0}")]
    OcrFailed(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("store not available yet: {0}")]
    NotReady(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("collection {collection} has vector size {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] SearchError),

    #[error("corpus produced no chunks to index")]
    EmptyCorpus,

    #[error("vector store unreachable after {attempts} attempts: {source}")]
    Connectivity {
        attempts: usize,
        #[source]
        source: SearchError,
    },

    #[error("upsert of batch {batch} failed after {attempts} attempts: {source}")]
    Upsert {
        batch: usize,
        attempts: usize,
        #[source]
        source: SearchError,
    },

    #[error("index state: {0}")]
    State(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}
