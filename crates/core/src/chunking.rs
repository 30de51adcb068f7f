use crate::error::IngestError;
use crate::models::{Chunk, IngestionOptions};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_words: usize,
    pub overlap: usize,
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_words == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_words must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Words the window advances by; at least one so chunking always terminates.
    pub fn step(&self) -> usize {
        self.chunk_words.saturating_sub(self.overlap).max(1)
    }
}

impl From<IngestionOptions> for ChunkingConfig {
    fn from(value: IngestionOptions) -> Self {
        Self {
            chunk_words: value.chunk_words,
            overlap: value.chunk_overlap,
        }
    }
}

/// Splits `text` on whitespace into windows of `chunk_words` words, consecutive
/// windows sharing `overlap` words.
///
/// Precondition: `chunk_words >= 1`. Callers validate through
/// [`ChunkingConfig::validate`]; this function does not check.
pub fn chunk_text(text: &str, chunk_words: usize, overlap: usize) -> Vec<String> {
    let words = text.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return Vec::new();
    }

    let step = ChunkingConfig {
        chunk_words,
        overlap,
    }
    .step();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_words).min(words.len());
        chunks.push(words[start..end].join(" "));
        start += step;
    }

    chunks
}

pub fn make_chunk_id(document_stem: &str, page_number: u32, chunk_index: usize) -> String {
    format!("{document_stem}_p{page_number}_c{chunk_index}")
}

/// Chunks one normalized page and attaches provenance to every window.
pub fn build_page_chunks(
    source_document: &str,
    document_stem: &str,
    page_number: u32,
    normalized_text: &str,
    config: ChunkingConfig,
) -> Vec<Chunk> {
    chunk_text(normalized_text, config.chunk_words, config.overlap)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            text,
            source_document: source_document.to_string(),
            page_number,
            chunk_id: make_chunk_id(document_stem, page_number, chunk_index),
        })
        .collect()
}

pub fn ensure_unique_chunk_ids(chunks: &[Chunk]) -> Result<(), IngestError> {
    let mut seen = HashSet::with_capacity(chunks.len());
    for chunk in chunks {
        if !seen.insert(chunk.chunk_id.as_str()) {
            return Err(IngestError::DuplicateChunkId(chunk.chunk_id.clone()));
        }
    }
    Ok(())
}
