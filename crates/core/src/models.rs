use serde::{Deserialize, Serialize};

/// A retrieval unit: one word window of one page, with its provenance.
///
/// Serialized field names are shared by the chunk file and the vector-store
/// payload, so a payload read back from the store decodes into the same type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(rename = "source_pdf", alias = "source_document")]
    pub source_document: String,
    pub page_number: u32,
    pub chunk_id: String,
}

impl Chunk {
    pub fn citation(&self) -> Citation {
        Citation {
            source_document: self.source_document.clone(),
            page_number: self.page_number,
            chunk_id: self.chunk_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: Chunk,
}

/// A search hit reconstructed from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub score: f32,
    pub payload: Chunk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(rename = "source_pdf")]
    pub source_document: String,
    pub page_number: u32,
    pub chunk_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

/// Point ids are positional: 1 + the chunk's position in the full ordered list.
pub fn point_id(absolute_position: usize) -> u64 {
    absolute_position as u64 + 1
}

#[derive(Debug, Clone, Copy)]
pub struct IngestionOptions {
    pub chunk_words: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_words: 350,
            chunk_overlap: 50,
        }
    }
}
