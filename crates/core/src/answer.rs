//! The request boundary around retrieval. Composing the answer text is
//! delegated to an [`AnswerComposer`] (a chat model in production).

use crate::embeddings::Embedder;
use crate::retriever::Retriever;
use crate::traits::VectorStore;
use crate::{Answer, Citation, ScoredChunk, SearchError};
use async_trait::async_trait;
use tracing::info;

pub const NOT_FOUND_ANSWER: &str = "I could not find that in the documents.";

const SYSTEM_PROMPT: &str = "You are a university policy assistant. Answer only using the provided \
sources. If the sources do not contain the answer, say you cannot find it in the documents. \
Always include citations in the form [#].";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerPrompt {
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait AnswerComposer: Send + Sync {
    async fn compose(&self, question: &str, hits: &[ScoredChunk]) -> Result<Answer, SearchError>;
}

/// Numbered source blocks for the prompt, and the matching citations.
pub fn format_contexts(hits: &[ScoredChunk]) -> (String, Vec<Citation>) {
    let mut blocks = Vec::with_capacity(hits.len());
    let mut citations = Vec::with_capacity(hits.len());

    for (index, hit) in hits.iter().enumerate() {
        let chunk = &hit.payload;
        blocks.push(format!(
            "[{}] Source: {} | Page: {} | Chunk: {}\n{}",
            index + 1,
            chunk.source_document,
            chunk.page_number,
            chunk.chunk_id,
            chunk.text
        ));
        citations.push(chunk.citation());
    }

    (blocks.join("\n\n"), citations)
}

pub fn build_prompt(question: &str, context: &str) -> AnswerPrompt {
    AnswerPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "Question: {question}\n\nSources:\n{context}\n\nReturn a concise answer with citations."
        ),
    }
}

/// Answers `question` from the indexed corpus.
///
/// Blank questions are rejected before retrieval. No hits is a normal
/// outcome and yields [`NOT_FOUND_ANSWER`] without calling the composer.
pub async fn ask<E, S, C>(
    question: &str,
    retriever: &Retriever<E, S>,
    composer: &C,
    top_k: usize,
) -> Result<Answer, SearchError>
where
    E: Embedder,
    S: VectorStore,
    C: AnswerComposer + ?Sized,
{
    if question.trim().is_empty() {
        return Err(SearchError::Request("question is required".to_string()));
    }

    let hits = retriever.retrieve(question, top_k).await?;
    if hits.is_empty() {
        info!("no relevant chunks for question");
        return Ok(Answer {
            answer: NOT_FOUND_ANSWER.to_string(),
            citations: Vec::new(),
        });
    }

    composer.compose(question, &hits).await
}
