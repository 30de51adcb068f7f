use crate::chunking::{build_page_chunks, ensure_unique_chunk_ids, ChunkingConfig};
use crate::extractor::TextExtractor;
use crate::normalizer::normalize_text;
use crate::{Chunk, IngestError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// PDF files directly inside `folder`, sorted by path.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

fn document_names(path: &Path) -> Result<(String, String), IngestError> {
    let missing = || IngestError::MissingFileName(path.display().to_string());
    let name = path.file_name().and_then(|name| name.to_str()).ok_or_else(missing)?;
    let stem = path.file_stem().and_then(|stem| stem.to_str()).ok_or_else(missing)?;
    Ok((name.to_string(), stem.to_string()))
}

/// Extracts, normalizes and chunks one document, pages in order.
pub async fn chunk_document<X>(
    extractor: &X,
    path: &Path,
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, IngestError>
where
    X: TextExtractor + ?Sized,
{
    let (name, stem) = document_names(path)?;
    let pages = extractor.extract_pages(path).await?;

    let mut chunks = Vec::new();
    for page in &pages {
        let normalized = normalize_text(&page.text);
        chunks.extend(build_page_chunks(&name, &stem, page.page_number, &normalized, config));
    }

    debug!(document = %name, pages = pages.len(), chunks = chunks.len(), "chunked document");
    Ok(chunks)
}

/// Chunks every document in discovery order. The first unreadable document
/// aborts the whole run.
pub async fn ingest_documents<X>(
    extractor: &X,
    files: &[PathBuf],
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, IngestError>
where
    X: TextExtractor + ?Sized,
{
    config.validate()?;

    let mut chunks = Vec::new();
    for path in files {
        chunks.extend(chunk_document(extractor, path, config).await?);
    }

    ensure_unique_chunk_ids(&chunks)?;
    info!(documents = files.len(), chunks = chunks.len(), "ingested documents");
    Ok(chunks)
}

pub async fn ingest_folder<X>(
    extractor: &X,
    folder: &Path,
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, IngestError>
where
    X: TextExtractor + ?Sized,
{
    let files = discover_pdf_files(folder);
    if files.is_empty() {
        return Err(IngestError::NoInput(folder.to_path_buf()));
    }
    ingest_documents(extractor, &files, config).await
}
