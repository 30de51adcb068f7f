use crate::error::IngestError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Plain text of one physical page. `page_number` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn extract_pages_blocking(&self, path: &Path) -> Result<Vec<Page>, IngestError> {
        let document = Document::load(path).map_err(|error| IngestError::Extraction {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        let mut pages = Vec::new();
        for (page_number, _page_id) in document.get_pages() {
            // Pages without a decodable text layer still occupy their slot.
            let text = match document.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(error) => {
                    debug!(path = %path.display(), page_number, %error, "page has no extractable text");
                    String::new()
                }
            };
            pages.push(Page { page_number, text });
        }

        Ok(pages)
    }
}

#[async_trait]
impl TextExtractor for LopdfExtractor {
    async fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, IngestError> {
        let owned = path.to_path_buf();
        let extractor = *self;
        tokio::task::spawn_blocking(move || extractor.extract_pages_blocking(&owned))
            .await
            .map_err(|error| IngestError::Extraction {
                path: path.to_path_buf(),
                reason: format!("extraction task failed: {error}"),
            })?
    }
}

#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl OcrEndpointConfig {
    /// Returns `None` for a blank endpoint so callers can pass raw CLI values through.
    pub fn new(endpoint: &str, api_key: Option<&str>) -> Option<Self> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return None;
        }

        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);

        Some(Self {
            endpoint: endpoint.to_string(),
            api_key,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct LlmOcrRequest {
    pdf_base64: String,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrResponse {
    pages: Option<Vec<LlmOcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

/// Lopdf first; scanned documents (unparseable, or with no text on any page)
/// are sent to a multimodal OCR endpoint when one is configured.
pub struct OcrFallbackExtractor {
    primary: LopdfExtractor,
    ocr: Option<OcrEndpointConfig>,
    client: Client,
}

impl OcrFallbackExtractor {
    pub fn new(ocr: Option<OcrEndpointConfig>) -> Self {
        Self {
            primary: LopdfExtractor,
            ocr,
            client: Client::new(),
        }
    }

    async fn extract_with_llm_ocr(
        &self,
        cfg: &OcrEndpointConfig,
        path: &Path,
    ) -> Result<Vec<Page>, IngestError> {
        let pdf = tokio::fs::read(path).await?;
        let payload = LlmOcrRequest {
            pdf_base64: STANDARD.encode(pdf),
            source_path: path.to_string_lossy().to_string(),
        };

        let mut request = self
            .client
            .post(&cfg.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &cfg.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(IngestError::OcrFailed(format!(
                "multimodal OCR request to {} returned {}",
                cfg.endpoint,
                response.status()
            )));
        }

        let payload: LlmOcrResponse = response.json().await?;
        payload_to_pages(&payload, path)
    }
}

#[async_trait]
impl TextExtractor for OcrFallbackExtractor {
    async fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, IngestError> {
        let Some(cfg) = &self.ocr else {
            return self.primary.extract_pages(path).await;
        };

        match self.primary.extract_pages(path).await {
            Ok(pages) if pages.iter().any(|page| !page.text.trim().is_empty()) => Ok(pages),
            Ok(_) => {
                debug!(path = %path.display(), "no text layer, falling back to OCR");
                self.extract_with_llm_ocr(cfg, path).await
            }
            Err(IngestError::Extraction { reason, .. }) => {
                warn!(path = %path.display(), %reason, "pdf parse failed, falling back to OCR");
                self.extract_with_llm_ocr(cfg, path)
                    .await
                    .map_err(|ocr_error| IngestError::Extraction {
                        path: path.to_path_buf(),
                        reason: format!("{reason}; multimodal OCR fallback failed: {ocr_error}"),
                    })
            }
            Err(error) => Err(error),
        }
    }
}

fn payload_to_pages(payload: &LlmOcrResponse, path: &Path) -> Result<Vec<Page>, IngestError> {
    if let Some(listed) = &payload.pages {
        let mut listed = listed
            .iter()
            .enumerate()
            .filter_map(|(index, page)| {
                let text = page.text.as_deref().map(str::trim).unwrap_or_default();
                if text.is_empty() {
                    None
                } else {
                    Some(Page {
                        page_number: page.page.unwrap_or(index as u32 + 1),
                        text: text.to_string(),
                    })
                }
            })
            .collect::<Vec<_>>();

        if !listed.is_empty() {
            listed.sort_by_key(|page| page.page_number);
            return Ok(listed);
        }
    }

    if let Some(raw_text) = &payload.text {
        let pages = raw_text
            .split('\u{000c}')
            .enumerate()
            .map(|(index, chunk)| Page {
                page_number: index as u32 + 1,
                text: chunk.trim().to_string(),
            })
            .collect::<Vec<_>>();

        if pages.iter().any(|page| !page.text.is_empty()) {
            return Ok(pages);
        }
    }

    Err(IngestError::OcrFailed(format!(
        "multimodal OCR response was empty for {}",
        path.display()
    )))
}
