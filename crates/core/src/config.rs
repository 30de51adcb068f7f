use crate::chunking::ChunkingConfig;
use crate::error::IngestError;
use crate::models::IngestionOptions;
use crate::retry::RetryPolicy;
use std::path::PathBuf;

pub const CHUNK_FILE_NAME: &str = "chunks.jsonl";
pub const STATE_FILE_NAME: &str = "index_state.json";
pub const DEFAULT_BATCH_SIZE: usize = 64;
pub const DEFAULT_TOP_K: usize = 5;

/// Everything an index build needs, fixed for the lifetime of one run.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub ingestion: IngestionOptions,
    pub batch_size: usize,
    pub connectivity_retry: RetryPolicy,
    pub upsert_retry: RetryPolicy,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            ingestion: IngestionOptions::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            connectivity_retry: RetryPolicy::connectivity_default(),
            upsert_retry: RetryPolicy::upsert_default(),
        }
    }
}

impl IndexSettings {
    pub fn chunk_file_path(&self) -> PathBuf {
        self.processed_dir.join(CHUNK_FILE_NAME)
    }

    pub fn state_file_path(&self) -> PathBuf {
        self.processed_dir.join(STATE_FILE_NAME)
    }

    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig::from(self.ingestion)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        self.chunking().validate()?;
        if self.batch_size == 0 {
            return Err(IngestError::InvalidArgument(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_in_processed_dir() {
        let settings = IndexSettings {
            processed_dir: PathBuf::from("/var/rag"),
            ..IndexSettings::default()
        };
        assert_eq!(settings.chunk_file_path(), PathBuf::from("/var/rag/chunks.jsonl"));
        assert_eq!(
            settings.state_file_path(),
            PathBuf::from("/var/rag/index_state.json")
        );
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let settings = IndexSettings {
            batch_size: 0,
            ..IndexSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(IngestError::InvalidArgument(_))
        ));
    }

    #[test]
    fn defaults_match_the_documented_knobs() {
        let settings = IndexSettings::default();
        assert_eq!(settings.ingestion.chunk_words, 350);
        assert_eq!(settings.ingestion.chunk_overlap, 50);
        assert_eq!(settings.connectivity_retry.max_attempts, 20);
        assert_eq!(settings.upsert_retry.max_attempts, 3);
        assert!(settings.validate().is_ok());
    }
}
