//! Durable progress of an index build.
//!
//! The chunk file records extraction and chunking; this state file records
//! how many embedding batches have been committed to the vector store. Both
//! are replaced atomically (write to `*.tmp`, then rename).

use crate::error::IndexError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Chunked,
    #[default]
    Indexing,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_completed_batch: usize,
    pub total_batches: usize,
}

impl Checkpoint {
    pub fn is_complete(&self) -> bool {
        self.last_completed_batch >= self.total_batches
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    #[serde(default)]
    pub phase: JobPhase,
    #[serde(flatten)]
    pub cursor: Checkpoint,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub chunk_count: Option<usize>,
    #[serde(default)]
    pub chunk_file_sha256: Option<String>,
    #[serde(default)]
    pub dimensions: Option<usize>,
    /// Collection the committed batches were written into.
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobState {
    pub fn new(
        total_batches: usize,
        batch_size: usize,
        chunk_count: usize,
        chunk_file_sha256: String,
    ) -> Self {
        Self {
            phase: JobPhase::Chunked,
            cursor: Checkpoint {
                last_completed_batch: 0,
                total_batches,
            },
            batch_size: Some(batch_size),
            chunk_count: Some(chunk_count),
            chunk_file_sha256: Some(chunk_file_sha256),
            dimensions: None,
            collection: None,
            updated_at: Some(Utc::now()),
        }
    }

    /// Records one more committed batch.
    pub fn advance(&mut self, completed_batch: usize) {
        self.cursor.last_completed_batch = completed_batch + 1;
        self.phase = if self.cursor.is_complete() {
            JobPhase::Complete
        } else {
            JobPhase::Indexing
        };
        self.updated_at = Some(Utc::now());
    }

    /// First batch to process under `batch_size`.
    ///
    /// When the batch size changed since the state was written, the number of
    /// committed chunks is re-expressed in whole batches of the new size,
    /// rounding down; the overlap is re-upserted under the same ids.
    pub fn resume_batch(&self, batch_size: usize) -> usize {
        let recorded = self.batch_size.unwrap_or(batch_size).max(1);
        if recorded == batch_size {
            return self.cursor.last_completed_batch;
        }
        let committed_chunks = self.cursor.last_completed_batch.saturating_mul(recorded);
        committed_chunks / batch_size.max(1)
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.cursor.last_completed_batch > self.cursor.total_batches {
            return Err(IndexError::State(format!(
                "last_completed_batch {} exceeds total_batches {}",
                self.cursor.last_completed_batch, self.cursor.total_batches
            )));
        }
        Ok(())
    }
}

pub fn load_state(path: &Path) -> Result<Option<JobState>, IndexError> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)?;
    let state: JobState = serde_json::from_str(&raw).map_err(|error| {
        IndexError::State(format!("{} is not a valid state file: {error}", path.display()))
    })?;
    state.validate()?;
    Ok(Some(state))
}

pub fn save_state(path: &Path, state: &JobState) -> Result<(), IndexError> {
    let json = serde_json::to_string_pretty(state)?;
    write_atomically(path, json.as_bytes())?;
    Ok(())
}

pub fn clear_state(path: &Path) -> Result<bool, IndexError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error.into()),
    }
}

pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)
}
