use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Where a piece of text came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceMeta {
    pub source_path: String,
    pub page: Option<u32>,
}

impl SourceMeta {
    pub fn for_file(path: &Path) -> Self {
        Self {
            source_path: path.to_string_lossy().to_string(),
            page: None,
        }
    }

    pub fn for_page(path: &Path, page: u32) -> Self {
        Self {
            source_path: path.to_string_lossy().to_string(),
            page: Some(page),
        }
    }
}

/// One extracted text unit: a single PDF page or a whole text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedUnit {
    pub text: String,
    pub meta: SourceMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub text: String,
    pub source_path: String,
    pub page: Option<u32>,
    pub chunk_index: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalHit {
    pub chunk: DocumentChunk,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first unreadable file and index nothing.
    #[default]
    Abort,
    /// Index every readable file and report the rest.
    SkipAndReport,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub embed_batch_size: usize,
    pub failure_policy: FailurePolicy,
    /// Clear the index right before appending, once every chunk is embedded.
    pub replace_existing: bool,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 800,
            chunk_overlap_chars: 100,
            embed_batch_size: 32,
            failure_policy: FailurePolicy::Abort,
            replace_existing: false,
        }
    }
}

/// Identifies one ingestion run; every record it writes carries the run id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestRun {
    pub run_id: Uuid,
    pub embedder: String,
    pub dimension: usize,
    pub started_at: DateTime<Utc>,
}

impl IngestRun {
    pub fn start(embedder: impl Into<String>, dimension: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            embedder: embedder.into(),
            dimension,
            started_at: Utc::now(),
        }
    }
}
