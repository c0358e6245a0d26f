//! Append-only on-disk vector store.
//!
//! Layout of the store directory:
//! - `manifest.json`: embedding dimension and embedder id, written by the first run.
//! - `chunks.jsonl`: one [`StoredRecord`] per line, in insertion order.

use crate::models::{DocumentChunk, IngestRun, RetrievalHit};
use crate::traits::VectorIndex;
use crate::QueryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MANIFEST_FILE: &str = "manifest.json";
const RECORDS_FILE: &str = "chunks.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreManifest {
    pub dimension: usize,
    pub embedder: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
    pub ingest_run: Uuid,
    pub ingested_at: DateTime<Utc>,
}

pub struct LocalVectorStore {
    dir: PathBuf,
    records: Mutex<Option<Arc<Vec<StoredRecord>>>>,
}

impl LocalVectorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            records: Mutex::new(None),
        }
    }

    pub async fn manifest(&self) -> Result<Option<StoreManifest>, QueryError> {
        match fs::read(self.dir.join(MANIFEST_FILE)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn invalidate(&self) {
        if let Ok(mut cached) = self.records.lock() {
            *cached = None;
        }
    }

    fn cached(&self) -> Option<Arc<Vec<StoredRecord>>> {
        self.records.lock().ok().and_then(|cached| cached.clone())
    }

    async fn load_records(&self) -> Result<Arc<Vec<StoredRecord>>, QueryError> {
        if let Some(records) = self.cached() {
            return Ok(records);
        }

        let raw = match fs::read_to_string(self.dir.join(RECORDS_FILE)).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => String::new(),
            Err(error) => return Err(error.into()),
        };

        let records = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<StoredRecord>)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(dir = %self.dir.display(), count = records.len(), "loaded vector store");

        let records = Arc::new(records);
        if let Ok(mut cached) = self.records.lock() {
            *cached = Some(Arc::clone(&records));
        }
        Ok(records)
    }

    async fn ensure_manifest(&self, run: &IngestRun) -> Result<StoreManifest, QueryError> {
        if let Some(manifest) = self.manifest().await? {
            if manifest.dimension != run.dimension {
                return Err(QueryError::DimensionMismatch {
                    expected: manifest.dimension,
                    actual: run.dimension,
                });
            }
            if manifest.embedder != run.embedder {
                warn!(
                    stored = %manifest.embedder,
                    current = %run.embedder,
                    "appending with a different embedder than the store was built with"
                );
            }
            return Ok(manifest);
        }

        fs::create_dir_all(&self.dir).await?;
        let manifest = StoreManifest {
            dimension: run.dimension,
            embedder: run.embedder.clone(),
            created_at: run.started_at,
        };
        fs::write(
            self.dir.join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&manifest)?,
        )
        .await?;
        info!(dir = %self.dir.display(), dimension = manifest.dimension, "created vector store");
        Ok(manifest)
    }
}

#[async_trait]
impl VectorIndex for LocalVectorStore {
    async fn append(
        &self,
        run: &IngestRun,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), QueryError> {
        if chunks.len() != embeddings.len() {
            return Err(QueryError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let manifest = self.ensure_manifest(run).await?;

        let mut lines = String::new();
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            if embedding.len() != manifest.dimension {
                return Err(QueryError::DimensionMismatch {
                    expected: manifest.dimension,
                    actual: embedding.len(),
                });
            }

            let record = StoredRecord {
                chunk: chunk.clone(),
                embedding: embedding.clone(),
                ingest_run: run.run_id,
                ingested_at: Utc::now(),
            };
            lines.push_str(&serde_json::to_string(&record)?);
            lines.push('\n');
        }

        if lines.is_empty() {
            return Ok(());
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(RECORDS_FILE))
            .await?;
        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;

        self.invalidate();
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalHit>, QueryError> {
        let Some(manifest) = self.manifest().await? else {
            warn!(dir = %self.dir.display(), "vector store is empty; answering without context");
            return Ok(Vec::new());
        };

        if query_vector.len() != manifest.dimension {
            return Err(QueryError::DimensionMismatch {
                expected: manifest.dimension,
                actual: query_vector.len(),
            });
        }

        let records = self.load_records().await?;
        let mut hits: Vec<RetrievalHit> = records
            .iter()
            .map(|record| RetrievalHit {
                chunk: record.chunk.clone(),
                score: cosine_similarity(query_vector, &record.embedding),
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, QueryError> {
        Ok(self.load_records().await?.len())
    }

    /// Deletes the whole store directory, manifest included.
    async fn clear(&self) -> Result<(), QueryError> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => info!(dir = %self.dir.display(), "cleared vector store"),
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }
        self.invalidate();
        Ok(())
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm * right_norm)
}
