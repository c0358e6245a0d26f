use crate::models::{DocumentChunk, IngestRun, RetrievalHit};
use crate::prompt::ChatRequest;
use crate::QueryError;
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Adds records; never replaces or deduplicates existing ones.
    async fn append(
        &self,
        run: &IngestRun,
        chunks: &[DocumentChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), QueryError>;

    /// At most `top_k` hits, best first.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalHit>, QueryError>;

    async fn count(&self) -> Result<usize, QueryError>;

    /// Removes every record so the next append starts a fresh index.
    async fn clear(&self) -> Result<(), QueryError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &ChatRequest) -> Result<String, QueryError>;
}
