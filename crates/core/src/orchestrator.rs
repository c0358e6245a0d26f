use crate::embeddings::Embedder;
use crate::models::{DocumentChunk, RetrievalHit};
use crate::prompt::{frame_question, ChatRequest, PromptAssembler, QueryContext};
use crate::traits::{LanguageModel, VectorIndex};
use crate::QueryError;
use async_trait::async_trait;
use tracing::{debug, info};

/// A generated answer and the chunks that were handed to the model as context.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<DocumentChunk>,
    pub request: ChatRequest,
}

#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn answer(
        &self,
        question: &str,
        context: QueryContext<'_>,
    ) -> Result<Answer, QueryError>;
}

pub struct AnswerPipeline<E, V, L>
where
    E: Embedder,
    V: VectorIndex,
    L: LanguageModel,
{
    embedder: E,
    store: V,
    model: L,
    assembler: PromptAssembler,
    top_k: usize,
}

impl<E, V, L> AnswerPipeline<E, V, L>
where
    E: Embedder,
    V: VectorIndex,
    L: LanguageModel,
{
    pub fn new(embedder: E, store: V, model: L, assembler: PromptAssembler, top_k: usize) -> Self {
        Self {
            embedder,
            store,
            model,
            assembler,
            top_k,
        }
    }

    /// The `top_k` nearest chunks to `query`, best first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievalHit>, QueryError> {
        let query_vector = self.embedder.embed(query).await?;
        let hits = self.store.search(&query_vector, self.top_k).await?;
        debug!(top_k = self.top_k, hits = hits.len(), "retrieved context");
        Ok(hits)
    }
}

#[async_trait]
impl<E, V, L> QuestionAnswerer for AnswerPipeline<E, V, L>
where
    E: Embedder,
    V: VectorIndex,
    L: LanguageModel,
{
    async fn answer(
        &self,
        question: &str,
        context: QueryContext<'_>,
    ) -> Result<Answer, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::Request("question is empty".to_string()));
        }

        let hits = self.retrieve(&frame_question(question, context)).await?;
        let request = self.assembler.assemble(&hits, question, context);
        let text = self.model.complete(&request).await?;
        info!(model = self.model.name(), sources = hits.len(), "answered question");

        Ok(Answer {
            text,
            sources: hits.into_iter().map(|hit| hit.chunk).collect(),
            request,
        })
    }
}
