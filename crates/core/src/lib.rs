pub mod chunking;
pub mod citations;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod store;
pub mod traits;

pub use chunking::{split_text, split_units, ChunkingConfig};
pub use citations::{dedup_source_labels, question_preview, source_label, QUESTION_PREVIEW_CHARS};
pub use config::{AssistantConfig, EmbeddingProvider, EmbeddingSettings, ModelSettings};
pub use embeddings::{CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, QueryError};
pub use extractor::{extract_page_texts, read_text_file, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{
    classify, discover_files, ingest_folder, load_directory, FailedFile, FileKind, FileOutcome,
    IngestionReport, LoadReport, TEXT_EXTENSIONS,
};
pub use llm::OllamaClient;
pub use models::{
    DocumentChunk, FailurePolicy, IngestRun, IngestionOptions, LoadedUnit, RetrievalHit, SourceMeta,
};
pub use orchestrator::{Answer, AnswerPipeline, QuestionAnswerer};
pub use prompt::{ChatRequest, PromptAssembler, QueryContext, ResponseMode, SystemPrompt};
pub use session::{ConversationSummary, ConversationTurn, Selection, Session};
pub use store::{LocalVectorStore, StoreManifest};
pub use traits::{LanguageModel, VectorIndex};
