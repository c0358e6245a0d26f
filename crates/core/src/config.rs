//! Runtime configuration shared by the ingestion and query commands.

use crate::embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_OLLAMA_EMBEDDING_MODEL,
};
use crate::models::IngestionOptions;
use crate::QueryError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

/// Environment variable overriding the Ollama base URL.
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_CHAT_MODEL: &str = "llama3.1";
pub const DEFAULT_DATA_DIR: &str = "data/raw";
pub const DEFAULT_STORE_DIR: &str = "vectorstore";
pub const DEFAULT_SYSTEM_PROMPT_PATH: &str = "prompts/system.txt";
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 1_500;

/// Decoding is always greedy.
pub const DECODING_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub base_url: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_CHAT_MODEL.to_string(),
            base_url: DEFAULT_OLLAMA_HOST.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingProvider {
    #[default]
    Ollama,
    Ngram,
}

impl fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::Ngram => f.write_str("ngram"),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "ngram" => Ok(Self::Ngram),
            other => Err(format!(
                "unknown embedding provider `{other}` (expected ollama or ngram)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            model: DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub data_dir: PathBuf,
    pub store_dir: PathBuf,
    pub system_prompt_path: PathBuf,
    pub model: ModelSettings,
    pub embedding: EmbeddingSettings,
    pub top_k: usize,
    pub ingestion: IngestionOptions,
    pub summary_max_chars: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            system_prompt_path: PathBuf::from(DEFAULT_SYSTEM_PROMPT_PATH),
            model: ModelSettings::default(),
            embedding: EmbeddingSettings::default(),
            top_k: DEFAULT_TOP_K,
            ingestion: IngestionOptions::default(),
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
        }
    }
}

impl AssistantConfig {
    pub fn validate(&self) -> Result<(), QueryError> {
        let url = Url::parse(&self.model.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(QueryError::Request(format!(
                "model base url must be http(s): {}",
                self.model.base_url
            )));
        }
        if self.top_k == 0 {
            return Err(QueryError::Request("top_k must be at least 1".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(QueryError::Request(
                "embedding dimensions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Ingestion and retrieval must share this embedder.
    pub fn build_embedder(&self) -> Box<dyn Embedder> {
        match self.embedding.provider {
            EmbeddingProvider::Ollama => Box::new(OllamaEmbedder::new(
                self.model.base_url.clone(),
                self.embedding.model.clone(),
                self.embedding.dimensions,
            )),
            EmbeddingProvider::Ngram => Box::new(CharacterNgramEmbedder {
                dimensions: self.embedding.dimensions,
            }),
        }
    }
}
