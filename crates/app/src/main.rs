mod repl;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use course_assistant_core::config::{
    DEFAULT_CHAT_MODEL, DEFAULT_DATA_DIR, DEFAULT_OLLAMA_HOST, DEFAULT_STORE_DIR,
    DEFAULT_SUMMARY_MAX_CHARS, DEFAULT_SYSTEM_PROMPT_PATH, DEFAULT_TOP_K, OLLAMA_HOST_ENV,
};
use course_assistant_core::embeddings::DEFAULT_OLLAMA_EMBEDDING_MODEL;
use course_assistant_core::{
    ingest_folder, AnswerPipeline, AssistantConfig, Embedder, EmbeddingProvider,
    EmbeddingSettings, FailurePolicy, IngestionOptions, LocalVectorStore, ModelSettings,
    OllamaClient, PromptAssembler, ResponseMode, Session, SystemPrompt,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "course-assistant", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vector store directory
    #[arg(long, default_value = DEFAULT_STORE_DIR)]
    store_dir: PathBuf,

    /// File whose contents become the model's system instruction
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT_PATH)]
    system_prompt: PathBuf,

    /// Chat model served by Ollama
    #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
    model: String,

    /// Ollama base URL
    #[arg(long, env = OLLAMA_HOST_ENV, default_value = DEFAULT_OLLAMA_HOST)]
    ollama_host: String,

    /// Embedding provider: `ollama` or the offline `ngram` hasher
    #[arg(long, default_value_t = EmbeddingProvider::Ollama)]
    embedder: EmbeddingProvider,

    /// Embedding model used by the `ollama` provider
    #[arg(long, default_value = DEFAULT_OLLAMA_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Embedding dimensions
    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Number of chunks retrieved per question
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Load, chunk, embed and store every supported file under a folder.
    Ingest {
        /// Corpus root, walked recursively.
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        folder: PathBuf,
        /// Index readable files and report unreadable ones instead of aborting.
        #[arg(long, default_value_t = false)]
        skip_unreadable: bool,
        /// Replace the existing store once the new corpus is fully embedded.
        #[arg(long, default_value_t = false)]
        wipe: bool,
        /// Maximum chunk length in characters.
        #[arg(long, default_value = "800")]
        chunk_size: usize,
        /// Characters shared between consecutive chunks.
        #[arg(long, default_value = "100")]
        chunk_overlap: usize,
    },
    /// Plain question/answer loop.
    Ask,
    /// Interactive session with response modes and question history.
    Chat {
        /// Initial response mode: explain, hint or exam-prep.
        #[arg(long, default_value_t = ResponseMode::Explain)]
        mode: ResponseMode,
        /// Character budget of the rolling conversation summary.
        #[arg(long, default_value_t = DEFAULT_SUMMARY_MAX_CHARS)]
        summary_chars: usize,
    },
}

impl Cli {
    fn config(&self) -> AssistantConfig {
        AssistantConfig {
            store_dir: self.store_dir.clone(),
            system_prompt_path: self.system_prompt.clone(),
            model: ModelSettings {
                model: self.model.clone(),
                base_url: self.ollama_host.clone(),
            },
            embedding: EmbeddingSettings {
                provider: self.embedder,
                model: self.embedding_model.clone(),
                dimensions: self.embedding_dimensions,
            },
            top_k: self.top_k,
            ..AssistantConfig::default()
        }
    }
}

async fn build_pipeline(
    config: &AssistantConfig,
) -> anyhow::Result<AnswerPipeline<Box<dyn Embedder>, LocalVectorStore, OllamaClient>> {
    let system_prompt = SystemPrompt::load(&config.system_prompt_path).with_context(|| {
        format!(
            "unable to read system prompt {}",
            config.system_prompt_path.display()
        )
    })?;

    let embedder = config.build_embedder();
    let store = LocalVectorStore::new(&config.store_dir);
    match store.manifest().await? {
        Some(manifest) if manifest.embedder != embedder.id() => warn!(
            stored = %manifest.embedder,
            current = %embedder.id(),
            "store was built with a different embedder; results may be poor"
        ),
        Some(_) => {}
        None => warn!(store = %config.store_dir.display(), "vector store is empty; run `ingest` first"),
    }

    Ok(AnswerPipeline::new(
        embedder,
        store,
        OllamaClient::new(config.model.clone()),
        PromptAssembler::new(system_prompt),
        config.top_k,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = cli.config();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "course-assistant boot"
    );

    match cli.command {
        Command::Ingest {
            folder,
            skip_unreadable,
            wipe,
            chunk_size,
            chunk_overlap,
        } => {
            config.data_dir = folder;
            config.ingestion = IngestionOptions {
                chunk_max_chars: chunk_size,
                chunk_overlap_chars: chunk_overlap,
                failure_policy: if skip_unreadable {
                    FailurePolicy::SkipAndReport
                } else {
                    FailurePolicy::Abort
                },
                replace_existing: wipe,
                ..IngestionOptions::default()
            };
            config.validate()?;

            let store = LocalVectorStore::new(&config.store_dir);

            let embedder = config.build_embedder();
            let report = ingest_folder(&config.data_dir, &config.ingestion, &embedder, &store)
                .await
                .with_context(|| format!("ingestion of {} failed", config.data_dir.display()))?;

            for failed in &report.failed_files {
                warn!(path = %failed.path.display(), reason = %failed.reason, "skipped unreadable file");
            }
            if !report.failed_files.is_empty() {
                println!("{} file(s) could not be read:", report.failed_files.len());
                for failed in &report.failed_files {
                    println!("- {}: {}", failed.path.display(), failed.reason);
                }
            }

            info!(
                run_id = %report.run.run_id,
                files = report.files_indexed,
                empty = report.empty_files.len(),
                unsupported = report.skipped_files.len(),
                "ingestion finished"
            );
            println!(
                "Ingestion complete: {} chunks from {} files into {} at {}",
                report.chunks_indexed,
                report.files_indexed,
                config.store_dir.display(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask => {
            config.validate()?;
            let pipeline = build_pipeline(&config).await?;
            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();
            repl::run_plain(&pipeline, stdin.lock(), &mut stdout).await?;
        }
        Command::Chat {
            mode,
            summary_chars,
        } => {
            config.summary_max_chars = summary_chars;
            config.validate()?;
            let pipeline = build_pipeline(&config).await?;

            let mut session = Session::new(config.summary_max_chars);
            session.set_mode(mode);

            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();
            repl::run_session(&pipeline, &mut session, stdin.lock(), &mut stdout).await?;
        }
    }

    Ok(())
}
