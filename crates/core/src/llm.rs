use crate::config::{ModelSettings, DECODING_TEMPERATURE};
use crate::prompt::ChatRequest;
use crate::traits::LanguageModel;
use crate::QueryError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/// Non-streaming client for an Ollama `/api/chat` endpoint.
pub struct OllamaClient {
    settings: ModelSettings,
    client: Client,
}

impl OllamaClient {
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            settings: ModelSettings {
                base_url: settings.base_url.trim_end_matches('/').to_string(),
                ..settings
            },
            client: Client::new(),
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, QueryError> {
        let body = OllamaChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: DECODING_TEMPERATURE,
            },
        };

        debug!(model = %self.settings.model, prompt_chars = request.user.len(), "sending chat request");
        let response = self
            .client
            .post(format!("{}/api/chat", self.settings.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: OllamaChatResponse = response.json().await.map_err(|error| {
            QueryError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!("{status}: {error}"),
            }
        })?;

        if let Some(error) = payload.error {
            return Err(QueryError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!("{status}: {error}"),
            });
        }
        if !status.is_success() {
            return Err(QueryError::BackendResponse {
                backend: "ollama".to_string(),
                details: status.to_string(),
            });
        }

        payload
            .message
            .map(|message| message.content)
            .ok_or_else(|| QueryError::BackendResponse {
                backend: "ollama".to_string(),
                details: "response carried no message".to_string(),
            })
    }
}
