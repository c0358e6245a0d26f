use crate::error::QueryError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// all-MiniLM-L6-v2 and its Ollama packaging both emit 384 dimensions.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;
pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "all-minilm";

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier recorded in the store manifest.
    fn id(&self) -> String;

    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QueryError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, QueryError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| QueryError::BackendResponse {
            backend: self.id(),
            details: "no embedding returned".to_string(),
        })
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn id(&self) -> String {
        (**self).id()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QueryError> {
        (**self).embed_batch(texts).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, QueryError> {
        (**self).embed(text).await
    }
}

/// Hashed character-trigram embedder. Deterministic and offline.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(chars: &[char]) -> u64 {
    let mut utf8 = [0u8; 4];
    chars.iter().fold(FNV_OFFSET_BASIS, |hash, ch| {
        ch.encode_utf8(&mut utf8)
            .bytes()
            .fold(hash, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
    })
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|value| *value /= norm);
    }
}

impl CharacterNgramEmbedder {
    /// Counts lowercased character trigrams into `dimensions` buckets, then unit-normalizes.
    /// Text shorter than three characters maps to the zero vector.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let buckets = self.dimensions.max(1);
        let chars: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();

        let mut vector = vec![0f32; buckets];
        for trigram in chars.windows(3) {
            vector[(fnv1a(trigram) % buckets as u64) as usize] += 1.0;
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn id(&self) -> String {
        format!("ngram:{}", self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QueryError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dimensions: usize,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn id(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QueryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, count = texts.len(), "requesting embeddings");
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!("embed returned {}", response.status()),
            });
        }

        let payload: EmbedResponse = response.json().await?;
        if payload.embeddings.len() != texts.len() {
            return Err(QueryError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    payload.embeddings.len()
                ),
            });
        }

        if let Some(bad) = payload
            .embeddings
            .iter()
            .find(|vector| vector.len() != self.dimensions)
        {
            return Err(QueryError::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.len(),
            });
        }

        Ok(payload.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::{CharacterNgramEmbedder, Embedder, OllamaEmbedder};
    use crate::QueryError;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed_text("Phong shading and normals");
        let second = embedder.embed_text("Phong shading and normals");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed_text("abc");
        assert_eq!(vector.len(), 32);
    }

    #[test]
    fn ngram_vectors_are_unit_length_and_case_insensitive() {
        let embedder = CharacterNgramEmbedder::default();
        let upper = embedder.embed_text("Depth Buffer");
        let lower = embedder.embed_text("depth buffer");
        assert_eq!(upper, lower);

        let norm = upper.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        assert!(embedder.embed_text("ab").iter().all(|value| *value == 0.0));
    }

    #[tokio::test]
    async fn ollama_embedder_posts_batch() -> Result<(), QueryError> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(json!({ "model": "all-minilm" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "all-minilm",
                "embeddings": [[0.1, 0.2, 0.3], [0.3, 0.2, 0.1]]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(server.uri(), "all-minilm", 3);
        let vectors = embedder
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await?;

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.3, 0.2, 0.1]);
        Ok(())
    }

    #[tokio::test]
    async fn ollama_embedder_rejects_wrong_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.1, 0.2]] })),
            )
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(server.uri(), "all-minilm", 384);
        let result = embedder.embed("query").await;
        assert!(matches!(
            result,
            Err(QueryError::DimensionMismatch {
                expected: 384,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn ollama_embedder_surfaces_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(server.uri(), "all-minilm", 384);
        let result = embedder.embed("query").await;
        assert!(matches!(result, Err(QueryError::BackendResponse { .. })));
    }
}
