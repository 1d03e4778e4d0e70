//! Embedding and generation backed by a local Ollama server.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::DecodingConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::TextGenerator;

/// Where Ollama listens by default.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// `all-minilm` is Ollama's packaging of all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// Output size of [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

pub const DEFAULT_GENERATION_MODEL: &str = "llama2";

const PROVIDER: &str = "Ollama";

/// An [`EmbeddingProvider`] calling Ollama's `/api/embed` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use resume_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new("http://localhost:11434")
///     .with_model("nomic-embed-text", 768);
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
    name: String,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for the server at `base_url` using the default model.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: trim_base(base_url.into()),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            name: format!("ollama/{DEFAULT_EMBEDDING_MODEL}"),
        }
    }

    /// Use another embedding model with the given output size.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self.name = format!("ollama/{}", self.model);
        self
    }
}

/// A [`TextGenerator`] calling Ollama's `/api/generate` endpoint in raw mode.
///
/// The prompt is sent unmodified (`raw: true`) so the chat markers built by
/// [`PromptBuilder`](crate::PromptBuilder) reach the model as written. Ollama
/// returns only the continuation, and serves concurrent requests itself.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: trim_base(base_url.into()),
            model: DEFAULT_GENERATION_MODEL.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    raw: bool,
    options: GenerateOptions,
}

#[derive(Serialize, Debug, PartialEq)]
struct GenerateOptions {
    num_predict: usize,
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

impl From<&DecodingConfig> for GenerateOptions {
    fn from(decoding: &DecodingConfig) -> Self {
        Self {
            num_predict: decoding.max_new_tokens,
            temperature: if decoding.deterministic { 0.0 } else { decoding.temperature },
            top_p: decoding.top_p,
            repeat_penalty: decoding.repetition_penalty,
            seed: decoding.seed,
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

async fn post_json<Req: Serialize, Resp: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    body: &Req,
) -> std::result::Result<Resp, String> {
    let response = client.post(url).json(body).send().await.map_err(|e| {
        error!(provider = PROVIDER, %url, error = %e, "request failed");
        format!("request failed: {e}")
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);

        error!(provider = PROVIDER, %url, %status, "API error");
        return Err(format!("API returned {status}: {detail}"));
    }

    response.json().await.map_err(|e| {
        error!(provider = PROVIDER, %url, error = %e, "failed to parse response");
        format!("failed to parse response: {e}")
    })
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let url = format!("{}/api/embed", self.base_url);
        let request = EmbedRequest { model: &self.model, input: texts };
        let response: EmbedResponse = post_json(&self.client, &url, &request)
            .await
            .map_err(|message| RagError::EmbeddingError { provider: PROVIDER.into(), message })?;

        if let Some(bad) = response.embeddings.iter().find(|v| v.len() != self.dimensions) {
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!(
                    "model '{}' returned {}-dimensional vectors, expected {}",
                    self.model,
                    bad.len(),
                    self.dimensions
                ),
            });
        }
        Ok(response.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ── TextGenerator implementation ───────────────────────────────────

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str, decoding: &DecodingConfig) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "generating");

        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            raw: true,
            options: decoding.into(),
        };
        let response: GenerateResponse = post_json(&self.client, &url, &request)
            .await
            .map_err(|message| RagError::GenerationError { backend: PROVIDER.into(), message })?;
        Ok(response.response)
    }

    fn name(&self) -> &str {
        &self.model
    }

    fn echoes_prompt(&self) -> bool {
        false
    }

    fn supports_concurrency(&self) -> bool {
        true
    }
}
