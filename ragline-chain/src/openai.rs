//! OpenAI-backed embedder and language model.
//!
//! Only available with the `openai` feature. Both clients call the HTTP
//! API directly with `reqwest`; streaming generation parses the
//! server-sent event stream with `eventsource-stream`.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use ragline_core::{
    Embedder, GenerateOptions, LanguageModel, RagError, Result, TokenStream,
};

/// The OpenAI embeddings endpoint.
const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// The OpenAI chat completions endpoint.
const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default dimensionality of `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// Default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pull the API's error message out of a failure body, falling back to
/// the raw body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`Embedder`] backed by the OpenAI embeddings API.
///
/// Transport failures surface as `EmbedderUnavailable` and HTTP 429 as
/// `RateLimited`, both of which the pipeline's retry policy treats as
/// transient.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAiEmbedder {
    /// Create a new embedder with the given API key and the default
    /// model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("OpenAI API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a new embedder from the `OPENAI_API_KEY` environment
    /// variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::Config("OPENAI_API_KEY environment variable not set".into())
        })?;
        Self::new(api_key)
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request embeddings truncated to `dims` (Matryoshka support).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed_many(&[text]).await?;
        vectors.into_iter().next().ok_or_else(|| {
            RagError::EmbeddingFailed("API returned an empty response".into())
        })
    }

    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(batch_size = texts.len(), model = %self.model, "embedding batch");

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };
        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "embeddings request failed");
                RagError::EmbedderUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body);
            error!(%status, "embeddings API error");
            if status.as_u16() == 429 {
                return Err(RagError::RateLimited(detail));
            }
            return Err(RagError::EmbeddingFailed(format!("API returned {status}: {detail}")));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            RagError::EmbeddingFailed(format!("failed to parse response: {e}"))
        })?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Chat completions ───────────────────────────────────────────────

/// A [`LanguageModel`] backed by the OpenAI chat completions API, with
/// native SSE streaming.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    input_limit: Option<usize>,
}

impl OpenAiChatModel {
    /// Create a new client with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("OpenAI API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_CHAT_MODEL.into(),
            input_limit: None,
        })
    }

    /// Create a new client from the `OPENAI_API_KEY` environment
    /// variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::Config("OPENAI_API_KEY environment variable not set".into())
        })?;
        Self::new(api_key)
    }

    /// Set the model name (e.g. `gpt-4o`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Declare the model's input limit in characters so the chain can
    /// cap prompts below it.
    pub fn with_input_limit(mut self, chars: usize) -> Self {
        self.input_limit = Some(chars);
        self
    }

    fn request_body<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a GenerateOptions,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: (!options.stop.is_empty()).then_some(options.stop.as_slice()),
            stream,
        }
    }

    async fn send(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt, options, stream))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "chat request failed");
                RagError::GenerationFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body);
            error!(%status, "chat API error");
            if status.as_u16() == 429 {
                return Err(RagError::RateLimited(detail));
            }
            return Err(RagError::GenerationFailed(format!("API returned {status}: {detail}")));
        }
        Ok(response)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "generating");
        let response = self.send(prompt, options, false).await?;
        let parsed: ChatResponse = response.json().await.map_err(|e| {
            RagError::GenerationFailed(format!("failed to parse response: {e}"))
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::GenerationFailed("API returned no choices".into()))
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<TokenStream> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "generating (streaming)");
        let response = self.send(prompt, options, true).await?;
        let mut events = response.bytes_stream().eventsource();

        Ok(Box::pin(async_stream::try_stream! {
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| {
                    RagError::GenerationFailed(format!("stream error: {e}"))
                })?;
                if event.data == "[DONE]" {
                    break;
                }
                let chunk: StreamChunk = serde_json::from_str(&event.data).map_err(|e| {
                    RagError::GenerationFailed(format!("failed to parse stream chunk: {e}"))
                })?;
                if let Some(content) =
                    chunk.choices.into_iter().next().and_then(|c| c.delta.content)
                {
                    yield content;
                }
            }
        }))
    }

    fn input_limit(&self) -> Option<usize> {
        self.input_limit
    }
}
