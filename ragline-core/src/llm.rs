//! Language model client trait.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;

/// Generation knobs passed to the language model per call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    /// Maximum number of output tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature; `0.0` for determinism.
    pub temperature: Option<f32>,
    /// Sequences that terminate generation when produced.
    pub stop: Vec<String>,
}

/// A lazy, finite, non-restartable sequence of generated text fragments.
///
/// Cancellation is by ceasing to poll (dropping the stream releases the
/// underlying connection).
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A client for a text-generation model.
///
/// Failures are reported as
/// [`RagError::GenerationFailed`](crate::RagError::GenerationFailed), or
/// [`RagError::RateLimited`](crate::RagError::RateLimited) when the
/// backend throttled the call so that callers can apply backoff.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a complete response for `prompt`.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String>;

    /// Generate a response as a stream of text fragments.
    ///
    /// The default implementation wraps [`generate`](LanguageModel::generate)
    /// in a single-fragment stream; backends with native streaming should
    /// override it.
    async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<TokenStream> {
        let text = self.generate(prompt, options).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
    }

    /// The model's input limit in characters, if it declares one.
    ///
    /// The chain caps prompts at the smaller of this and its configured
    /// ceiling.
    fn input_limit(&self) -> Option<usize> {
        None
    }
}
