//! The chain orchestrator: one request/response cycle over the
//! retrieval pipeline.
//!
//! A query moves through the stages `Received → Embedding → Retrieving →
//! PromptAssembly → Generating → Completed`, strictly in sequence. Any
//! stage may fail into the terminal `Failed` state, surfacing one
//! [`ChainError`] naming the stage and the originating error kind. The
//! orchestrator never retries across stages; individual collaborator
//! calls are wrapped in the configured bounded retry before their stage
//! is deemed failed.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use ragline_core::{
    CancelToken, Conversation, Embedder, GenerateOptions, LanguageModel, NoContextPolicy,
    PipelineConfig, RagError, Result, SearchResult, TokenStream, retry,
};
use ragline_store::{MetadataFilter, VectorStore};

use crate::prompt::PromptTemplate;
use crate::retriever::{RetrieveOptions, Retriever};

/// The stages of one query's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Query accepted, nothing started.
    Received,
    /// Embedding the query text.
    Embedding,
    /// Searching the vector store.
    Retrieving,
    /// Building the final prompt.
    PromptAssembly,
    /// Calling the language model.
    Generating,
    /// Terminal success.
    Completed,
    /// Terminal failure.
    Failed,
}

impl Stage {
    /// The snake_case name of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Embedding => "embedding",
            Stage::Retrieving => "retrieving",
            Stage::PromptAssembly => "prompt_assembly",
            Stage::Generating => "generating",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal chain failure: the stage that failed and why.
#[derive(Debug, Error)]
#[error("query failed during {stage}: {source}")]
pub struct ChainError {
    /// The stage that transitioned to `Failed`.
    pub stage: Stage,
    /// The originating error kind.
    #[source]
    pub source: RagError,
}

/// Per-call options for [`RagChain::ask`]; unset fields fall back to the
/// pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Retrieval breadth.
    pub top_k: Option<usize>,
    /// Retrieval score threshold.
    pub min_score: Option<f32>,
    /// Stream the answer instead of returning it in one piece.
    pub stream: bool,
    /// Context character budget for prompt assembly.
    pub max_context_chars: Option<usize>,
    /// Exact-match metadata filter for the search.
    pub filter: Option<MetadataFilter>,
    /// Generation knobs forwarded to the language model.
    pub generation: GenerateOptions,
}

/// A completed answer with the passages that grounded it.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The generated text.
    pub text: String,
    /// The passages included in the prompt, ranked.
    pub sources: Vec<SearchResult>,
    /// `false` when the zero-passage ungrounded path was taken.
    pub grounded: bool,
}

/// A streaming answer: a lazy, finite, non-restartable sequence of text
/// fragments.
///
/// Dropping the stream or calling [`cancel`](AnswerStream::cancel)
/// stops consumption; fragments already yielded stay observed, no
/// further fragments are produced, and the underlying token stream is
/// released.
pub struct AnswerStream {
    sources: Vec<SearchResult>,
    grounded: bool,
    cancel: CancelToken,
    tokens: Option<TokenStream>,
}

impl AnswerStream {
    /// The passages included in the prompt, ranked.
    pub fn sources(&self) -> &[SearchResult] {
        &self.sources
    }

    /// `false` when the zero-passage ungrounded path was taken.
    pub fn grounded(&self) -> bool {
        self.grounded
    }

    /// Stop the stream; subsequent polls yield `None`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Pull the next fragment, or `None` once the stream is finished or
    /// cancelled.
    pub async fn next_fragment(&mut self) -> Option<Result<String>> {
        self.next().await
    }
}

impl Stream for AnswerStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            // Release the producer so the connection is not held open.
            this.tokens = None;
            return Poll::Ready(None);
        }
        match this.tokens.as_mut() {
            Some(tokens) => tokens.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

impl fmt::Debug for AnswerStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerStream")
            .field("sources", &self.sources.len())
            .field("grounded", &self.grounded)
            .finish_non_exhaustive()
    }
}

/// The result of [`RagChain::ask`]: a complete answer or a fragment
/// stream, per [`AskOptions::stream`].
#[derive(Debug)]
pub enum Reply {
    /// A single-shot answer.
    Answer(Answer),
    /// A streaming answer.
    Stream(AnswerStream),
}

/// The chain orchestrator. Construct one via [`RagChain::builder()`].
pub struct RagChain {
    config: PipelineConfig,
    retriever: Retriever,
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
}

impl fmt::Debug for RagChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagChain")
            .field("config", &self.config)
            .field("retriever", &self.retriever)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl RagChain {
    /// Create a new [`RagChainBuilder`].
    pub fn builder() -> RagChainBuilder {
        RagChainBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `query`, optionally grounded in prior `conversation`
    /// turns.
    pub async fn ask(
        &self,
        query: &str,
        conversation: &Conversation,
        options: AskOptions,
    ) -> std::result::Result<Reply, ChainError> {
        self.ask_with_cancel(query, conversation, options, &CancelToken::new()).await
    }

    /// Like [`ask`](RagChain::ask), honoring `cancel` at every stage
    /// boundary and inside every collaborator call.
    pub async fn ask_with_cancel(
        &self,
        query: &str,
        conversation: &Conversation,
        options: AskOptions,
        cancel: &CancelToken,
    ) -> std::result::Result<Reply, ChainError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("ask", %request_id);
        self.run(query, conversation, options, cancel).instrument(span).await
    }

    async fn run(
        &self,
        query: &str,
        conversation: &Conversation,
        options: AskOptions,
        cancel: &CancelToken,
    ) -> std::result::Result<Reply, ChainError> {
        debug!(stage = %Stage::Received, query_chars = query.len(), "query received");

        // Received → Embedding
        ensure_live(Stage::Embedding, cancel)?;
        debug!(stage = %Stage::Embedding, "embedding query");
        let vector = tokio::select! {
            _ = cancel.cancelled() => Err(RagError::Cancelled),
            result = self.retriever.embed_query(query) => result,
        }
        .map_err(|e| fail(Stage::Embedding, e))?;

        // Embedding → Retrieving
        ensure_live(Stage::Retrieving, cancel)?;
        debug!(stage = %Stage::Retrieving, "searching vector store");
        let retrieve_options = RetrieveOptions {
            top_k: options.top_k,
            min_score: options.min_score,
            filter: options.filter.clone(),
        };
        let passages = tokio::select! {
            _ = cancel.cancelled() => Err(RagError::Cancelled),
            result = self.retriever.search_embedded(&vector, &retrieve_options) => result,
        }
        .map_err(|e| fail(Stage::Retrieving, e))?;

        // Retrieving → PromptAssembly. This stage is entered even with
        // zero passages; the configured policy decides what happens.
        ensure_live(Stage::PromptAssembly, cancel)?;
        let grounded = !passages.is_empty();
        if !grounded {
            match self.config.no_context_policy {
                NoContextPolicy::Refuse => {
                    return Err(fail(Stage::PromptAssembly, RagError::NoContext));
                }
                NoContextPolicy::Ungrounded => {
                    debug!(stage = %Stage::PromptAssembly, "no passages retrieved, proceeding ungrounded");
                }
            }
        }
        let max_context_chars =
            options.max_context_chars.unwrap_or(self.config.max_context_chars);
        let input_limit = self
            .model
            .input_limit()
            .map_or(self.config.max_prompt_chars, |limit| {
                limit.min(self.config.max_prompt_chars)
            });
        let prompt = self
            .template
            .assemble(query, conversation, &passages, max_context_chars, input_limit)
            .map_err(|e| fail(Stage::PromptAssembly, e))?;
        debug!(
            stage = %Stage::PromptAssembly,
            prompt_chars = prompt.text.chars().count(),
            passages_included = prompt.included,
            "prompt assembled"
        );

        // PromptAssembly → Generating
        ensure_live(Stage::Generating, cancel)?;
        let timeout = self.config.generate_timeout();
        if options.stream {
            let tokens = tokio::select! {
                _ = cancel.cancelled() => Err(RagError::Cancelled),
                result = retry(&self.config.retry, "generate", || async {
                    match tokio::time::timeout(
                        timeout,
                        self.model.generate_stream(&prompt.text, &options.generation),
                    )
                    .await
                    {
                        Ok(inner) => inner,
                        Err(_) => Err(RagError::Timeout { operation: "generate", timeout }),
                    }
                }) => result,
            }
            .map_err(|e| fail(Stage::Generating, e))?;

            info!(stage = %Stage::Generating, grounded, sources = passages.len(), "streaming answer");
            Ok(Reply::Stream(AnswerStream {
                sources: passages,
                grounded,
                cancel: cancel.clone(),
                tokens: Some(logged_on_completion(tokens)),
            }))
        } else {
            let text = tokio::select! {
                _ = cancel.cancelled() => Err(RagError::Cancelled),
                result = retry(&self.config.retry, "generate", || async {
                    match tokio::time::timeout(
                        timeout,
                        self.model.generate(&prompt.text, &options.generation),
                    )
                    .await
                    {
                        Ok(inner) => inner,
                        Err(_) => Err(RagError::Timeout { operation: "generate", timeout }),
                    }
                }) => result,
            }
            .map_err(|e| fail(Stage::Generating, e))?;

            info!(
                stage = %Stage::Completed,
                grounded,
                sources = passages.len(),
                answer_chars = text.chars().count(),
                "query completed"
            );
            Ok(Reply::Answer(Answer { text, sources: passages, grounded }))
        }
    }
}

/// Fail the current stage if cancellation was requested.
fn ensure_live(stage: Stage, cancel: &CancelToken) -> std::result::Result<(), ChainError> {
    if cancel.is_cancelled() {
        return Err(fail(stage, RagError::Cancelled));
    }
    Ok(())
}

/// Log and wrap a stage failure. `Failed` is terminal.
fn fail(stage: Stage, source: RagError) -> ChainError {
    error!(stage = %stage, error = %source, "chain stage failed");
    ChainError { stage, source }
}

/// Pass fragments through, logging once the producer finishes.
fn logged_on_completion(mut tokens: TokenStream) -> TokenStream {
    Box::pin(async_stream::stream! {
        while let Some(item) = tokens.next().await {
            yield item;
        }
        debug!(stage = %Stage::Completed, "generation stream completed");
    })
}

/// Builder for constructing a [`RagChain`].
///
/// `config`, `embedder`, `store`, and `model` are required; the prompt
/// template defaults to [`PromptTemplate::default()`].
#[derive(Default)]
pub struct RagChainBuilder {
    config: Option<PipelineConfig>,
    embedder: Option<Arc<dyn Embedder>>,
    store: Option<Arc<dyn VectorStore>>,
    model: Option<Arc<dyn LanguageModel>>,
    template: Option<PromptTemplate>,
}

impl RagChainBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedder.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector store.
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the language model client.
    pub fn model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set a custom prompt template.
    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Build the [`RagChain`], validating that all required parts are
    /// present and dimensionally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] when a required part is missing and
    /// [`RagError::ConfigurationMismatch`] when the embedder's or
    /// store's dimension disagrees with the configuration.
    pub fn build(self) -> Result<RagChain> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        let embedder =
            self.embedder.ok_or_else(|| RagError::Config("embedder is required".to_string()))?;
        let store = self.store.ok_or_else(|| RagError::Config("store is required".to_string()))?;
        let model = self.model.ok_or_else(|| RagError::Config("model is required".to_string()))?;

        let retriever = Retriever::new(&config, embedder, store)?;
        Ok(RagChain {
            config,
            retriever,
            model,
            template: self.template.unwrap_or_default(),
        })
    }
}
