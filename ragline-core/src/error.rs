//! Error types shared across the Ragline crates.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur anywhere in the retrieval pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// A vector's dimension does not match the store's configured dimension.
    #[error("vector dimension {actual} does not match store dimension {expected}")]
    DimensionMismatch {
        /// The store's configured dimension.
        expected: usize,
        /// The dimension of the offending vector.
        actual: usize,
    },

    /// A search was requested with `k == 0`.
    #[error("search requested k = {0}; k must be at least 1")]
    InvalidK(usize),

    /// Embedding produced an invalid result or the backend rejected the input.
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    /// The embedding backend could not be reached.
    #[error("embedding backend unavailable: {0}")]
    EmbedderUnavailable(String),

    /// The language model failed to generate a response.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// The language model backend applied rate limiting.
    #[error("rate limited by model backend: {0}")]
    RateLimited(String),

    /// The assembled prompt exceeds the model's input limit even after
    /// context truncation down to the configured floor.
    #[error("assembled prompt of {chars} chars exceeds the input limit of {limit}")]
    PromptTooLarge {
        /// Size of the assembled prompt in characters.
        chars: usize,
        /// The effective input limit.
        limit: usize,
    },

    /// A persisted store or a component was opened with a configuration
    /// that disagrees with the one it was created under.
    #[error("configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    /// A collaborator call exceeded its time budget.
    #[error("{operation} timed out after {}ms", timeout.as_millis())]
    Timeout {
        /// The operation that timed out (`embed`, `search`, `generate`).
        operation: &'static str,
        /// The configured budget.
        timeout: Duration,
    },

    /// The request was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Retrieval produced no passages and the no-context policy is set
    /// to refuse ungrounded generation.
    #[error("no passages retrieved and the no-context policy refuses ungrounded generation")]
    NoContext,

    /// A configuration validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An error in a vector store backend.
    #[error("vector store error: {0}")]
    Store(String),
}

impl RagError {
    /// Whether this error is a transient transport failure that the
    /// bounded retry policy may retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RagError::EmbedderUnavailable(_)
                | RagError::RateLimited(_)
                | RagError::Timeout { .. }
        )
    }
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        assert!(RagError::EmbedderUnavailable("down".into()).is_transient());
        assert!(RagError::RateLimited("429".into()).is_transient());
        assert!(
            RagError::Timeout { operation: "embed", timeout: Duration::from_secs(1) }
                .is_transient()
        );
    }

    #[test]
    fn domain_errors_are_not_transient() {
        assert!(!RagError::DimensionMismatch { expected: 768, actual: 3 }.is_transient());
        assert!(!RagError::NoContext.is_transient());
        assert!(!RagError::Cancelled.is_transient());
    }
}
