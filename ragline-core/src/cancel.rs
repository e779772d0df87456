//! Cooperative cancellation for in-flight queries.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable cancellation token.
///
/// All clones share one flag. Cancellation is cooperative: components
/// check [`is_cancelled`](CancelToken::is_cancelled) at stage boundaries
/// and race [`cancelled`](CancelToken::cancelled) against collaborator
/// calls with `tokio::select!`. Cancelling is idempotent and cannot be
/// undone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation, waking every waiter.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // wait_for only errors if the sender is dropped, and we hold it.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
