//! Batch execution context

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Ambient state for one batch plus its cancellation scope
///
/// Cloning is cheap; clones share both the state and the token.
#[derive(Debug)]
pub struct Context<C> {
    state: Arc<C>,
    cancellation: CancellationToken,
}

impl<C> Clone for Context<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            cancellation: self.cancellation.clone(),
        }
    }
}

impl<C> Context<C> {
    /// Create a context with a fresh cancellation token
    pub fn new(state: C) -> Self {
        Self {
            state: Arc::new(state),
            cancellation: CancellationToken::new(),
        }
    }

    /// Shared ambient state
    pub fn state(&self) -> &Arc<C> {
        &self.state
    }

    /// Cancellation token of this context
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancel every operation running under this context
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether the context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
