//! Execution context for handler invocations
//!
//! A `Context` carries a cancellation token and an optional deadline. Every
//! potentially slow step of an invocation (waiting for the cache lock, the
//! upstream request, reading the response body) is raced against it so that a
//! cancelled caller releases everything it holds.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context ended before the guarded work completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context (or one of its parents) was cancelled explicitly
    #[error("context cancelled")]
    Cancelled,

    /// The context's deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation and deadline carrier passed to `TtlCache::handle`
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a child context that is cancelled along with `self`
    ///
    /// Cancelling the child does not affect the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derives a child context whose deadline is at most `timeout` from now
    ///
    /// An earlier deadline inherited from `self` is kept. A timeout too far in
    /// the future to represent adds no deadline of its own.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(existing), Some(requested)) => Some(existing.min(requested)),
            (existing, None) => existing,
            (None, requested) => requested,
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// Cancels this context and every context derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns the deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reports why the context has ended, or `None` while it is still live
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            Some(ContextError::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(ContextError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Drives `fut` to completion unless the context ends first
    ///
    /// When the context wins, `fut` is dropped, which aborts whatever it was
    /// doing (an in-flight HTTP request, a pending lock acquisition).
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ContextError::Cancelled),
            _ = deadline => Err(ContextError::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}
