//! The capability shared by every discovery backend.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{CompletionReason, Result};
use crate::model::{Endpoint, QueryTarget};

/// Resolves and tracks the endpoints matching a [`QueryTarget`].
pub trait ServiceDiscovery: Send + Sync {
    /// Fetches the current endpoints once.
    ///
    /// `deadline` bounds the wait for the response to start, not the body
    /// read after it; `None` falls back to the backend's default.
    ///
    /// # Errors
    ///
    /// Fails with [`Unreachable`](crate::DiscoveryError::Unreachable),
    /// [`TimedOut`](crate::DiscoveryError::TimedOut) or
    /// [`Decoding`](crate::DiscoveryError::Decoding). Nothing is retried.
    fn lookup(
        &self,
        target: &QueryTarget,
        deadline: Option<Duration>,
    ) -> impl Future<Output = Result<Vec<Endpoint>>> + Send;

    /// Tracks the endpoints matching `target` until cancelled or the stream ends.
    ///
    /// `on_next` receives each newly seen endpoint. If the subscription
    /// fails, `on_next` receives the error once and `on_complete` is then
    /// called with [`CompletionReason::Failed`]. A normal end of stream
    /// reports [`CompletionReason::Closed`]. Cancelled subscriptions report
    /// nothing.
    fn subscribe<N, C>(
        &self,
        target: &QueryTarget,
        on_next: N,
        on_complete: C,
    ) -> CancellationHandle
    where
        N: FnMut(Result<Vec<Endpoint>>) + Send + 'static,
        C: FnOnce(CompletionReason) + Send + 'static;

    /// Releases the backend's transport resources. Idempotent.
    ///
    /// Outstanding subscriptions should be cancelled first.
    ///
    /// # Errors
    ///
    /// Backends may report failures to release resources.
    fn shutdown(&self) -> Result<()>;
}

/// Stops a subscription.
///
/// Dropping the handle leaves the subscription running.
#[derive(Debug)]
pub struct CancellationHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CancellationHandle {
    pub(crate) fn new(token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            token,
            task: Some(task),
        }
    }

    /// A handle for a subscription with nothing left to run.
    pub(crate) fn inert() -> Self {
        Self {
            token: CancellationToken::new(),
            task: None,
        }
    }

    /// Requests cancellation without waiting for it.
    ///
    /// A notification already being delivered may still arrive.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the subscription has stopped running.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits for the subscription to stop, by completion or cancellation.
    ///
    /// Once this returns, no callback will run again.
    pub async fn join(mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        if let Err(e) = task.await {
            tracing::error!("subscription task failed: {e}");
        }
    }

    /// Cancels the subscription and waits until that is acknowledged.
    ///
    /// Once this returns, no notification or completion will be delivered.
    pub async fn cancel_and_wait(self) {
        self.cancel();
        self.join().await;
    }
}
