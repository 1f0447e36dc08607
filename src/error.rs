//! Error kinds and subscription completion reasons.

use std::time::Duration;

use thiserror::Error;

/// Error type for discovery failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The Kubernetes API could not be reached, or it rejected the request.
    #[error("Kubernetes API unreachable: {0}")]
    Unreachable(String),

    /// No response arrived before the deadline.
    #[error("timed out after {0:?} waiting for the Kubernetes API")]
    TimedOut(Duration),

    /// A response body or a watch record was not valid.
    #[error("failed to decode Kubernetes response: {0}")]
    Decoding(String),

    /// The watch stream failed after it was established.
    #[error("watch stream terminated: {0}")]
    StreamTerminated(String),

    /// A single watch record grew past the configured limit.
    #[error("watch record exceeds the {limit} byte limit")]
    RecordTooLarge {
        /// The configured maximum record length in bytes.
        limit: usize,
    },

    /// The discovery engine was used after [`shutdown`](crate::ServiceDiscovery::shutdown).
    #[error("discovery has been shut down")]
    ShutDown,
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decoding(err.to_string())
    }
}

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Why a subscription stopped delivering updates.
///
/// Cancelled subscriptions never report a completion reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionReason {
    /// The far end closed the watch stream normally.
    Closed,
    /// The subscription failed; the same error was delivered to `on_next` first.
    Failed(DiscoveryError),
}

impl CompletionReason {
    /// Returns the error if the subscription failed.
    #[must_use]
    pub fn error(&self) -> Option<&DiscoveryError> {
        match self {
            Self::Closed => None,
            Self::Failed(err) => Some(err),
        }
    }
}
