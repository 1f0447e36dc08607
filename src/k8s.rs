//! Kubernetes pod discovery over the core `pods` API.
//!
//! # How It Works
//!
//! 1. Lookups `GET` the pod list for the target and translate every pod that
//!    has an IP into an [`Endpoint`]
//! 2. Subscriptions `GET` the same path with `watch=true` and keep the
//!    response open
//! 3. Body chunks are reassembled into one watch record per line
//! 4. Each record updates the subscription's known set; endpoints seen for
//!    the first time are sent to the caller
//!
//! # Example
//!
//! ```ignore
//! use kube_pod_discovery::{KubernetesDiscovery, QueryTarget, ServiceDiscovery};
//!
//! let discovery = KubernetesDiscovery::try_default().await?;
//! let target = QueryTarget::new("default").label("app", "nginx");
//!
//! let handle = discovery.subscribe(
//!     &target,
//!     |update| println!("{update:?}"),
//!     |reason| println!("watch ended: {reason:?}"),
//! );
//!
//! // Later
//! handle.cancel_and_wait().await;
//! ```

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::TryStreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use tokio_util::sync::CancellationToken;

use crate::discovery::{CancellationHandle, ServiceDiscovery};
use crate::error::{CompletionReason, DiscoveryError, Result};
use crate::model::{ChangeRecord, Endpoint, QueryTarget, decode_pod_list};
use crate::reassembler::{DEFAULT_MAX_RECORD_LEN, RecordReassembler};
use crate::tracker::MembershipTracker;
use crate::transport::{BoxError, ByteStream, Transport};

/// Configuration for Kubernetes pod discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Deadline for lookups that do not pass their own.
    /// If `None`, such lookups wait indefinitely.
    pub lookup_timeout: Option<Duration>,

    /// How long a subscription waits for the watch response to start.
    /// Once streaming, a watch runs until cancelled or closed.
    pub connect_timeout: Option<Duration>,

    /// The longest single watch record accepted, in bytes.
    pub max_record_len: usize,
}

impl DiscoveryConfig {
    /// Creates the default configuration: no timeouts and a 4 MiB record limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lookup_timeout: None,
            connect_timeout: None,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
        }
    }

    /// Sets the default lookup deadline.
    #[must_use]
    pub fn lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = Some(timeout);
        self
    }

    /// Sets the watch connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the maximum watch record length.
    #[must_use]
    pub fn max_record_len(mut self, len: usize) -> Self {
        self.max_record_len = len;
        self
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Discovers pods through the Kubernetes API.
///
/// Generic over the [`Transport`] so tests can script responses; in
/// production it is a [`kube::Client`].
pub struct KubernetesDiscovery<T = kube::Client> {
    transport: Mutex<Option<T>>,
    config: DiscoveryConfig,
}

impl KubernetesDiscovery {
    /// Creates a discovery engine from the inferred cluster configuration
    /// (in-cluster service account or local kubeconfig).
    ///
    /// # Errors
    ///
    /// Fails with [`DiscoveryError::Unreachable`] if no usable configuration
    /// is found.
    pub async fn try_default() -> Result<Self> {
        let client = kube::Client::try_default()
            .await
            .map_err(|e| DiscoveryError::Unreachable(e.to_string()))?;

        Ok(Self::new(client))
    }
}

impl<T: Transport> KubernetesDiscovery<T> {
    /// Creates a discovery engine with the default configuration.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, DiscoveryConfig::default())
    }

    /// Creates a discovery engine with an explicit configuration.
    #[must_use]
    pub fn with_config(transport: T, config: DiscoveryConfig) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    fn transport(&self) -> Result<T> {
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DiscoveryError::ShutDown)
    }
}

impl<T: Transport> ServiceDiscovery for KubernetesDiscovery<T> {
    async fn lookup(
        &self,
        target: &QueryTarget,
        deadline: Option<Duration>,
    ) -> Result<Vec<Endpoint>> {
        let transport = self.transport()?;
        let path = target.list_path();
        let deadline = deadline.or(self.config.lookup_timeout);

        tracing::debug!("Looking up Kubernetes pods at {path}");

        let request = transport.get(&path);
        let response = match deadline {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| DiscoveryError::TimedOut(limit))?,
            None => request.await,
        };

        let body = read_body(response.map_err(unreachable_error)?).await?;
        let endpoints = decode_pod_list(&body)?;
        tracing::debug!(
            "Kubernetes lookup: {} endpoints for {}",
            endpoints.len(),
            target.namespace()
        );

        Ok(endpoints)
    }

    /// Spawns the watch on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    fn subscribe<N, C>(
        &self,
        target: &QueryTarget,
        mut on_next: N,
        on_complete: C,
    ) -> CancellationHandle
    where
        N: FnMut(Result<Vec<Endpoint>>) + Send + 'static,
        C: FnOnce(CompletionReason) + Send + 'static,
    {
        let transport = match self.transport() {
            Ok(transport) => transport,
            Err(err) => {
                on_next(Err(err.clone()));
                on_complete(CompletionReason::Failed(err));
                return CancellationHandle::inert();
            }
        };

        let session = WatchSession {
            transport,
            path: target.watch_path(),
            connect_timeout: self.config.connect_timeout,
            max_record_len: self.config.max_record_len,
        };

        let token = CancellationToken::new();
        let task = tokio::spawn(session.run(token.clone(), on_next, on_complete));
        CancellationHandle::new(token, task)
    }

    fn shutdown(&self) -> Result<()> {
        let released = self
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if released.is_some() {
            tracing::debug!("Kubernetes discovery shut down");
        }

        Ok(())
    }
}

/// Reads a complete response body.
async fn read_body(mut chunks: ByteStream) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = chunks.try_next().await.map_err(unreachable_error)? {
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

#[allow(clippy::needless_pass_by_value)]
fn unreachable_error(err: BoxError) -> DiscoveryError {
    DiscoveryError::Unreachable(err.to_string())
}

/// One subscription's watch request and its parameters.
struct WatchSession<T> {
    transport: T,
    path: String,
    connect_timeout: Option<Duration>,
    max_record_len: usize,
}

impl<T: Transport> WatchSession<T> {
    /// Background task that drives the watch and reports its outcome.
    async fn run<N, C>(self, token: CancellationToken, mut on_next: N, on_complete: C)
    where
        N: FnMut(Result<Vec<Endpoint>>) + Send,
        C: FnOnce(CompletionReason) + Send,
    {
        tracing::debug!("Starting Kubernetes pod watch at {}", self.path);

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => None,
            outcome = self.stream(&token, &mut on_next) => Some(outcome),
        };

        let Some(outcome) = outcome else {
            tracing::debug!("Kubernetes pod watch at {} cancelled", self.path);
            return;
        };

        if token.is_cancelled() {
            return;
        }

        let reason = match outcome {
            Ok(()) => {
                tracing::debug!("Kubernetes pod watch at {} closed by server", self.path);
                CompletionReason::Closed
            }

            Err(err) => {
                tracing::warn!("Kubernetes pod watch at {} failed: {err}", self.path);
                on_next(Err(err.clone()));
                CompletionReason::Failed(err)
            }
        };

        on_complete(reason);
    }

    /// Streams the watch until the body ends or fails.
    async fn stream<N>(&self, token: &CancellationToken, on_next: &mut N) -> Result<()>
    where
        N: FnMut(Result<Vec<Endpoint>>) + Send,
    {
        let request = self.transport.get(&self.path);
        let response = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| DiscoveryError::TimedOut(limit))?,
            None => request.await,
        };

        let mut chunks = response.map_err(unreachable_error)?;
        let mut reassembler = RecordReassembler::new(self.max_record_len);
        let mut tracker = MembershipTracker::new();
        let mut streaming = false;

        while let Some(chunk) = chunks
            .try_next()
            .await
            .map_err(|e| DiscoveryError::StreamTerminated(e.to_string()))?
        {
            if !streaming {
                tracing::debug!("Kubernetes pod watch at {} streaming", self.path);
                streaming = true;
            }

            reassembler.extend(&chunk);
            while let Some(record) = reassembler.next_record()? {
                apply(&record, &mut tracker, token, on_next)?;
            }
        }

        if let Some(record) = reassembler.finish()? {
            apply(&record, &mut tracker, token, on_next)?;
        }

        tracing::debug!(
            "Kubernetes pod watch at {} ended with {} known endpoints",
            self.path,
            tracker.len()
        );

        Ok(())
    }
}

/// Applies one record and delivers the resulting emission, if any.
fn apply<N>(
    record: &ChangeRecord,
    tracker: &mut MembershipTracker,
    token: &CancellationToken,
    on_next: &mut N,
) -> Result<()>
where
    N: FnMut(Result<Vec<Endpoint>>),
{
    if let ChangeRecord::Error(status) = record {
        return Err(DiscoveryError::StreamTerminated(describe(status)));
    }

    if let Some(endpoint) = tracker.apply(record)
        && !token.is_cancelled()
    {
        on_next(Ok(vec![endpoint]));
    }

    Ok(())
}

/// Summarizes a watch `ERROR` status.
fn describe(status: &Status) -> String {
    let message = status.message.as_deref().unwrap_or("watch error");
    match (status.reason.as_deref(), status.code) {
        (Some(reason), Some(code)) => format!("{reason} ({code}): {message}"),
        (Some(reason), None) => format!("{reason}: {message}"),
        (None, Some(code)) => format!("({code}): {message}"),
        (None, None) => message.to_string(),
    }
}
