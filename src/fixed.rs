//! Fixed-membership backend for local runs and tests.

use std::time::Duration;

use crate::discovery::{CancellationHandle, ServiceDiscovery};
use crate::error::{CompletionReason, Result};
use crate::model::{Endpoint, QueryTarget};

/// Serves the same endpoints for every target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticDiscovery {
    endpoints: Vec<Endpoint>,
}

impl StaticDiscovery {
    /// Creates a backend that always resolves to `endpoints`.
    #[must_use]
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        Self {
            endpoints: endpoints.into_iter().collect(),
        }
    }

    /// The configured endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

impl ServiceDiscovery for StaticDiscovery {
    async fn lookup(
        &self,
        _target: &QueryTarget,
        _deadline: Option<Duration>,
    ) -> Result<Vec<Endpoint>> {
        Ok(self.endpoints.clone())
    }

    /// Delivers the configured endpoints once, before returning. Never completes.
    fn subscribe<N, C>(
        &self,
        _target: &QueryTarget,
        mut on_next: N,
        _on_complete: C,
    ) -> CancellationHandle
    where
        N: FnMut(Result<Vec<Endpoint>>) + Send + 'static,
        C: FnOnce(CompletionReason) + Send + 'static,
    {
        on_next(Ok(self.endpoints.clone()));
        CancellationHandle::inert()
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
