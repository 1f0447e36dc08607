//! Known-set bookkeeping for a single subscription.

use std::collections::HashSet;

use crate::model::{ChangeRecord, Endpoint};

/// Applies watch records to the set of live endpoints.
///
/// Only the first sighting of an endpoint is reported. Deletions prune the
/// set without being reported.
#[derive(Debug, Default)]
pub(crate) struct MembershipTracker {
    known: HashSet<Endpoint>,
}

impl MembershipTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Applies one record and returns the endpoint to emit, if any.
    ///
    /// `ERROR` records are the caller's to handle; here they change nothing.
    pub(crate) fn apply(&mut self, record: &ChangeRecord) -> Option<Endpoint> {
        match record {
            ChangeRecord::Added(pod) | ChangeRecord::Modified(pod) => {
                let endpoint = Endpoint::from_pod(pod)?;
                if self.known.insert(endpoint.clone()) {
                    tracing::debug!("adding endpoint: {endpoint}");
                    Some(endpoint)
                } else {
                    tracing::trace!("endpoint already known: {endpoint}");
                    None
                }
            }

            ChangeRecord::Deleted(pod) => {
                let endpoint = Endpoint::from_pod(pod)?;
                if self.known.remove(&endpoint) {
                    tracing::debug!("removing endpoint: {endpoint}");
                }

                None
            }

            ChangeRecord::Bookmark(_) | ChangeRecord::Error(_) => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.known.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, endpoint: &Endpoint) -> bool {
        self.known.contains(endpoint)
    }
}
