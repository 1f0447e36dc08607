//! Membership model: query targets, endpoints, and the wire records they are built from.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use serde::Deserialize;
use serde::de::IgnoredAny;

use crate::error::Result;

/// Identifies the pods to resolve: a namespace and a label selector.
///
/// Selector entries are kept sorted, so two targets with the same entries
/// produce the same request path no matter the order they were added in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryTarget {
    namespace: String,
    selector: BTreeMap<String, String>,
}

impl QueryTarget {
    /// Creates a target matching every pod in `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            selector: BTreeMap::new(),
        }
    }

    /// Creates a target from a namespace and a complete label selector.
    #[must_use]
    pub fn with_selector<I, K, V>(namespace: impl Into<String>, selector: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            namespace: namespace.into(),
            selector: selector
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Adds a `key=value` requirement to the label selector.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.selector.insert(key.into(), value.into());
        self
    }

    /// The namespace to search.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The label selector entries.
    #[must_use]
    pub fn selector(&self) -> &BTreeMap<String, String> {
        &self.selector
    }

    /// Renders the selector in Kubernetes syntax, e.g. `app=nginx,tier=web`.
    #[must_use]
    pub fn label_selector(&self) -> String {
        self.selector
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Request path for a one-shot pod list.
    #[must_use]
    pub fn list_path(&self) -> String {
        self.path(false)
    }

    /// Request path for a pod watch stream.
    #[must_use]
    pub fn watch_path(&self) -> String {
        self.path(true)
    }

    fn path(&self, watch: bool) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if !self.selector.is_empty() {
            query.append_pair("labelSelector", &self.label_selector());
        }

        if watch {
            query.append_pair("watch", "true");
        }

        let query = query.finish();
        let mut path = format!("/api/v1/namespaces/{}/pods", self.namespace);
        if !query.is_empty() {
            path.push('?');
            path.push_str(&query);
        }

        path
    }
}

/// A resolved pod: its name and network address.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    /// The pod name.
    pub name: String,
    /// The pod IP address.
    pub address: String,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Translates a pod into an endpoint.
    ///
    /// Returns `None` for pods that have no name or no assigned IP yet.
    #[must_use]
    pub fn from_pod(pod: &Pod) -> Option<Self> {
        let name = pod.metadata.name.as_deref()?;
        let address = pod.status.as_ref()?.pod_ip.as_deref()?;

        if name.is_empty() || address.is_empty() {
            return None;
        }

        Some(Self::new(name, address))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.address)
    }
}

/// One line of a pod watch stream.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", content = "object", rename_all = "UPPERCASE")]
pub enum ChangeRecord {
    /// A pod was created.
    Added(Box<Pod>),
    /// A pod changed.
    Modified(Box<Pod>),
    /// A pod was removed.
    Deleted(Box<Pod>),
    /// A resource version checkpoint; carries no membership change.
    Bookmark(IgnoredAny),
    /// The API server aborted the watch.
    Error(Box<Status>),
}

#[derive(Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

/// Decodes a pod list body into endpoints, in list order.
///
/// An empty body is an empty membership. Pods without an address are skipped.
pub(crate) fn decode_pod_list(body: &[u8]) -> Result<Vec<Endpoint>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let list: PodList = serde_json::from_slice(body)?;
    Ok(list.items.iter().filter_map(Endpoint::from_pod).collect())
}
