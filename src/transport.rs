//! How requests reach the Kubernetes API.
//!
//! The discovery engine only needs to issue a GET and read the response body
//! as it arrives. [`kube::Client`] provides that on top of its own connection
//! pool, TLS and cluster configuration; tests substitute scripted transports.

use std::future::Future;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use http_body_util::BodyExt;
use kube::client::Body;

/// Error type for transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A response body, delivered chunk by chunk in arrival order.
pub type ByteStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// Issues GET requests against the Kubernetes API.
///
/// Clones must share the underlying connection resources.
pub trait Transport: Clone + Send + Sync + 'static {
    /// Sends a GET for `path` and resolves once the response headers arrive.
    ///
    /// Non-success statuses are errors. Dropping the returned future or
    /// stream cancels the request and releases its connection.
    fn get(&self, path: &str) -> impl Future<Output = Result<ByteStream, BoxError>> + Send;
}

impl Transport for kube::Client {
    async fn get(&self, path: &str) -> Result<ByteStream, BoxError> {
        let request = http::Request::get(path).body(Body::from(Vec::new()))?;
        let response = self.send(request).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("GET {path} returned {status}").into());
        }

        let chunks = BodyExt::into_data_stream(response.into_body())
            .map_err(|err| -> BoxError { err.to_string().into() });

        Ok(chunks.boxed())
    }
}
