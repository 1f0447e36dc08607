#![deny(missing_docs)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Label-selector pod discovery for Kubernetes.
//!
//! Clients that need live service membership often poll the full pod list
//! over and over. This crate resolves the pods matching a label selector once,
//! or watches them and reports each pod as it becomes reachable, without
//! re-listing.
//!
//! # Features
//!
//! - **One-shot lookup**: the current pods with an assigned IP, with a deadline
//! - **Live subscription**: a single long-lived watch, reassembled from the
//!   raw response stream and deduplicated per subscription
//! - **Cancellation**: a handle that stops the watch and closes its connection
//! - **Static backend**: a fixed endpoint list behind the same trait, for
//!   local runs and tests
//!
//! # Usage
//!
//! ```ignore
//! use std::time::Duration;
//! use kube_pod_discovery::{KubernetesDiscovery, QueryTarget, ServiceDiscovery};
//!
//! let discovery = KubernetesDiscovery::try_default().await?;
//! let target = QueryTarget::new("default").label("app", "nginx");
//!
//! // Point-in-time membership
//! let endpoints = discovery.lookup(&target, Some(Duration::from_secs(5))).await?;
//!
//! // Live membership: each newly reachable pod is delivered once
//! let handle = discovery.subscribe(
//!     &target,
//!     |update| match update {
//!         Ok(added) => println!("added: {added:?}"),
//!         Err(e) => eprintln!("watch failed: {e}"),
//!     },
//!     |reason| println!("watch ended: {reason:?}"),
//! );
//!
//! handle.cancel_and_wait().await;
//! discovery.shutdown()?;
//! ```

mod discovery;
mod error;
mod fixed;
mod k8s;
mod model;
mod reassembler;
mod tracker;
mod transport;

pub use discovery::{CancellationHandle, ServiceDiscovery};
pub use error::{CompletionReason, DiscoveryError, Result};
pub use fixed::StaticDiscovery;
pub use k8s::{DiscoveryConfig, KubernetesDiscovery};
pub use model::{ChangeRecord, Endpoint, QueryTarget};
pub use transport::{BoxError, ByteStream, Transport};
