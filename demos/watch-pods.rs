//! Watch example demonstrating kube-pod-discovery lookups and subscriptions.
//!
//! Lists the pods matching a label selector, then watches for new ones for a
//! while and prints each pod as it becomes reachable.
//!
//! # Running
//!
//! Uses the current kubeconfig context, or the pod's service account when run
//! inside a cluster. The account needs `list` and `watch` on pods.
//!
//! # Environment Variables
//!
//! - `POD_NAMESPACE`: namespace to search (default: default)
//! - `POD_SELECTOR`: label selector as `key=value,...` (default: app=nginx)
//! - `WATCH_SECONDS`: how long to watch before exiting (default: 60)

use std::env;
use std::time::Duration;

use kube_pod_discovery::{
    CompletionReason, DiscoveryConfig, KubernetesDiscovery, QueryTarget, ServiceDiscovery,
};
use tokio::time::sleep;
use tracing::{Level, error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    // Read configuration from environment
    let namespace = env::var("POD_NAMESPACE").unwrap_or_else(|_| "default".to_string());
    let selector = env::var("POD_SELECTOR").unwrap_or_else(|_| "app=nginx".to_string());
    let watch_seconds: u64 = env::var("WATCH_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);

    let target = QueryTarget::with_selector(
        namespace,
        selector
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim())),
    );

    info!("Namespace: {}", target.namespace());
    info!("Selector: {}", target.label_selector());

    let client = kube::Client::try_default().await?;
    let config = DiscoveryConfig::new()
        .lookup_timeout(Duration::from_secs(5))
        .connect_timeout(Duration::from_secs(5));
    let discovery = KubernetesDiscovery::with_config(client, config);

    let endpoints = discovery.lookup(&target, None).await?;
    info!("Found {} pods", endpoints.len());
    for endpoint in &endpoints {
        info!("  {endpoint}");
    }

    info!("Watching for {watch_seconds}s...");
    let handle = discovery.subscribe(
        &target,
        |update| match update {
            Ok(added) => {
                for endpoint in added {
                    info!("Pod reachable: {endpoint}");
                }
            }

            Err(e) => error!("Watch failed: {e}"),
        },
        |reason| match reason {
            CompletionReason::Closed => warn!("Watch closed by the API server"),
            CompletionReason::Failed(e) => warn!("Watch ended: {e}"),
        },
    );

    sleep(Duration::from_secs(watch_seconds)).await;

    handle.cancel_and_wait().await;
    discovery.shutdown()?;
    info!("Done");

    Ok(())
}
