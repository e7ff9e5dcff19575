//! Cluster Context
//!
//! Owns the kube client and the background node reflector for the lifetime
//! of a test run. Acquire it once with [`ClusterContext::connect`] and
//! release it with [`ClusterContext::shutdown`]; dropping it also stops the
//! reflector.

use super::client::KubeClusterApi;
use crate::error::Result;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::api::Api;
use kube::runtime::reflector::Store;
use kube::runtime::{reflector, watcher, WatchStreamExt};
use kube::{Client, ResourceExt};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long setup waits for the node cache to fill
pub const DEFAULT_CACHE_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Scoped handle to the cluster under test
pub struct ClusterContext {
    client: Client,
    nodes: Store<Node>,
    synced: bool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ClusterContext {
    /// Connect using the ambient kubeconfig / in-cluster config
    pub async fn connect(sync_timeout: Duration) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::start(client, sync_timeout).await)
    }

    /// Start the node reflector on an existing client and wait for it to sync
    ///
    /// A sync that does not finish within `sync_timeout` is logged; the
    /// context then lists nodes straight from the API server.
    pub async fn start(client: Client, sync_timeout: Duration) -> Self {
        let cancel = CancellationToken::new();
        let (nodes, writer) = reflector::store::<Node>();

        let api: Api<Node> = Api::all(client.clone());
        let stream = reflector(
            writer,
            watcher(api, watcher::Config::default()).default_backoff(),
        )
        .applied_objects();

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = stream.next() => match event {
                        Some(Ok(node)) => debug!(node = %node.name_any(), "Node cache updated"),
                        Some(Err(e)) => warn!(error = %e, "Node watch error"),
                        None => break,
                    },
                }
            }
            debug!("Node reflector stopped");
        });

        let synced = match tokio::time::timeout(sync_timeout, nodes.wait_until_ready()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = ?e, "Node cache writer dropped before sync");
                false
            }
            Err(_) => {
                warn!(timeout = ?sync_timeout, "Failed to sync node cache");
                false
            }
        };

        info!(synced, "Cluster context ready");

        Self {
            client,
            nodes,
            synced,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Cluster API adapter bound to this context
    pub fn api(&self) -> KubeClusterApi {
        if self.synced {
            KubeClusterApi::with_node_cache(self.client.clone(), self.nodes.clone())
        } else {
            KubeClusterApi::new(self.client.clone())
        }
    }

    /// Stop the background reflector and wait for it to exit
    ///
    /// This only tears down the local connection state, not the cluster.
    pub async fn shutdown(self) -> Result<()> {
        info!("Tearing down cluster context");
        self.cancel.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await.map_err(|e| {
                crate::error::Error::Internal(format!("Node reflector task failed: {}", e))
            })?;
        }
        Ok(())
    }
}

impl Drop for ClusterContext {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
