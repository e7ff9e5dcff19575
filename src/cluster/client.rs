//! Kubernetes adapter for the [`ClusterApi`] port

use crate::domain::ports::{AddressKind, ClusterApi, NodeAddress, NodeInfo, WorkloadKind, WorkloadRef};
use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::runtime::reflector::Store;
use kube::{Client, ResourceExt};
use tracing::debug;

/// Cluster reads backed by a kube client
///
/// Node listings are served from the reflector cache once it has synced;
/// workload status is always read from the API server.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
    nodes: Option<Store<Node>>,
}

impl KubeClusterApi {
    /// Adapter that always goes to the API server
    pub fn new(client: Client) -> Self {
        Self {
            client,
            nodes: None,
        }
    }

    /// Adapter that lists nodes from a synced reflector store
    pub fn with_node_cache(client: Client, nodes: Store<Node>) -> Self {
        Self {
            client,
            nodes: Some(nodes),
        }
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        if let Some(store) = &self.nodes {
            let cached = store.state();
            debug!(count = cached.len(), "Listing nodes from cache");
            return Ok(cached.iter().map(|node| node_info(node)).collect());
        }

        let api: Api<Node> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(node_info).collect())
    }

    async fn ready_count(&self, workload: &WorkloadRef) -> Result<i32> {
        let count = match workload.kind {
            WorkloadKind::DaemonSet => {
                let api: Api<DaemonSet> =
                    Api::namespaced(self.client.clone(), &workload.namespace);
                api.get(&workload.name)
                    .await?
                    .status
                    .map(|s| s.number_available.unwrap_or(0))
                    .unwrap_or(0)
            }
            WorkloadKind::Deployment => {
                let api: Api<Deployment> =
                    Api::namespaced(self.client.clone(), &workload.namespace);
                api.get(&workload.name)
                    .await?
                    .status
                    .and_then(|s| s.available_replicas)
                    .unwrap_or(0)
            }
        };
        Ok(count)
    }
}

/// Project a Kubernetes node onto the fields discovery looks at
pub fn node_info(node: &Node) -> NodeInfo {
    let addresses = node
        .status
        .as_ref()
        .and_then(|s| s.addresses.as_ref())
        .map(|addrs| {
            addrs
                .iter()
                .map(|a| NodeAddress::new(AddressKind::from_k8s(&a.type_), a.address.clone()))
                .collect()
        })
        .unwrap_or_default();

    NodeInfo {
        name: node.name_any(),
        addresses,
        labels: node.labels().clone(),
    }
}
