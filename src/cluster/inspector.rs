//! Cluster Inspector
//!
//! Derives the install topology from the live node inventory: which nodes
//! may host the storage engine, where the test registry lives, and which
//! image tag to deploy.

use crate::domain::model::ClusterTopology;
use crate::domain::ports::{AddressKind, ClusterApi, NodeInfo};
use crate::error::{Error, Result};
use tracing::{debug, info};

// =============================================================================
// Constants
// =============================================================================

/// Label marking the control-plane node
pub const MASTER_ROLE_LABEL: &str = "node-role.kubernetes.io/master";

/// Label key marking nodes eligible for the storage engine
pub const ENGINE_LABEL: &str = "openebs.io/engine";

/// Label value marking nodes eligible for the storage engine
pub const ENGINE_LABEL_VALUE: &str = "mayastor";

/// NodePort the test registry listens on
pub const REGISTRY_PORT: u16 = 30291;

/// Image tag used when no override is given
pub const DEFAULT_IMAGE_TAG: &str = "ci";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for topology discovery
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Label whose presence marks the master node
    pub master_label: String,
    /// Eligibility label key
    pub engine_label: String,
    /// Eligibility label value
    pub engine_value: String,
    /// Registry port appended to the fallback anchor address
    pub registry_port: u16,
    /// Image tag override (`e2e_image_tag`)
    pub image_tag: Option<String>,
    /// Registry override (`e2e_docker_registry`), used verbatim
    pub registry: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            master_label: MASTER_ROLE_LABEL.to_string(),
            engine_label: ENGINE_LABEL.to_string(),
            engine_value: ENGINE_LABEL_VALUE.to_string(),
            registry_port: REGISTRY_PORT,
            image_tag: None,
            registry: None,
        }
    }
}

// =============================================================================
// Inspector
// =============================================================================

/// Builds a [`ClusterTopology`] from the cluster's node inventory
#[derive(Debug, Clone, Default)]
pub struct ClusterInspector {
    config: DiscoveryConfig,
}

impl ClusterInspector {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// List the nodes and derive the topology from them
    pub async fn discover(&self, api: &dyn ClusterApi) -> Result<ClusterTopology> {
        let nodes = api
            .list_nodes()
            .await
            .map_err(|e| Error::NoNodes(e.to_string()))?;

        debug!(count = nodes.len(), "Listed cluster nodes");

        let topology = self.inspect(&nodes)?;

        info!(
            tag = %topology.image_tag(),
            registry = %topology.registry(),
            instances = topology.eligible_count(),
            "Discovered cluster topology"
        );

        Ok(topology)
    }

    /// Derive the topology from an already listed node inventory
    pub fn inspect(&self, nodes: &[NodeInfo]) -> Result<ClusterTopology> {
        let mut master: Option<&str> = None;
        let mut eligible_count = 0usize;
        let mut node_ips: Vec<Option<&str>> = Vec::with_capacity(nodes.len());

        for node in nodes {
            let mut internal_ip = None;
            for address in node.addresses_of(AddressKind::InternalIp) {
                internal_ip = Some(address);
                if node.has_label(&self.config.master_label) {
                    master = Some(address);
                }
                // Counted per internal address: a dual-stack node counts
                // twice and its DaemonSet target will not be reached
                if self.is_eligible(node) {
                    eligible_count += 1;
                }
            }
            node_ips.push(internal_ip);
        }

        if eligible_count == 0 {
            return Err(Error::NoEligibleNodes {
                label: format!("{}={}", self.config.engine_label, self.config.engine_value),
            });
        }

        // Names come from the hostname addresses, a different address type
        // than the one counted above
        let eligible_nodes: Vec<String> = nodes
            .iter()
            .filter(|node| self.is_eligible(node))
            .flat_map(|node| node.addresses_of(AddressKind::Hostname))
            .map(str::to_string)
            .collect();

        if node_ips.is_empty() {
            return Err(Error::NoNodes("node list is empty".into()));
        }

        let image_tag = non_empty(self.config.image_tag.as_deref())
            .unwrap_or(DEFAULT_IMAGE_TAG)
            .to_string();

        let registry = match non_empty(self.config.registry.as_deref()) {
            Some(registry) => registry.to_string(),
            None => {
                let anchor = match master {
                    Some(master) => master,
                    None => node_ips
                        .iter()
                        .flatten()
                        .next()
                        .copied()
                        .ok_or_else(|| Error::NoNodes("no node reports an internal IP".into()))?,
                };
                format!("{}:{}", anchor, self.config.registry_port)
            }
        };

        Ok(ClusterTopology::new(
            image_tag,
            registry,
            master.map(str::to_string),
            eligible_count,
            eligible_nodes,
        ))
    }

    fn is_eligible(&self, node: &NodeInfo) -> bool {
        node.has_label_value(&self.config.engine_label, &self.config.engine_value)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
