//! Install-time model: the discovered topology and the targets derived from it

use super::ports::WorkloadRef;
use serde::{Deserialize, Serialize};

// =============================================================================
// Cluster Topology
// =============================================================================

/// Snapshot of the cluster taken at the start of an install attempt
///
/// Built once by the cluster inspector and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    image_tag: String,
    registry: String,
    master_address: Option<String>,
    eligible_count: usize,
    eligible_nodes: Vec<String>,
}

impl ClusterTopology {
    pub(crate) fn new(
        image_tag: String,
        registry: String,
        master_address: Option<String>,
        eligible_count: usize,
        eligible_nodes: Vec<String>,
    ) -> Self {
        Self {
            image_tag,
            registry,
            master_address,
            eligible_count,
            eligible_nodes,
        }
    }

    pub fn image_tag(&self) -> &str {
        &self.image_tag
    }

    /// Registry endpoint (`host:port`)
    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn master_address(&self) -> Option<&str> {
        self.master_address.as_deref()
    }

    /// Number of engine instances expected to run
    pub fn eligible_count(&self) -> usize {
        self.eligible_count
    }

    /// Hostnames of the eligible nodes
    pub fn eligible_nodes(&self) -> &[String] {
        &self.eligible_nodes
    }

    pub fn deployment_target(&self) -> DeploymentTarget {
        DeploymentTarget {
            image_tag: self.image_tag.clone(),
            registry: self.registry.clone(),
        }
    }
}

// =============================================================================
// Deployment Target
// =============================================================================

/// Image tag and registry used to render the deploy manifests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub image_tag: String,
    pub registry: String,
}

// =============================================================================
// Readiness Target
// =============================================================================

/// A workload and the ready count it has to reach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessTarget {
    pub workload: WorkloadRef,
    pub expected: i32,
}

impl ReadinessTarget {
    pub fn new(workload: WorkloadRef, expected: i32) -> Self {
        Self { workload, expected }
    }
}
