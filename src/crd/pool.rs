//! MayastorPool CRD
//!
//! The per-node storage pool resource consumed by the storage engine. The
//! harness only creates these; it parses rendered manifests into this type to
//! catch template mistakes before they reach the cluster.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// MayastorPool places one storage pool on one node, backed by block devices.
#[derive(CustomResource, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "openebs.io",
    version = "v1alpha1",
    kind = "MayastorPool",
    plural = "mayastorpools",
    shortname = "msp",
    status = "MayastorPoolStatus",
    printcolumn = r#"{"name": "Node", "type": "string", "jsonPath": ".spec.node"}"#,
    printcolumn = r#"{"name": "State", "type": "string", "jsonPath": ".status.state"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MayastorPoolSpec {
    /// Node the pool lives on
    pub node: String,

    /// Block devices backing the pool
    pub disks: Vec<String>,
}

/// Pool state as reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PoolState {
    Pending,
    Online,
    Degraded,
    Faulted,
    Offline,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MayastorPoolStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PoolState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default)]
    pub disks: Vec<String>,

    /// Capacity in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,

    /// Used bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::{CustomResourceExt, ResourceExt};

    #[test]
    fn test_crd_identity() {
        let crd = MayastorPool::crd();
        assert_eq!(crd.spec.group, "openebs.io");
        assert_eq!(crd.spec.names.kind, "MayastorPool");
        assert_eq!(crd.spec.scope, "Namespaced");
    }

    #[test]
    fn test_parse_pool_manifest() {
        let yaml = r#"
apiVersion: "openebs.io/v1alpha1"
kind: MayastorPool
metadata:
  name: pool-on-node-1
  namespace: mayastor
spec:
  node: node-1
  disks: ["/dev/sdb"]
"#;
        let pool: MayastorPool = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(pool.name_any(), "pool-on-node-1");
        assert_eq!(pool.spec.node, "node-1");
        assert_eq!(pool.spec.disks, ["/dev/sdb"]);
        assert!(pool.status.is_none());
    }

    #[test]
    fn test_parse_status() {
        let status: MayastorPoolStatus =
            serde_yaml::from_str("state: online\ncapacity: 1073741824\nused: 0\n").unwrap();
        assert_eq!(status.state, Some(PoolState::Online));
        assert_eq!(status.capacity, Some(1 << 30));
    }
}
