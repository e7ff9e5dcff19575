//! Domain Ports - Core trait definitions for the install harness
//!
//! These traits define the boundaries between the install flow and the
//! systems it drives: the cluster API and external processes.
//! Adapters implement these traits to provide concrete functionality.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

// =============================================================================
// Node Inventory Types
// =============================================================================

/// Kind of a node address, as reported in the node status
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    InternalIp,
    ExternalIp,
    Hostname,
    InternalDns,
    ExternalDns,
    Other(String),
}

impl AddressKind {
    /// Map the Kubernetes address type string
    pub fn from_k8s(type_: &str) -> Self {
        match type_ {
            "InternalIP" => AddressKind::InternalIp,
            "ExternalIP" => AddressKind::ExternalIp,
            "Hostname" => AddressKind::Hostname,
            "InternalDNS" => AddressKind::InternalDns,
            "ExternalDNS" => AddressKind::ExternalDns,
            other => AddressKind::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for AddressKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressKind::InternalIp => write!(f, "InternalIP"),
            AddressKind::ExternalIp => write!(f, "ExternalIP"),
            AddressKind::Hostname => write!(f, "Hostname"),
            AddressKind::InternalDns => write!(f, "InternalDNS"),
            AddressKind::ExternalDns => write!(f, "ExternalDNS"),
            AddressKind::Other(other) => write!(f, "{}", other),
        }
    }
}

/// A single typed node address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    pub kind: AddressKind,
    pub address: String,
}

impl NodeAddress {
    pub fn new(kind: AddressKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
        }
    }
}

/// Cluster node as seen by the harness
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node name
    pub name: String,
    /// Addresses in status order
    pub addresses: Vec<NodeAddress>,
    /// Node labels
    pub labels: BTreeMap<String, String>,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an address (builder style)
    pub fn with_address(mut self, kind: AddressKind, address: impl Into<String>) -> Self {
        self.addresses.push(NodeAddress::new(kind, address));
        self
    }

    /// Add a label (builder style)
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Addresses of the given kind, in status order
    pub fn addresses_of(&self, kind: AddressKind) -> impl Iterator<Item = &str> + '_ {
        self.addresses
            .iter()
            .filter(move |a| a.kind == kind)
            .map(|a| a.address.as_str())
    }

    pub fn has_label(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }

    pub fn has_label_value(&self, key: &str, value: &str) -> bool {
        self.labels.get(key).map(|v| v == value).unwrap_or(false)
    }
}

// =============================================================================
// Workload Types
// =============================================================================

/// Kind of workload the harness waits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    DaemonSet,
    Deployment,
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadKind::DaemonSet => write!(f, "DaemonSet"),
            WorkloadKind::Deployment => write!(f, "Deployment"),
        }
    }
}

/// Reference to a namespaced workload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
}

impl WorkloadRef {
    pub fn daemon_set(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: WorkloadKind::DaemonSet,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn deployment(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: WorkloadKind::Deployment,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

// =============================================================================
// Cluster API Port
// =============================================================================

/// Port for the reads the harness performs against the cluster
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List every node in the cluster
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>>;

    /// Current available-replica count of a workload
    ///
    /// `numberAvailable` for daemon sets, `availableReplicas` for deployments.
    async fn ready_count(&self, workload: &WorkloadRef) -> Result<i32>;
}

// =============================================================================
// External Process Port
// =============================================================================

/// An external command to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory, inherited when unset
    pub current_dir: Option<PathBuf>,
    /// Extra environment on top of the inherited one
    pub env: BTreeMap<String, String>,
    /// Data written to the child's stdin
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Outcome of an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Combined stdout and stderr
    pub output: String,
}

impl CommandOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            output: output.into(),
        }
    }

    pub fn failure(code: i32, output: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            output: output.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Port for running external processes
///
/// An `Err` means the process could not be run at all; a non-zero exit is
/// reported through [`CommandOutput`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ClusterApiRef = Arc<dyn ClusterApi>;
pub type CommandRunnerRef = Arc<dyn CommandRunner>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_kind_mapping() {
        assert_eq!(AddressKind::from_k8s("InternalIP"), AddressKind::InternalIp);
        assert_eq!(AddressKind::from_k8s("Hostname"), AddressKind::Hostname);
        assert_eq!(
            AddressKind::from_k8s("Weird"),
            AddressKind::Other("Weird".into())
        );
        assert_eq!(format!("{}", AddressKind::InternalIp), "InternalIP");
    }

    #[test]
    fn test_node_label_lookup() {
        let node = NodeInfo::new("node-1")
            .with_label("openebs.io/engine", "mayastor")
            .with_label("node-role.kubernetes.io/master", "");

        assert!(node.has_label_value("openebs.io/engine", "mayastor"));
        assert!(!node.has_label_value("openebs.io/engine", "jiva"));
        assert!(node.has_label("node-role.kubernetes.io/master"));
    }

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("kubectl").args(["apply", "-f", "namespace.yaml"]);
        assert_eq!(spec.to_string(), "kubectl apply -f namespace.yaml");
        assert!(spec.stdin.is_none());
    }

    #[test]
    fn test_workload_display() {
        let ds = WorkloadRef::daemon_set("mayastor", "mayastor");
        assert_eq!(ds.to_string(), "DaemonSet mayastor/mayastor");
    }
}
