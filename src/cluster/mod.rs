//! Cluster access: topology discovery, the kube adapter, and the scoped
//! connection context

pub mod client;
pub mod context;
pub mod inspector;

pub use client::KubeClusterApi;
pub use context::{ClusterContext, DEFAULT_CACHE_SYNC_TIMEOUT};
pub use inspector::{ClusterInspector, DiscoveryConfig};
