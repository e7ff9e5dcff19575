//! Mayastor E2E Install Harness
//!
//! Installs Mayastor onto an existing Kubernetes cluster from the
//! repository's deploy manifests and checks that it converges.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              Installer                                       │
//! │   Discovering → Rendering → Applying → WaitingReady → ProvisioningPools     │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │    Cluster      │  │    Manifest     │  │      Convergence            │  │
//! │  │    Inspector    │  │ Renderer/Applier│  │      Poller                 │  │
//! │  └────────┬────────┘  └────────┬────────┘  └─────────────┬───────────────┘  │
//! │           │                    │                         │                   │
//! │           │           ┌────────┴────────┐                │                   │
//! │           │           │ Pool Provisioner│                │                   │
//! │           │           └────────┬────────┘                │                   │
//! ├───────────┼────────────────────┼─────────────────────────┼───────────────────┤
//! │  ┌────────┴────────┐  ┌────────┴────────┐  ┌─────────────┴───────────────┐  │
//! │  │  ClusterApi     │  │ CommandRunner   │  │  ClusterContext             │  │
//! │  │  (kube client)  │  │ (kubectl, bash) │  │  (node reflector task)      │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cluster`]: Topology discovery, kube adapter and connection context
//! - [`manifest`]: Manifest rendering and `kubectl apply`
//! - [`readiness`]: Convergence polling
//! - [`pool`]: Per-node pool provisioning
//! - [`install`]: The install flow
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: Core domain types and traits
//! - [`error`]: Error types and handling

pub mod cluster;
pub mod crd;
pub mod domain;
pub mod error;
pub mod install;
pub mod manifest;
pub mod pool;
pub mod process;
pub mod readiness;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use cluster::{ClusterContext, ClusterInspector, DiscoveryConfig, KubeClusterApi};

pub use domain::model::{ClusterTopology, DeploymentTarget, ReadinessTarget};

pub use domain::ports::{
    AddressKind, NodeAddress, NodeInfo, WorkloadKind, WorkloadRef,
    CommandSpec, CommandOutput,
    ClusterApi, CommandRunner, ClusterApiRef, CommandRunnerRef,
};

pub use error::{Error, Result};

pub use install::{InstallConfig, InstallReport, InstallStage, Installer};

pub use manifest::{ManifestApplier, ManifestRenderer, PoolTemplate, RenderConfig};

pub use pool::{PoolInputs, PoolProvisioner, PoolSource, ProvisionedPool};

pub use process::SystemCommandRunner;

pub use readiness::{poll_until, ConvergencePoller, PollConfig, NOT_READY};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
