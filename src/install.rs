//! Installer - drives the install flow
//!
//! `Discovering → Rendering → Applying → WaitingReady → ProvisioningPools → Done`
//!
//! Stages run strictly in order. The first failure aborts the flow and is
//! returned as [`Error::Install`] tagged with the stage it happened in.
//! Manifests are applied with kubectl rather than built as API objects so
//! that the repository's own deploy files are what gets tested.

use crate::cluster::{ClusterInspector, DiscoveryConfig};
use crate::domain::model::{ClusterTopology, ReadinessTarget};
use crate::domain::ports::{ClusterApiRef, CommandRunnerRef, WorkloadRef};
use crate::error::{Error, Result};
use crate::manifest::applier::DEFAULT_DEPLOY_DIR;
use crate::manifest::{absolute_path, ManifestApplier, ManifestRenderer, RenderConfig};
use crate::pool::{PoolInputs, PoolProvisioner, PoolSource, ProvisionedPool, DEFAULT_POOL_TEMPLATE};
use crate::readiness::{ConvergencePoller, PollConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

// =============================================================================
// Stages
// =============================================================================

/// Stage of the install flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallStage {
    Discovering,
    Rendering,
    Applying,
    WaitingReady,
    ProvisioningPools,
    Done,
}

impl std::fmt::Display for InstallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallStage::Discovering => write!(f, "discovering"),
            InstallStage::Rendering => write!(f, "rendering"),
            InstallStage::Applying => write!(f, "applying"),
            InstallStage::WaitingReady => write!(f, "waiting for readiness"),
            InstallStage::ProvisioningPools => write!(f, "provisioning pools"),
            InstallStage::Done => write!(f, "done"),
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Static manifests applied before the rendered ones, in order
pub const STATIC_MANIFESTS: [&str; 5] = [
    "namespace.yaml",
    "storage-class.yaml",
    "moac-rbac.yaml",
    "mayastorpoolcrd.yaml",
    "nats-deployment.yaml",
];

/// Namespace the engine is installed into
pub const DEFAULT_NAMESPACE: &str = "mayastor";

/// Node-local engine daemon set
pub const ENGINE_DAEMON_SET: &str = "mayastor";

/// Singleton control-plane deployment
pub const CONTROL_DEPLOYMENT: &str = "moac";

/// Configuration for an install run
#[derive(Debug, Clone)]
pub struct InstallConfig {
    pub discovery: DiscoveryConfig,
    pub render: RenderConfig,
    /// Directory holding the static manifests
    pub deploy_dir: PathBuf,
    pub static_manifests: Vec<String>,
    pub kubectl: String,
    pub namespace: String,
    pub engine_daemon_set: String,
    pub control_deployment: String,
    pub poll: PollConfig,
    pub pool_template: PathBuf,
    pub pools: PoolInputs,
}

impl InstallConfig {
    /// Default layout under a repository root
    ///
    /// A relative root is resolved against the current working directory, so
    /// every derived path is absolute.
    pub fn for_repo(root: impl AsRef<Path>) -> Self {
        let root = absolute_path(root);
        let root = root.as_path();
        Self {
            discovery: DiscoveryConfig::default(),
            render: RenderConfig::for_repo(root),
            deploy_dir: root.join(DEFAULT_DEPLOY_DIR),
            static_manifests: STATIC_MANIFESTS.iter().map(|m| m.to_string()).collect(),
            kubectl: "kubectl".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            engine_daemon_set: ENGINE_DAEMON_SET.to_string(),
            control_deployment: CONTROL_DEPLOYMENT.to_string(),
            poll: PollConfig::default(),
            pool_template: root.join(DEFAULT_POOL_TEMPLATE),
            pools: PoolInputs::default(),
        }
    }

    /// Reject settings the flow cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval.is_zero() {
            return Err(Error::Configuration("poll interval must be non-zero".into()));
        }
        if self.poll.interval >= self.poll.timeout {
            return Err(Error::Configuration(format!(
                "poll interval {:?} must be shorter than the readiness timeout {:?}",
                self.poll.interval, self.poll.timeout
            )));
        }
        if self.namespace.is_empty() {
            return Err(Error::Configuration("namespace must not be empty".into()));
        }
        Ok(())
    }

    /// Workloads to wait on for a topology, in order
    pub fn readiness_targets(&self, topology: &ClusterTopology) -> Vec<ReadinessTarget> {
        vec![
            ReadinessTarget::new(
                WorkloadRef::daemon_set(&self.namespace, &self.engine_daemon_set),
                topology.eligible_count() as i32,
            ),
            ReadinessTarget::new(
                WorkloadRef::deployment(&self.namespace, &self.control_deployment),
                1,
            ),
        ]
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self::for_repo(".")
    }
}

// =============================================================================
// Report
// =============================================================================

/// Readiness reached by one workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadReadiness {
    pub workload: String,
    pub ready: i32,
}

/// Outcome of a successful install
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub topology: ClusterTopology,
    pub applied: Vec<String>,
    pub readiness: Vec<WorkloadReadiness>,
    pub pools: Vec<ProvisionedPool>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// =============================================================================
// Installer
// =============================================================================

/// Runs the install flow against a cluster
pub struct Installer {
    config: InstallConfig,
    inspector: ClusterInspector,
    renderer: ManifestRenderer,
    applier: Arc<ManifestApplier>,
    poller: ConvergencePoller,
    provisioner: PoolProvisioner,
    cluster: ClusterApiRef,
}

impl Installer {
    pub fn new(config: InstallConfig, cluster: ClusterApiRef, runner: CommandRunnerRef) -> Self {
        let applier = Arc::new(
            ManifestApplier::new(runner.clone(), config.deploy_dir.clone())
                .with_kubectl(config.kubectl.clone()),
        );

        Self {
            inspector: ClusterInspector::new(config.discovery.clone()),
            renderer: ManifestRenderer::new(runner, config.render.clone()),
            poller: ConvergencePoller::new(cluster.clone(), config.poll),
            provisioner: PoolProvisioner::new(applier.clone(), config.pool_template.clone()),
            applier,
            cluster,
            config,
        }
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Run every stage, stopping at the first failure
    pub async fn run(&self) -> Result<InstallReport> {
        self.config.validate()?;

        let started_at = Utc::now();
        let mut stage = InstallStage::Discovering;
        info!(stage = %stage, "Starting install");

        let result = self.run_stages(&mut stage, started_at).await;
        match &result {
            Ok(report) => info!(
                pools = report.pools.len(),
                elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
                "Install complete"
            ),
            Err(e) => error!(stage = %stage, error = %e, "Install aborted"),
        }
        result.map_err(|e| e.in_stage(stage))
    }

    async fn run_stages(
        &self,
        stage: &mut InstallStage,
        started_at: DateTime<Utc>,
    ) -> Result<InstallReport> {
        let topology = self.inspector.discover(self.cluster.as_ref()).await?;

        enter(stage, InstallStage::Rendering);
        let rendered = self.renderer.render(&topology.deployment_target()).await?;

        enter(stage, InstallStage::Applying);
        let mut applied = Vec::new();
        for manifest in &self.config.static_manifests {
            self.applier.apply_deploy_file(manifest).await?;
            applied.push(manifest.clone());
        }
        for file in &rendered.files {
            self.applier.apply_file(file).await?;
            applied.push(file.display().to_string());
        }

        enter(stage, InstallStage::WaitingReady);
        let mut readiness = Vec::new();
        for target in self.config.readiness_targets(&topology) {
            let ready = self.poller.wait_ready(&target).await?;
            readiness.push(WorkloadReadiness {
                workload: target.workload.to_string(),
                ready,
            });
        }

        enter(stage, InstallStage::ProvisioningPools);
        let source = PoolSource::resolve(&self.config.pools)?;
        let pools = self
            .provisioner
            .provision(&source, topology.eligible_nodes())
            .await?;

        enter(stage, InstallStage::Done);
        Ok(InstallReport {
            topology,
            applied,
            readiness,
            pools,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

fn enter(current: &mut InstallStage, next: InstallStage) {
    info!(from = %current, to = %next, "Install stage");
    *current = next;
}
