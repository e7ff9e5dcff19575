//! Pool Provisioner
//!
//! Creates one storage pool per eligible node once the engine is running.
//! Pools come either from an externally supplied list of manifest files or
//! from the pool template rendered for every node with a single device.
//! Neither mode waits for the pools to come online.

use crate::crd::MayastorPool;
use crate::manifest::{ManifestApplier, PoolTemplate};
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Pool template, relative to the repository root
pub const DEFAULT_POOL_TEMPLATE: &str = "test/e2e/install/deploy/pool.yaml.template";

// =============================================================================
// Pool Inputs
// =============================================================================

/// Raw pool inputs as read from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolInputs {
    /// Comma-separated manifest paths (`e2e_pool_yaml_files`)
    pub yaml_files: Option<String>,
    /// Device for every pool (`e2e_pool_device`)
    pub device: Option<String>,
}

/// How pools get created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolSource {
    /// Apply these manifests as they are
    ManifestList(Vec<PathBuf>),
    /// Render the template for each node with this device
    DeviceTemplate { device: String },
}

impl PoolSource {
    /// Pick the pool mode from the raw inputs
    ///
    /// The manifest list wins when both inputs are set.
    pub fn resolve(inputs: &PoolInputs) -> Result<Self> {
        let files: Vec<PathBuf> = inputs
            .yaml_files
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(PathBuf::from)
            .collect();

        let device = inputs
            .device
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        match (files.is_empty(), device) {
            (false, Some(device)) => {
                warn!(
                    device = %device,
                    "Both e2e_pool_yaml_files and e2e_pool_device are set, using the manifest list"
                );
                Ok(PoolSource::ManifestList(files))
            }
            (false, None) => Ok(PoolSource::ManifestList(files)),
            (true, Some(device)) => Ok(PoolSource::DeviceTemplate {
                device: device.to_string(),
            }),
            (true, None) => Err(Error::Configuration(
                "Neither e2e_pool_yaml_files nor e2e_pool_device specified".into(),
            )),
        }
    }
}

// =============================================================================
// Provisioner
// =============================================================================

/// A pool manifest that was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedPool {
    /// Target node, when the harness rendered the manifest
    pub node: Option<String>,
    /// Manifest file or rendered resource name
    pub manifest: String,
}

/// Applies pool manifests for the eligible nodes
pub struct PoolProvisioner {
    applier: Arc<ManifestApplier>,
    template: PathBuf,
}

impl PoolProvisioner {
    pub fn new(applier: Arc<ManifestApplier>, template: impl Into<PathBuf>) -> Self {
        Self {
            applier,
            template: template.into(),
        }
    }

    /// Create the pools described by `source` for `nodes`
    pub async fn provision(
        &self,
        source: &PoolSource,
        nodes: &[String],
    ) -> Result<Vec<ProvisionedPool>> {
        match source {
            PoolSource::ManifestList(files) => self.apply_manifests(files).await,
            PoolSource::DeviceTemplate { device } => self.apply_template(device, nodes).await,
        }
    }

    async fn apply_manifests(&self, files: &[PathBuf]) -> Result<Vec<ProvisionedPool>> {
        let mut pools = Vec::with_capacity(files.len());
        for file in files {
            info!(manifest = %file.display(), "Applying pool manifest");
            self.applier.apply_file(file).await?;
            pools.push(ProvisionedPool {
                node: None,
                manifest: file.display().to_string(),
            });
        }
        Ok(pools)
    }

    async fn apply_template(&self, device: &str, nodes: &[String]) -> Result<Vec<ProvisionedPool>> {
        let template = PoolTemplate::load(&self.template)?;
        let mut pools = Vec::with_capacity(nodes.len());

        for node in nodes {
            info!(node = %node, device = %device, "Creating pool");

            let document = template.render(node, device);
            let pool = check_rendered_pool(&document, node, template.source())?;
            let name = pool.metadata.name.unwrap_or_else(|| format!("pool-on-{}", node));

            self.applier.apply_document(&name, &document).await?;
            pools.push(ProvisionedPool {
                node: Some(node.clone()),
                manifest: name,
            });
        }
        Ok(pools)
    }
}

/// Parse a rendered pool manifest and check it targets `node`
fn check_rendered_pool(document: &str, node: &str, source: &str) -> Result<MayastorPool> {
    let pool: MayastorPool = serde_yaml::from_str(document).map_err(|e| Error::Render {
        what: source.to_string(),
        reason: format!("rendered pool for {} is not a MayastorPool: {}", node, e),
    })?;

    if pool.spec.node != node {
        return Err(Error::Render {
            what: source.to_string(),
            reason: format!(
                "rendered pool targets node {:?}, expected {:?}",
                pool.spec.node, node
            ),
        });
    }

    Ok(pool)
}
