//! Mayastor E2E Install Harness
//!
//! Installs Mayastor onto the cluster in the current kubeconfig context,
//! waits for it to converge and creates one pool per eligible node.
//! Exits non-zero, with the failing command's output, if any stage fails.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mayastor_e2e_install::cluster::DEFAULT_CACHE_SYNC_TIMEOUT;
use mayastor_e2e_install::{
    ClusterContext, InstallConfig, Installer, PollConfig, PoolInputs, SystemCommandRunner,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Mayastor E2E Install Harness - install from deploy manifests and wait for convergence
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Repository root holding deploy/, scripts/ and test/
    #[arg(long, env = "REPO_ROOT", default_value = ".")]
    repo_root: PathBuf,

    /// Image tag to deploy
    #[arg(long, env = "e2e_image_tag")]
    image_tag: Option<String>,

    /// Registry to pull images from (defaults to the master or first node on port 30291)
    #[arg(long, env = "e2e_docker_registry")]
    registry: Option<String>,

    /// Comma-separated pool manifests to apply instead of rendering the pool template
    #[arg(long, env = "e2e_pool_yaml_files")]
    pool_yaml_files: Option<String>,

    /// Device to create a pool on, on every eligible node
    #[arg(long, env = "e2e_pool_device")]
    pool_device: Option<String>,

    /// Static deploy directory (defaults to <repo-root>/deploy)
    #[arg(long, env = "DEPLOY_DIR")]
    deploy_dir: Option<PathBuf>,

    /// Directory holding pool.yaml.template (defaults to <repo-root>/test/e2e/install/deploy)
    #[arg(long, env = "TEST_DEPLOY_DIR")]
    test_deploy_dir: Option<PathBuf>,

    /// Manifest generation script (defaults to <repo-root>/scripts/generate-deploy-yamls.sh)
    #[arg(long, env = "RENDER_SCRIPT")]
    render_script: Option<PathBuf>,

    /// Output directory for generated manifests (defaults to <repo-root>/test-yamls)
    #[arg(long, env = "RENDERED_DIR")]
    rendered_dir: Option<PathBuf>,

    /// Namespace Mayastor is installed into
    #[arg(long, env = "MAYASTOR_NAMESPACE", default_value = "mayastor")]
    namespace: String,

    /// Seconds between workload status reads
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "1")]
    poll_interval_secs: u64,

    /// Seconds to wait for each workload to become ready
    #[arg(long, env = "READY_TIMEOUT_SECS", default_value = "180")]
    ready_timeout_secs: u64,

    /// Print the install report as JSON on success
    #[arg(long)]
    report_json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn install_config(&self) -> InstallConfig {
        let mut config = InstallConfig::for_repo(&self.repo_root);

        config.discovery.image_tag = self.image_tag.clone();
        config.discovery.registry = self.registry.clone();

        if let Some(dir) = &self.deploy_dir {
            config.deploy_dir = dir.clone();
        }
        if let Some(dir) = &self.test_deploy_dir {
            config.pool_template = dir.join("pool.yaml.template");
        }
        if let Some(script) = &self.render_script {
            config.render.script = script.clone();
        }
        if let Some(dir) = &self.rendered_dir {
            config.render.output_dir = dir.clone();
        }

        config.namespace = self.namespace.clone();
        config.poll = PollConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.ready_timeout_secs),
        };
        config.pools = PoolInputs {
            yaml_files: self.pool_yaml_files.clone(),
            device: self.pool_device.clone(),
        };

        config
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting Mayastor install");
    info!("  Version: {}", mayastor_e2e_install::VERSION);
    info!("  Repository: {}", args.repo_root.display());
    info!("  Namespace: {}", args.namespace);

    let config = args.install_config();
    config.validate().context("invalid install configuration")?;

    info!("Bootstrapping test environment");
    let context = ClusterContext::connect(DEFAULT_CACHE_SYNC_TIMEOUT)
        .await
        .context("failed to connect to the cluster")?;

    let installer = Installer::new(
        config,
        Arc::new(context.api()),
        Arc::new(SystemCommandRunner::new()),
    );
    let result = installer.run().await;

    // Only the local connection state is torn down, never the cluster
    if let Err(e) = context.shutdown().await {
        warn!(error = %e, "Failed to tear down cluster context");
    }

    let report = result.context("Mayastor install failed")?;

    if args.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    info!(
        registry = %report.topology.registry(),
        pools = report.pools.len(),
        "Mayastor installed"
    );
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("kube=info".parse()?)
        .add_directive("tower=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}
