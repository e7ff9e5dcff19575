//! Manifest Applier
//!
//! Submits manifests with `kubectl apply`, which creates or updates, so a
//! repeated apply of the same manifest is harmless. Any non-zero exit is an
//! [`Error::Apply`] carrying the command's combined output.

use crate::domain::ports::{CommandRunnerRef, CommandSpec};
use crate::error::{Error, Result};
use crate::manifest::absolute_path;
use std::path::{Path, PathBuf};
use tracing::info;

/// Static deploy directory, relative to the repository root
pub const DEFAULT_DEPLOY_DIR: &str = "deploy";

/// Applies manifests through kubectl
pub struct ManifestApplier {
    runner: CommandRunnerRef,
    kubectl: String,
    deploy_dir: PathBuf,
}

impl ManifestApplier {
    /// A relative deploy directory is resolved against the current working
    /// directory.
    pub fn new(runner: CommandRunnerRef, deploy_dir: impl AsRef<Path>) -> Self {
        Self {
            runner,
            kubectl: "kubectl".to_string(),
            deploy_dir: absolute_path(deploy_dir),
        }
    }

    /// Use a different kubectl binary
    pub fn with_kubectl(mut self, kubectl: impl Into<String>) -> Self {
        self.kubectl = kubectl.into();
        self
    }

    pub fn deploy_dir(&self) -> &Path {
        &self.deploy_dir
    }

    /// Apply a manifest from the deploy directory
    ///
    /// The deploy directory is the working directory, so relative names
    /// resolve against it.
    pub async fn apply_deploy_file(&self, manifest: impl AsRef<Path>) -> Result<()> {
        let spec = CommandSpec::new(&self.kubectl)
            .args(["apply", "-f"])
            .arg(manifest.as_ref().to_string_lossy())
            .current_dir(&self.deploy_dir);
        self.submit(&manifest.as_ref().display().to_string(), spec)
            .await
    }

    /// Apply a manifest file resolved against the process working directory
    pub async fn apply_file(&self, manifest: impl AsRef<Path>) -> Result<()> {
        let spec = CommandSpec::new(&self.kubectl)
            .args(["apply", "-f"])
            .arg(manifest.as_ref().to_string_lossy());
        self.submit(&manifest.as_ref().display().to_string(), spec)
            .await
    }

    /// Apply an in-memory manifest through stdin
    pub async fn apply_document(&self, label: &str, document: &str) -> Result<()> {
        let spec = CommandSpec::new(&self.kubectl)
            .args(["apply", "-f", "-"])
            .stdin(document);
        self.submit(label, spec).await
    }

    async fn submit(&self, manifest: &str, spec: CommandSpec) -> Result<()> {
        info!(manifest = %manifest, "Applying manifest");

        let output = self.runner.run(&spec).await.map_err(|e| Error::Apply {
            manifest: manifest.to_string(),
            output: e.to_string(),
        })?;

        if !output.is_success() {
            return Err(Error::Apply {
                manifest: manifest.to_string(),
                output: output.output,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::CommandOutput;
    use crate::testing::FakeRunner;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_apply_deploy_file_uses_deploy_dir() {
        let runner = Arc::new(FakeRunner::succeeding());
        let applier = ManifestApplier::new(runner.clone(), "/repo/deploy");

        applier.apply_deploy_file("namespace.yaml").await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].to_string(), "kubectl apply -f namespace.yaml");
        assert_eq!(calls[0].current_dir.as_deref(), Some(Path::new("/repo/deploy")));
    }

    #[test]
    fn test_relative_deploy_dir_is_resolved() {
        let applier = ManifestApplier::new(Arc::new(FakeRunner::succeeding()), "deploy");
        assert!(applier.deploy_dir().is_absolute());
        assert!(applier.deploy_dir().ends_with("deploy"));
    }

    #[tokio::test]
    async fn test_apply_file_inherits_cwd() {
        let runner = Arc::new(FakeRunner::succeeding());
        let applier = ManifestApplier::new(runner.clone(), "/repo/deploy");

        applier.apply_file("/tmp/pools/pool-a.yaml").await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].args, ["apply", "-f", "/tmp/pools/pool-a.yaml"]);
        assert!(calls[0].current_dir.is_none());
    }

    #[tokio::test]
    async fn test_apply_document_feeds_stdin() {
        let runner = Arc::new(FakeRunner::succeeding());
        let applier = ManifestApplier::new(runner.clone(), "deploy").with_kubectl("oc");

        applier
            .apply_document("pool-on-node-1", "kind: MayastorPool\n")
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].to_string(), "oc apply -f -");
        assert_eq!(calls[0].stdin.as_deref(), Some("kind: MayastorPool\n"));
    }

    #[tokio::test]
    async fn test_rejection_surfaces_output() {
        let runner = Arc::new(FakeRunner::with(|_| {
            CommandOutput::failure(1, "error: unable to recognize \"storage-class.yaml\"")
        }));
        let applier = ManifestApplier::new(runner, "deploy");

        let err = applier.apply_deploy_file("storage-class.yaml").await.unwrap_err();
        assert_matches!(
            err,
            Error::Apply { ref manifest, ref output }
                if manifest == "storage-class.yaml" && output.contains("unable to recognize")
        );
    }
}
