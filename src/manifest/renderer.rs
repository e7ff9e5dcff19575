//! Manifest Renderer
//!
//! Produces concrete manifests from the templated deploy descriptors. The
//! deployment manifests come from the repository's generation script; pool
//! manifests are expanded in-process from `pool.yaml.template`.

use crate::domain::model::DeploymentTarget;
use crate::domain::ports::{CommandRunnerRef, CommandSpec};
use crate::error::{Error, Result};
use crate::manifest::absolute_path;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// =============================================================================
// Constants
// =============================================================================

/// Manifest generation script, relative to the repository root
pub const DEFAULT_RENDER_SCRIPT: &str = "scripts/generate-deploy-yamls.sh";

/// Output directory for generated manifests, relative to the repository root
pub const DEFAULT_RENDERED_DIR: &str = "test-yamls";

/// Manifests the generation script must produce, in apply order
pub const RENDERED_MANIFESTS: [&str; 3] = [
    "csi-daemonset.yaml",
    "moac-deployment.yaml",
    "mayastor-daemonset.yaml",
];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the deployment manifest renderer
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Shell used to run the script
    pub shell: String,
    /// Generation script
    pub script: PathBuf,
    /// Directory the script writes into
    pub output_dir: PathBuf,
    /// Working directory for the script
    pub working_dir: PathBuf,
    /// File names the script is expected to produce
    pub expected: Vec<String>,
}

impl RenderConfig {
    /// Default layout under a repository root
    ///
    /// A relative root is resolved against the current working directory.
    pub fn for_repo(root: impl AsRef<Path>) -> Self {
        let root = absolute_path(root);
        let root = root.as_path();
        Self {
            shell: "bash".to_string(),
            script: root.join(DEFAULT_RENDER_SCRIPT),
            output_dir: root.join(DEFAULT_RENDERED_DIR),
            working_dir: root.to_path_buf(),
            expected: RENDERED_MANIFESTS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::for_repo(".")
    }
}

/// Files produced by a render, in apply order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedManifests {
    pub files: Vec<PathBuf>,
}

// =============================================================================
// Renderer
// =============================================================================

/// Renders the deployment manifests for a [`DeploymentTarget`]
pub struct ManifestRenderer {
    runner: CommandRunnerRef,
    config: RenderConfig,
}

impl ManifestRenderer {
    pub fn new(runner: CommandRunnerRef, config: RenderConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Run the generation script and check its output
    pub async fn render(&self, target: &DeploymentTarget) -> Result<RenderedManifests> {
        // The script runs from `working_dir`, so its paths must not be relative
        let script = absolute_path(&self.config.script);
        let output_dir = absolute_path(&self.config.output_dir);

        let spec = CommandSpec::new(&self.config.shell)
            .arg(script.to_string_lossy())
            .arg("-t")
            .arg(output_dir.to_string_lossy())
            .arg(&target.image_tag)
            .arg(&target.registry)
            .current_dir(&self.config.working_dir);

        info!(
            tag = %target.image_tag,
            registry = %target.registry,
            "Generating deploy manifests"
        );

        let output = self.runner.run(&spec).await.map_err(|e| Error::Render {
            what: spec.to_string(),
            reason: e.to_string(),
        })?;

        if !output.is_success() {
            return Err(Error::Render {
                what: spec.to_string(),
                reason: format!("exit code {:?}\n{}", output.code, output.output),
            });
        }

        let mut files = Vec::with_capacity(self.config.expected.len());
        for name in &self.config.expected {
            let path = output_dir.join(name);
            if !path.is_file() {
                return Err(Error::Render {
                    what: name.clone(),
                    reason: format!("not produced at {}", path.display()),
                });
            }
            debug!(manifest = %path.display(), "Rendered manifest");
            files.push(path);
        }

        Ok(RenderedManifests { files })
    }
}

// =============================================================================
// Pool Template
// =============================================================================

/// Template variable holding the target node name
pub const NODE_NAME_VAR: &str = "NODE_NAME";

/// Template variable holding the pool device path
pub const POOL_DEVICE_VAR: &str = "POOL_DEVICE";

/// Per-node pool manifest template
#[derive(Debug, Clone)]
pub struct PoolTemplate {
    source: String,
    text: String,
}

impl PoolTemplate {
    /// Load the template from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::Render {
            what: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: path.display().to_string(),
            text,
        })
    }

    pub fn from_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Manifest for one node and device
    pub fn render(&self, node: &str, device: &str) -> String {
        let vars = BTreeMap::from([(NODE_NAME_VAR, node), (POOL_DEVICE_VAR, device)]);
        substitute(&self.text, &vars)
    }
}

/// Expand `$VAR` and `${VAR}` references like `envsubst`
///
/// Unknown variables expand to the empty string. A `$` that does not start
/// a reference is kept as is.
pub fn substitute(template: &str, vars: &BTreeMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if is_var_name(&braced[..end]) => {
                    out.push_str(vars.get(&braced[..end]).copied().unwrap_or(""));
                    rest = &braced[end + 1..];
                }
                _ => {
                    out.push('$');
                    rest = after;
                }
            }
            continue;
        }

        let len = var_name_len(after);
        if len == 0 {
            out.push('$');
            rest = after;
        } else {
            out.push_str(vars.get(&after[..len]).copied().unwrap_or(""));
            rest = &after[len..];
        }
    }

    out.push_str(rest);
    out
}

fn var_name_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(*c == '_' || c.is_ascii_alphanumeric()))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn is_var_name(s: &str) -> bool {
    !s.is_empty() && var_name_len(s) == s.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::CommandOutput;
    use crate::testing::FakeRunner;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn target() -> DeploymentTarget {
        DeploymentTarget {
            image_tag: "ci".into(),
            registry: "10.0.0.1:30291".into(),
        }
    }

    #[test]
    fn test_substitute_forms() {
        let vars = BTreeMap::from([("NODE_NAME", "node-1"), ("POOL_DEVICE", "/dev/sdb")]);

        assert_eq!(
            substitute("pool-on-${NODE_NAME}: $POOL_DEVICE", &vars),
            "pool-on-node-1: /dev/sdb"
        );
        assert_eq!(substitute("${MISSING}x$MISSING", &vars), "x");
        assert_eq!(substitute("cost $5 and $ and ${", &vars), "cost $5 and $ and ${");
        assert_eq!(substitute("$NODE_NAME-pool", &vars), "node-1-pool");
        assert_eq!(substitute("trailing $", &vars), "trailing $");
    }

    #[test]
    fn test_pool_template_render() {
        let template = PoolTemplate::from_text(
            "pool.yaml.template",
            "spec:\n  node: ${NODE_NAME}\n  disks: [\"${POOL_DEVICE}\"]\n",
        );
        let rendered = template.render("worker-2", "/dev/nvme0n1");
        assert!(rendered.contains("node: worker-2"));
        assert!(rendered.contains("\"/dev/nvme0n1\""));
    }

    #[test]
    fn test_pool_template_missing_file() {
        let err = PoolTemplate::load("/nonexistent/pool.yaml.template").unwrap_err();
        assert_matches!(err, Error::Render { .. });
    }

    #[tokio::test]
    async fn test_render_invokes_script() {
        let root = tempfile::tempdir().unwrap();
        let config = RenderConfig::for_repo(root.path());
        std::fs::create_dir_all(&config.output_dir).unwrap();
        for name in RENDERED_MANIFESTS {
            std::fs::write(config.output_dir.join(name), "kind: List\n").unwrap();
        }

        let runner = Arc::new(FakeRunner::succeeding());
        let renderer = ManifestRenderer::new(runner.clone(), config.clone());

        let rendered = renderer.render(&target()).await.unwrap();
        assert_eq!(rendered.files.len(), 3);
        assert!(rendered.files[0].ends_with("csi-daemonset.yaml"));

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "bash");
        assert_eq!(&calls[0].args[1..], ["-t", &*config.output_dir.to_string_lossy(), "ci", "10.0.0.1:30291"]);
        assert_eq!(calls[0].current_dir.as_deref(), Some(root.path()));
    }

    #[tokio::test]
    async fn test_render_relative_root_passes_absolute_paths() {
        let root = tempfile::Builder::new()
            .prefix("render-")
            .tempdir_in(".")
            .unwrap();
        let relative = PathBuf::from(root.path().file_name().unwrap());
        let config = RenderConfig::for_repo(&relative);
        assert!(config.working_dir.is_absolute());

        let output_dir = root.path().join(DEFAULT_RENDERED_DIR);
        std::fs::create_dir_all(&output_dir).unwrap();
        for name in RENDERED_MANIFESTS {
            std::fs::write(output_dir.join(name), "kind: List\n").unwrap();
        }

        let runner = Arc::new(FakeRunner::succeeding());
        let renderer = ManifestRenderer::new(runner.clone(), config);
        let rendered = renderer.render(&target()).await.unwrap();
        assert!(rendered.files.iter().all(|f| f.is_absolute()));

        let calls = runner.calls();
        let script = Path::new(&calls[0].args[0]);
        assert!(script.is_absolute());
        assert!(script.ends_with(DEFAULT_RENDER_SCRIPT));
        assert!(Path::new(&calls[0].args[2]).is_absolute());
    }

    #[tokio::test]
    async fn test_render_script_failure() {
        let runner = Arc::new(FakeRunner::with(|_| {
            CommandOutput::failure(1, "sed: can't read template")
        }));
        let renderer = ManifestRenderer::new(runner, RenderConfig::default());

        let err = renderer.render(&target()).await.unwrap_err();
        assert_matches!(err, Error::Render { ref reason, .. } if reason.contains("can't read template"));
    }

    #[tokio::test]
    async fn test_render_missing_output() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::succeeding());
        let renderer = ManifestRenderer::new(runner, RenderConfig::for_repo(root.path()));

        let err = renderer.render(&target()).await.unwrap_err();
        assert_matches!(err, Error::Render { ref what, .. } if what == "csi-daemonset.yaml");
    }
}
