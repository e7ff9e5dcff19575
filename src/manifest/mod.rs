//! Manifest rendering and submission

pub mod applier;
pub mod renderer;

pub use applier::{ManifestApplier, DEFAULT_DEPLOY_DIR};
pub use renderer::{
    substitute, ManifestRenderer, PoolTemplate, RenderConfig, RenderedManifests,
    RENDERED_MANIFESTS,
};

use std::path::{Path, PathBuf};
use tracing::warn;

/// Anchor a relative path at the process working directory
///
/// Commands run from their own working directory, so every path handed to
/// them has to stand on its own.
pub fn absolute_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot resolve working directory");
            path.to_path_buf()
        }
    }
}
