//! Error types for the install harness
//!
//! Every stage of the install flow is fail-fast: apart from the transient
//! read errors swallowed by the convergence poller, nothing here is retried.

use crate::install::InstallStage;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Discovery Errors
    // =========================================================================
    #[error("Failed to list nodes: {0}")]
    NoNodes(String),

    #[error("No usable nodes found for the mayastor engine (label {label})")]
    NoEligibleNodes { label: String },

    // =========================================================================
    // Manifest Errors
    // =========================================================================
    #[error("Render failed for {what}: {reason}")]
    Render { what: String, reason: String },

    #[error("Apply failed for {manifest}:\n{output}")]
    Apply { manifest: String, output: String },

    // =========================================================================
    // Readiness Errors
    // =========================================================================
    #[error(
        "{workload} not ready after {timeout:?}: expected {expected}, last observed {observed}"
    )]
    ReadinessTimeout {
        workload: String,
        expected: i32,
        observed: i32,
        timeout: Duration,
    },

    // =========================================================================
    // Install Flow
    // =========================================================================
    #[error("Install aborted while {stage}: {source}")]
    Install {
        stage: InstallStage,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap this error with the install stage it aborted
    pub fn in_stage(self, stage: InstallStage) -> Self {
        match self {
            // Already attributed to a stage
            Error::Install { .. } => self,
            other => Error::Install {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage the install flow failed in, if known
    pub fn stage(&self) -> Option<InstallStage> {
        match self {
            Error::Install { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, skipping stage attribution
    pub fn root(&self) -> &Error {
        match self {
            Error::Install { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error is a transient read failure
    ///
    /// The convergence poller logs these at `warn` and anything else at
    /// `error`. Both read as "not ready" and never abort the poll loop.
    pub fn is_transient(&self) -> bool {
        matches!(self.root(), Error::Kube(_) | Error::Io(_))
    }

    /// Check if this error is a discovery failure
    pub fn is_discovery(&self) -> bool {
        matches!(
            self.root(),
            Error::NoNodes(_) | Error::NoEligibleNodes { .. }
        )
    }
}

/// Result type alias for the harness
pub type Result<T> = std::result::Result<T, Error>;
