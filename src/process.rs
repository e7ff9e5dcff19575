//! External process adapter for the [`CommandRunner`] port
//!
//! Runs commands with `tokio::process`, feeding optional stdin and capturing
//! stdout and stderr into a single combined output for diagnostics.

use crate::domain::ports::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs commands on the local host
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %spec, dir = ?spec.current_dir, "Running command");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to spawn {}: {}", spec.program, e),
            ))
        })?;

        if let Some(input) = &spec.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                // The child may exit before reading all of its input
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    warn!(command = %spec, error = %e, "Failed to write command stdin");
                }
                // Close the pipe so the child sees EOF
                drop(stdin);
            }
        }

        let output = child.wait_with_output().await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!(command = %spec, code = ?output.status.code(), "Command finished");

        Ok(CommandOutput {
            code: output.status.code(),
            output: combined,
        })
    }
}
