//! Isolated execution environment for fragment commands.
//!
//! The [`Sandbox`] trait decouples the runner from the container backend.
//! Tests use scripted sandboxes that return predetermined outputs without
//! touching docker; the shipped [`DockerSandbox`] keeps one long-lived
//! container per conversation with the working directory bind-mounted
//! read/write, so files written by one fragment are visible to the next.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::config::SandboxConfig;
use crate::io::process::run_command_with_timeout;

/// Where the working directory appears inside the container.
pub const CONTAINER_WORKDIR: &str = "/workspace";

/// Extra wall-clock allowance for `docker exec` beyond the in-container
/// `timeout` wrapper, so the coreutil gets to report 124 first.
const EXEC_GRACE: Duration = Duration::from_secs(10);

/// Captured result of one command inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    /// Combined stdout and stderr.
    pub output: String,
    pub timed_out: bool,
}

/// Abstraction over isolated execution backends.
pub trait Sandbox {
    /// Run one command inside the environment, bounded by `timeout`.
    fn exec(&self, command: &[String], timeout: Duration) -> Result<ExecOutput>;

    /// Whether the environment is currently active.
    fn is_running(&self) -> bool;
}

/// Sandbox backed by a detached docker container.
#[derive(Debug)]
pub struct DockerSandbox {
    container_id: String,
    output_limit_bytes: usize,
    cancel: Option<Arc<AtomicBool>>,
    running: bool,
}

impl DockerSandbox {
    /// Start a detached container with `workdir` bind-mounted at
    /// [`CONTAINER_WORKDIR`]. A raised `cancel` flag aborts an in-flight exec
    /// with timeout semantics.
    #[instrument(skip_all, fields(image = %config.image))]
    pub fn start(
        config: &SandboxConfig,
        workdir: &Path,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<Self> {
        let mut cmd = Command::new("docker");
        cmd.args(["run", "-d", "--rm"])
            .args([
                "-v",
                &format!("{}:{}", workdir.display(), CONTAINER_WORKDIR),
            ])
            .args(["-w", CONTAINER_WORKDIR])
            .arg(&config.image)
            .args(["sleep", "infinity"]);

        let output = run_command_with_timeout(cmd, Duration::from_secs(60), 10_000, None)
            .context("docker run")?;
        if output.timed_out || output.exit_code() != 0 {
            return Err(anyhow!(
                "docker run failed (exit {}): {}",
                output.exit_code(),
                output.combined_lossy().trim()
            ));
        }
        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if container_id.is_empty() {
            return Err(anyhow!("docker run returned no container id"));
        }
        info!(container_id = %container_id, "sandbox container started");
        Ok(Self {
            container_id,
            output_limit_bytes: config.output_limit_bytes,
            cancel,
            running: true,
        })
    }

    /// Stop and remove the container. Safe to call more than once.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        let result = Command::new("docker")
            .args(["rm", "-f", &self.container_id])
            .output();
        match result {
            Ok(out) if out.status.success() => {
                debug!(container_id = %self.container_id, "sandbox container removed");
            }
            Ok(out) => warn!(
                container_id = %self.container_id,
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "failed to remove sandbox container"
            ),
            Err(err) => warn!(
                container_id = %self.container_id,
                err = %err,
                "failed to invoke docker rm"
            ),
        }
    }
}

impl Sandbox for DockerSandbox {
    #[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
    fn exec(&self, command: &[String], timeout: Duration) -> Result<ExecOutput> {
        if !self.running {
            return Err(anyhow!("sandbox container is not running"));
        }
        let mut cmd = Command::new("docker");
        cmd.arg("exec").arg(&self.container_id).args(command);

        let output = run_command_with_timeout(
            cmd,
            timeout + EXEC_GRACE,
            self.output_limit_bytes,
            self.cancel.as_deref(),
        )
        .context("docker exec")?;
        let exit_code = if output.timed_out {
            // The outer kill fired before the in-container coreutil reported;
            // fold both cases into the reserved timeout code.
            124
        } else {
            output.exit_code()
        };
        Ok(ExecOutput {
            exit_code,
            output: output.combined_lossy(),
            timed_out: output.timed_out || exit_code == 124,
        })
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

impl Drop for DockerSandbox {
    fn drop(&mut self) {
        self.stop();
    }
}
