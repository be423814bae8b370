//! Health-check executor — runs a single ephemeral probe container.
//!
//! The probe reuses the target's own image with the entrypoint overridden
//! by the declared command and the target's address as its sole argument;
//! exit code zero means healthy. The ephemeral container is removed on
//! every path once an id was obtained.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::client::RuntimeOps;
use crate::docker::client::DockerError;

/// How much probe output to capture when a check fails.
const OUTPUT_TAIL_LINES: usize = 20;

#[derive(Error, Debug)]
pub enum ProbeError {
    /// The probe ran and reported unhealthy.
    #[error("probe exited with code {code}: {output}")]
    Unhealthy { code: i64, output: String },
    /// The runtime failed before a verdict was reached.
    #[error(transparent)]
    Runtime(#[from] DockerError),
}

pub struct Prober {
    runtime: Arc<dyn RuntimeOps>,
}

impl Prober {
    pub fn new(runtime: Arc<dyn RuntimeOps>) -> Self {
        Self { runtime }
    }

    /// Run `command` from `image` against `address` and wait for the
    /// verdict. Blocks for as long as the probe container runs.
    pub async fn run(&self, image: &str, command: &str, address: &str) -> Result<(), ProbeError> {
        debug!(image, command, address, "run probe");
        let id = self.runtime.create_container(image, command, address).await?;

        let verdict = self.execute(&id).await;

        if let Err(e) = self.runtime.remove_container(&id, true, true).await {
            warn!(probe = %id, error = %e, "cannot remove probe container");
        }
        verdict
    }

    async fn execute(&self, id: &str) -> Result<(), ProbeError> {
        self.runtime.start_container(id).await?;
        let code = self.runtime.wait_container(id).await?;
        if code != 0 {
            // Best effort; a failed log fetch must not mask the verdict.
            let output = self
                .runtime
                .container_logs_tail(id, OUTPUT_TAIL_LINES)
                .await
                .unwrap_or_default();
            return Err(ProbeError::Unhealthy { code, output });
        }
        debug!(probe = %id, "probe passed");
        Ok(())
    }
}
