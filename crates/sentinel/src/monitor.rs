//! Monitor — one container's supervision loop.
//!
//! On a fixed interval the monitor re-resolves its container, runs the
//! health probe, and registers the service record on success. Errors are
//! classified into a closed kind enum; transient kinds are logged and the
//! loop continues, fatal kinds stop the monitor for good.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::client::{RuntimeOps, StoreOps};
use crate::docker::client::DockerError;
use crate::probe::{ProbeError, Prober};
use crate::register::Registrar;
use crate::resolve::{ContainerDescriptor, ResolveError, Resolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Constructed, not yet ticking.
    Idle,
    /// Timer armed, check cycle active.
    Running,
    /// Terminal; a monitor is not reused.
    Stopped,
}

/// Everything a check cycle can go wrong with. `is_fatal` kinds terminate
/// the monitor; the rest are logged and retried on the next tick.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("container {0} no longer exists")]
    Vanished(String),
    #[error("container {0} doesn't provide a health check")]
    Unsupported(String),
    #[error("container {0} is not running")]
    NotRunning(String),
    #[error("check failed with code {code}: {output}")]
    Unhealthy { code: i64, output: String },
    #[error(transparent)]
    Runtime(#[from] DockerError),
}

impl CheckError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CheckError::Vanished(_) | CheckError::Unsupported(_))
    }
}

/// Supervision loop for a single container.
pub struct Monitor {
    descriptor: ContainerDescriptor,
    resolver: Resolver,
    prober: Prober,
    registrar: Registrar,
    state: MonitorState,
}

impl Monitor {
    pub fn new(
        descriptor: ContainerDescriptor,
        runtime: Arc<dyn RuntimeOps>,
        store: Arc<dyn StoreOps>,
    ) -> Self {
        Self {
            descriptor,
            resolver: Resolver::new(Arc::clone(&runtime)),
            prober: Prober::new(runtime),
            registrar: Registrar::new(store),
            state: MonitorState::Idle,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Run the check cycle until cancelled or an unrecoverable outcome.
    /// Returns the container id once stopped, so the owner can clear its
    /// registry entry.
    pub async fn run(mut self, mut cancel: oneshot::Receiver<()>) -> String {
        info!(container = %self.descriptor, "start monitoring");
        self.state = MonitorState::Running;

        let mut ticks = time::interval(self.descriptor.check_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The interval yields immediately; consume that so the first check
        // lands one full period after start.
        ticks.tick().await;

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    match self.check_once().await {
                        Ok(()) => {}
                        Err(e) if e.is_fatal() => {
                            warn!(container = %self.descriptor, "{e}");
                            break;
                        }
                        Err(CheckError::Unhealthy { code, output }) => {
                            warn!(
                                container = %self.descriptor,
                                code,
                                output = output.trim_end(),
                                "health check failed"
                            );
                        }
                        Err(e) => {
                            info!(container = %self.descriptor, "got error while checking container: {e}");
                        }
                    }
                }
                _ = &mut cancel => {
                    debug!(container = %self.descriptor, "got stop signal");
                    break;
                }
            }
        }

        self.state = MonitorState::Stopped;
        info!(container = %self.descriptor, "stop monitoring");
        self.descriptor.id.clone()
    }

    /// One full cycle: refresh the descriptor, run the probe, and register
    /// on success. A registration failure is logged but doesn't fail the
    /// cycle; the next tick retries it.
    pub async fn check_once(&mut self) -> Result<(), CheckError> {
        self.refresh().await?;

        let command = match &self.descriptor.health_check {
            Some(command) => command.clone(),
            None => return Err(CheckError::Unsupported(self.descriptor.to_string())),
        };
        if !self.descriptor.running {
            return Err(CheckError::NotRunning(self.descriptor.to_string()));
        }

        self.prober
            .run(&self.descriptor.image, &command, &self.descriptor.address)
            .await
            .map_err(|e| match e {
                ProbeError::Unhealthy { code, output } => CheckError::Unhealthy { code, output },
                ProbeError::Runtime(e) => CheckError::Runtime(e),
            })?;

        if let Err(e) = self.registrar.register(&self.descriptor).await {
            error!(container = %self.descriptor, "cannot update service record: {e}");
        }
        Ok(())
    }

    /// Re-resolve the container so address and config changes are picked
    /// up before each check.
    async fn refresh(&mut self) -> Result<(), CheckError> {
        match self.resolver.resolve_id(&self.descriptor.id).await {
            Ok(descriptor) => {
                self.descriptor = descriptor;
                Ok(())
            }
            Err(ResolveError::NotFound(id)) => Err(CheckError::Vanished(id)),
            Err(ResolveError::Docker(e)) if e.is_not_found() => {
                Err(CheckError::Vanished(self.descriptor.id.clone()))
            }
            Err(ResolveError::Docker(e)) => Err(CheckError::Runtime(e)),
        }
    }
}
