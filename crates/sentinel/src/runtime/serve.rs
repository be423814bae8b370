//! Serve — the three process modes: one-shot check, single-container
//! monitoring, and the event-driven listener daemon.

use std::error::Error;
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tracing::info;

use super::boot;
use crate::conf::Cli;
use crate::listener::Listener;
use crate::monitor::Monitor;
use crate::probe::Prober;
use crate::resolve::Resolver;

/// Resolve a container and run its declared probe once. No store writes.
pub async fn run_check(cli: &Cli, identifier: &str) -> Result<(), Box<dyn Error>> {
    let runtime = boot::connect_runtime(cli)?;
    let resolver = Resolver::new(Arc::clone(&runtime));

    let descriptor = resolver.resolve(identifier).await?;
    let command = descriptor
        .health_check
        .clone()
        .ok_or_else(|| format!("container {descriptor} doesn't provide a health check"))?;
    if !descriptor.running {
        return Err(format!("container {descriptor} is not running").into());
    }

    let prober = Prober::new(runtime);
    prober
        .run(&descriptor.image, &command, &descriptor.address)
        .await?;
    info!(container = %descriptor, "container is healthy");
    Ok(())
}

/// Supervise one named container until SIGINT/SIGTERM.
pub async fn run_monitor(cli: &Cli, identifier: &str) -> Result<(), Box<dyn Error>> {
    let runtime = boot::connect_runtime(cli)?;
    let store = boot::connect_store(cli);
    let resolver = Resolver::new(Arc::clone(&runtime));

    let descriptor = resolver.resolve(identifier).await?;
    if descriptor.health_check.is_none() {
        return Err(format!("container {descriptor} doesn't provide a health check").into());
    }

    let monitor = Monitor::new(descriptor, runtime, store);
    let (cancel_tx, cancel_rx) = oneshot::channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("got shutdown signal, trying to stop gracefully");
        let _ = cancel_tx.send(());
    });

    monitor.run(cancel_rx).await;
    info!("monitoring stopped");
    Ok(())
}

/// Run the event-driven daemon over all containers.
pub async fn run_listen(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let runtime = boot::connect_runtime(cli)?;
    let store = boot::connect_store(cli);

    let listener = Listener::new(runtime, store);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("got shutdown signal, trying to stop gracefully");
        let _ = shutdown_tx.send(true);
    });

    listener.run(shutdown_rx).await?;
    info!("monitoring stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
