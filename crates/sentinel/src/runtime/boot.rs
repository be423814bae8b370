//! Boot — logging init and collaborator construction.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::{RuntimeOps, StoreOps};
use crate::conf::Cli;
use crate::docker::client::{DockerClient, DockerError};
use crate::store::EtcdClient;

/// Initialise the tracing / logging subsystem from the CLI options.
/// The subscriber is built exactly once; the returned guard must be held
/// for the life of the process when a log file is configured.
pub fn init_logging(cli: &Cli) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("sentinel={}", cli.log_level).into());

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    match &cli.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "sentinel.log".into());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

/// Connect to the Docker daemon.
pub fn connect_runtime(cli: &Cli) -> Result<Arc<dyn RuntimeOps>, DockerError> {
    info!(
        "connecting to Docker daemon at: {}",
        if cli.docker_socket.is_empty() {
            "default socket"
        } else {
            &cli.docker_socket
        }
    );
    let docker = DockerClient::new(&cli.docker_socket)?;
    Ok(Arc::new(docker))
}

/// Build the key-value store client.
pub fn connect_store(cli: &Cli) -> Arc<dyn StoreOps> {
    let endpoint = cli.etcd_endpoint();
    info!(endpoint = %endpoint, "using etcd endpoint");
    Arc::new(EtcdClient::new(&endpoint))
}
