//! Conf module — process configuration from the command line.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const DEFAULT_ETCD_HOST: &str = "127.0.0.1";

#[derive(Parser, Debug)]
#[command(
    name = "sentinel",
    version,
    about = "Containers monitoring daemon.",
    long_about = "Watches containers, runs their declared health checks and \
                  publishes healthy endpoints to etcd under TTL-bound keys."
)]
pub struct Cli {
    /// Host where etcd is listening. Falls back to $ETCD_HOST, then
    /// $COREOS_PRIVATE_IPV4, then localhost.
    #[arg(long, env = "ETCD_HOST", global = true)]
    pub etcd_host: Option<String>,

    /// Docker socket path. Empty uses the runtime defaults.
    #[arg(long, env = "DOCKER_SOCKET", default_value = "", global = true)]
    pub docker_socket: String,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a container's health once and exit.
    Check { container: String },
    /// Monitor a single container until interrupted.
    Monitor { container: String },
    /// Monitor every container, following runtime lifecycle events.
    Listen,
}

impl Cli {
    /// The store endpoint after fallbacks.
    pub fn etcd_endpoint(&self) -> String {
        self.etcd_host
            .clone()
            .or_else(|| std::env::var("COREOS_PRIVATE_IPV4").ok())
            .unwrap_or_else(|| DEFAULT_ETCD_HOST.to_string())
    }
}
