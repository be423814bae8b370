//! Container resolver — find a container and extract its health-check
//! configuration from the declared environment.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::client::RuntimeOps;
use crate::docker::client::DockerError;
use crate::docker::container::{ContainerInfo, PortMapping};

/// Default check period when the container doesn't declare one.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

const HEALTHCHECK_VAR: &str = "HEALTHCHECK";
const HEALTHCHECK_TTL_VAR: &str = "HEALTHCHECKTTL";

/// Immutable snapshot of a monitored container, refreshed by re-inspecting
/// the runtime before each check.
#[derive(Debug, Clone)]
pub struct ContainerDescriptor {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Current network address; empty when the container has none.
    pub address: String,
    pub ports: Vec<PortMapping>,
    /// Probe entrypoint declared via `HEALTHCHECK`; `None` means the
    /// container doesn't support checking.
    pub health_check: Option<String>,
    pub check_interval: Duration,
    pub running: bool,
}

impl fmt::Display for ContainerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short_id = self.id.get(..16).unwrap_or(&self.id);
        write!(f, "{}: {}", self.name, short_id)
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("container {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Docker(#[from] DockerError),
}

/// Looks containers up by name or id and builds descriptors.
#[derive(Clone)]
pub struct Resolver {
    runtime: Arc<dyn RuntimeOps>,
}

impl Resolver {
    pub fn new(runtime: Arc<dyn RuntimeOps>) -> Self {
        Self { runtime }
    }

    /// Look up a container by exact name (leading `/` trimmed) or by id,
    /// among all containers known to the runtime.
    pub async fn resolve(&self, identifier: &str) -> Result<ContainerDescriptor, ResolveError> {
        let wanted = identifier.trim_start_matches('/');
        for head in self.runtime.list_containers().await? {
            let matches = head.id == wanted
                || head
                    .names
                    .iter()
                    .any(|name| name.trim_start_matches('/') == wanted);
            if matches {
                return self.resolve_id(&head.id).await;
            }
        }
        Err(ResolveError::NotFound(identifier.to_string()))
    }

    /// Fast path used by the monitor's per-tick refresh: inspect by id
    /// without listing.
    pub async fn resolve_id(&self, id: &str) -> Result<ContainerDescriptor, ResolveError> {
        let info = self
            .runtime
            .inspect_container(id)
            .await
            .map_err(|e| match e {
                DockerError::ContainerNotFound(id) => ResolveError::NotFound(id),
                other => ResolveError::Docker(other),
            })?;
        debug!(container = %info.name, "resolved container");
        Ok(descriptor_from(info))
    }
}

fn descriptor_from(info: ContainerInfo) -> ContainerDescriptor {
    let health_check = find_env(&info.env, HEALTHCHECK_VAR)
        .filter(|command| !command.is_empty())
        .map(str::to_string);

    let check_interval = match find_env(&info.env, HEALTHCHECK_TTL_VAR) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                warn!(
                    container = %info.name,
                    value = raw,
                    default = DEFAULT_CHECK_INTERVAL.as_secs(),
                    "invalid check interval, using default"
                );
                DEFAULT_CHECK_INTERVAL
            }
        },
        None => DEFAULT_CHECK_INTERVAL,
    };

    ContainerDescriptor {
        id: info.id,
        name: info.name,
        image: info.image,
        address: info.ip_address,
        ports: info.ports,
        health_check,
        check_interval,
        running: info.running,
    }
}

/// Find a variable in a `KEY=VALUE` environment list, matching the key
/// case-insensitively.
pub fn find_env<'a>(env: &'a [String], name: &str) -> Option<&'a str> {
    env.iter().find_map(|entry| {
        let (key, value) = entry.split_once('=')?;
        key.eq_ignore_ascii_case(name).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{container, FakeRuntime};

    fn env(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_find_env_is_case_insensitive() {
        let env = env(&["PATH=/bin", "healthcheck=/opt/probe", "X=1"]);
        assert_eq!(find_env(&env, "HEALTHCHECK"), Some("/opt/probe"));
        assert_eq!(find_env(&env, "path"), Some("/bin"));
        assert_eq!(find_env(&env, "MISSING"), None);
    }

    #[test]
    fn test_find_env_skips_malformed_entries() {
        let env = env(&["NOEQUALS", "HEALTHCHECK=/opt/probe"]);
        assert_eq!(find_env(&env, "HEALTHCHECK"), Some("/opt/probe"));
    }

    #[test]
    fn test_descriptor_reads_interval_override() {
        let info = container(
            "abc",
            "web",
            "web:1.0",
            &["HEALTHCHECK=/probe", "HEALTHCHECKTTL=5"],
            "172.17.0.2",
            true,
        );
        let descriptor = descriptor_from(info);
        assert_eq!(descriptor.health_check.as_deref(), Some("/probe"));
        assert_eq!(descriptor.check_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_descriptor_keeps_default_on_bad_interval() {
        for bad in ["abc", "-3", "0", ""] {
            let ttl_entry = format!("HEALTHCHECKTTL={}", bad);
            let info = container(
                "abc",
                "web",
                "web:1.0",
                &["HEALTHCHECK=/probe", &ttl_entry],
                "172.17.0.2",
                true,
            );
            let descriptor = descriptor_from(info);
            assert_eq!(descriptor.check_interval, DEFAULT_CHECK_INTERVAL);
        }
    }

    #[test]
    fn test_descriptor_without_probe_command() {
        let info = container("abc", "web", "web:1.0", &["PATH=/bin"], "172.17.0.2", true);
        assert_eq!(descriptor_from(info).health_check, None);

        // Empty value means unsupported too.
        let info = container("abc", "web", "web:1.0", &["HEALTHCHECK="], "172.17.0.2", true);
        assert_eq!(descriptor_from(info).health_check, None);
    }

    #[test]
    fn test_descriptor_display_shortens_id() {
        let info = container(
            "0123456789abcdef0123456789abcdef",
            "web",
            "web:1.0",
            &[],
            "",
            true,
        );
        assert_eq!(descriptor_from(info).to_string(), "web: 0123456789abcdef");
    }

    #[tokio::test]
    async fn test_resolve_by_name_trims_leading_slash() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime
            .add_container(container("abc", "web", "web:1.0", &[], "172.17.0.2", true))
            .await;
        let resolver = Resolver::new(runtime);

        let descriptor = resolver.resolve("/web").await.unwrap();
        assert_eq!(descriptor.id, "abc");
        assert_eq!(descriptor.name, "web");
    }

    #[tokio::test]
    async fn test_resolve_by_id() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime
            .add_container(container("abc", "web", "web:1.0", &[], "172.17.0.2", true))
            .await;
        let resolver = Resolver::new(runtime);

        assert_eq!(resolver.resolve("abc").await.unwrap().name, "web");
    }

    #[tokio::test]
    async fn test_resolve_unknown_identifier() {
        let resolver = Resolver::new(Arc::new(FakeRuntime::new()));
        assert!(matches!(
            resolver.resolve("ghost").await,
            Err(ResolveError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_id_maps_missing_container() {
        let resolver = Resolver::new(Arc::new(FakeRuntime::new()));
        assert!(matches!(
            resolver.resolve_id("gone").await,
            Err(ResolveError::NotFound(_))
        ));
    }
}
