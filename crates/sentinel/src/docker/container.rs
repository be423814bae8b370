//! Container domain — list, inspect, ephemeral lifecycle, and log capture.

use super::client::{DockerClient, DockerError};

use bollard::models::{ContainerCreateBody, ContainerInspectResponse, ContainerSummary, NetworkSettings};
use bollard::query_parameters::{ListContainersOptions, LogsOptions, RemoveContainerOptions};
use futures_util::stream::StreamExt;

/// Port mapping information, as published in service records.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: String,
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
}

/// Identity-only view of a container from Docker's list API.
/// Names keep their leading slash; matching happens in the resolver.
#[derive(Debug, Clone)]
pub struct ContainerHead {
    pub id: String,
    pub names: Vec<String>,
}

impl From<ContainerSummary> for ContainerHead {
    fn from(s: ContainerSummary) -> Self {
        Self {
            id: s.id.unwrap_or_default(),
            names: s.names.unwrap_or_default(),
        }
    }
}

/// Container information derived from docker inspect.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: String,
    /// Without leading slash
    pub name: String,
    /// Image reference as configured (`Config.Image`), not the image digest.
    pub image: String,
    /// Declared environment, `KEY=VALUE` entries.
    pub env: Vec<String>,
    /// Current network address; empty when the container has none.
    pub ip_address: String,
    pub ports: Vec<PortMapping>,
    pub running: bool,
}

impl From<ContainerInspectResponse> for ContainerInfo {
    fn from(details: ContainerInspectResponse) -> Self {
        let config = details.config.unwrap_or_default();
        let network = details.network_settings.unwrap_or_default();

        // Top-level IPAddress is only populated on the default bridge
        // network; fall back to the first attached network.
        let ip_address = network
            .ip_address
            .clone()
            .filter(|ip| !ip.is_empty())
            .or_else(|| {
                network.networks.as_ref().and_then(|nets| {
                    nets.values()
                        .find_map(|ep| ep.ip_address.clone().filter(|ip| !ip.is_empty()))
                })
            })
            .unwrap_or_default();

        Self {
            id: details.id.unwrap_or_default(),
            name: details
                .name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| "unknown".into()),
            image: config.image.unwrap_or_default(),
            env: config.env.unwrap_or_default(),
            ip_address,
            ports: extract_ports(&network),
            running: details
                .state
                .as_ref()
                .and_then(|s| s.running)
                .unwrap_or(false),
        }
    }
}

/// Flatten NetworkSettings.Ports ("80/tcp" -> bindings) into port mappings.
/// Exposed-but-unbound ports are kept with empty host fields.
fn extract_ports(network: &NetworkSettings) -> Vec<PortMapping> {
    let Some(port_map) = network.ports.as_ref() else {
        return Vec::new();
    };

    port_map
        .iter()
        .flat_map(|(spec, bindings)| {
            let (port_str, protocol) = spec.split_once('/').unwrap_or((spec.as_str(), "tcp"));
            let container_port = port_str.parse::<u16>().unwrap_or(0);

            let bindings = bindings.as_deref().unwrap_or(&[]);
            if bindings.is_empty() {
                vec![PortMapping {
                    container_port,
                    protocol: protocol.to_string(),
                    host_ip: None,
                    host_port: None,
                }]
            } else {
                bindings
                    .iter()
                    .map(|b| PortMapping {
                        container_port,
                        protocol: protocol.to_string(),
                        host_ip: b.host_ip.clone(),
                        host_port: b.host_port.as_ref().and_then(|p| p.parse().ok()),
                    })
                    .collect()
            }
        })
        .collect()
}

impl DockerClient {
    /// List all containers, running or not.
    pub async fn list_containers(&self) -> Result<Vec<ContainerHead>, DockerError> {
        let options = Some(ListContainersOptions {
            all: true,
            ..Default::default()
        });
        let containers = self.client.list_containers(options).await?;
        Ok(containers.into_iter().map(ContainerHead::from).collect())
    }

    pub async fn inspect_container(&self, id: &str) -> Result<ContainerInfo, DockerError> {
        let details = self
            .client
            .inspect_container(id, None)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                    DockerError::ContainerNotFound(id.to_string())
                }
                other => DockerError::Api(other),
            })?;
        Ok(ContainerInfo::from(details))
    }

    /// Create a container from `image` with the entrypoint overridden by
    /// `entrypoint` and `arg` as its sole argument. Returns the new id.
    pub async fn create_container(
        &self,
        image: &str,
        entrypoint: &str,
        arg: &str,
    ) -> Result<String, DockerError> {
        let body = ContainerCreateBody {
            image: Some(image.to_string()),
            entrypoint: Some(vec![entrypoint.to_string()]),
            cmd: Some(vec![arg.to_string()]),
            ..Default::default()
        };
        let created = self.client.create_container(None, body).await?;
        Ok(created.id)
    }

    /// Start a stopped container.
    pub async fn start_container(&self, container_id: &str) -> Result<(), DockerError> {
        self.client
            .start_container(container_id, None)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                    DockerError::ContainerNotFound(container_id.to_string())
                }
                other => DockerError::Api(other),
            })
    }

    /// Block until the container exits and return its status code.
    ///
    /// NOTE: bollard reports non-zero exits through
    /// `Error::DockerContainerWaitError`; both paths yield the code here.
    pub async fn wait_container(&self, container_id: &str) -> Result<i64, DockerError> {
        let mut wait = self.client.wait_container(container_id, None);
        match wait.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(DockerError::Api(e)),
            None => Err(DockerError::StreamClosed),
        }
    }

    /// Fetch the last `lines` of combined stdout+stderr output.
    pub async fn container_logs_tail(
        &self,
        container_id: &str,
        lines: usize,
    ) -> Result<String, DockerError> {
        let options = LogsOptions {
            follow: false,
            stdout: true,
            stderr: true,
            since: 0,
            until: 0,
            timestamps: false,
            tail: lines.to_string(),
        };

        let mut stream = self.client.logs(container_id, Some(options));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            output.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
        }
        Ok(output)
    }

    /// Remove a container. If `force` is true, the container is killed first.
    pub async fn remove_container(
        &self,
        container_id: &str,
        force: bool,
        remove_volumes: bool,
    ) -> Result<(), DockerError> {
        let options = Some(RemoveContainerOptions {
            force,
            v: remove_volumes,
            ..Default::default()
        });

        self.client
            .remove_container(container_id, options)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                    DockerError::ContainerNotFound(container_id.to_string())
                }
                other => DockerError::Api(other),
            })
    }
}
