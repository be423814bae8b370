//! Docker client — core struct, constructor, error type.

use bollard::Docker;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Container not found: {0}")]
    ContainerNotFound(String),
    #[error("Event stream closed")]
    StreamClosed,
    #[error("Docker API error: {0}")]
    Api(#[from] bollard::errors::Error),
}

impl DockerError {
    /// True when the error means the container no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DockerError::ContainerNotFound(_))
    }
}

#[derive(Debug, Clone)]
pub struct DockerClient {
    /// The bollard Docker client.  `pub(super)` so that domain modules
    /// in sibling files can call bollard APIs directly.
    pub(super) client: Docker,
}

impl DockerClient {
    /// Connect to the Docker daemon. An empty `socket_path` uses bollard's
    /// defaults (`DOCKER_HOST` or the platform socket).
    pub fn new(socket_path: &str) -> Result<Self, DockerError> {
        let connection = if socket_path.is_empty() {
            Docker::connect_with_defaults()
                .map_err(|e| DockerError::ConnectionFailed(e.to_string()))?
        } else {
            let clean_path = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(clean_path, 120, &bollard::API_DEFAULT_VERSION)
                .map_err(|e| DockerError::ConnectionFailed(e.to_string()))?
        };

        Ok(DockerClient { client: connection })
    }
}
