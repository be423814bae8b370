//! Runtime trait — abstract interface for the container runtime.
//!
//! Object-safe thanks to `Pin<Box<…>>` returns. Implementations must be
//! `Send + Sync` so they can be shared across monitor tasks.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;

use crate::docker::client::DockerError;
use crate::docker::container::{ContainerHead, ContainerInfo};
use crate::docker::event::LifecycleEvent;

pub trait RuntimeOps: Send + Sync {
    /// List all containers known to the runtime, running or not.
    fn list_containers(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ContainerHead>, DockerError>> + Send + '_>>;

    fn inspect_container<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ContainerInfo, DockerError>> + Send + 'a>>;

    /// Create a container from `image` with an overridden entrypoint and a
    /// single argument; returns the new container's id.
    fn create_container<'a>(
        &'a self,
        image: &'a str,
        entrypoint: &'a str,
        arg: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, DockerError>> + Send + 'a>>;

    fn start_container<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), DockerError>> + Send + 'a>>;

    /// Block until the container exits; returns its status code.
    fn wait_container<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<i64, DockerError>> + Send + 'a>>;

    fn container_logs_tail<'a>(
        &'a self,
        id: &'a str,
        lines: usize,
    ) -> Pin<Box<dyn Future<Output = Result<String, DockerError>> + Send + 'a>>;

    fn remove_container<'a>(
        &'a self,
        id: &'a str,
        force: bool,
        remove_volumes: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), DockerError>> + Send + 'a>>;

    /// Live stream of container lifecycle events.
    fn lifecycle_events(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<LifecycleEvent, DockerError>> + Send + '_>>;
}
