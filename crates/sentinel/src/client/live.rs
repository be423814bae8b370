//! Live — wires the collaborator traits to the real clients.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;

use super::runtime::RuntimeOps;
use super::store::StoreOps;
use crate::docker::client::{DockerClient, DockerError};
use crate::docker::container::{ContainerHead, ContainerInfo};
use crate::docker::event::LifecycleEvent;
use crate::store::{EtcdClient, StoreError};

impl RuntimeOps for DockerClient {
    fn list_containers(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ContainerHead>, DockerError>> + Send + '_>> {
        Box::pin(self.list_containers())
    }

    fn inspect_container<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ContainerInfo, DockerError>> + Send + 'a>> {
        Box::pin(self.inspect_container(id))
    }

    fn create_container<'a>(
        &'a self,
        image: &'a str,
        entrypoint: &'a str,
        arg: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, DockerError>> + Send + 'a>> {
        Box::pin(self.create_container(image, entrypoint, arg))
    }

    fn start_container<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(self.start_container(id))
    }

    fn wait_container<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<i64, DockerError>> + Send + 'a>> {
        Box::pin(self.wait_container(id))
    }

    fn container_logs_tail<'a>(
        &'a self,
        id: &'a str,
        lines: usize,
    ) -> Pin<Box<dyn Future<Output = Result<String, DockerError>> + Send + 'a>> {
        Box::pin(self.container_logs_tail(id, lines))
    }

    fn remove_container<'a>(
        &'a self,
        id: &'a str,
        force: bool,
        remove_volumes: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(self.remove_container(id, force, remove_volumes))
    }

    fn lifecycle_events(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<LifecycleEvent, DockerError>> + Send + '_>> {
        Box::pin(self.lifecycle_events())
    }
}

impl StoreOps for EtcdClient {
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(self.set(key, value, ttl_secs))
    }

    fn refresh_dir<'a>(
        &'a self,
        path: &'a str,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(self.refresh_dir(path, ttl_secs))
    }
}
