//! Registration client — publishes service records under TTL-bound keys.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::client::StoreOps;
use crate::docker::container::PortMapping;
use crate::resolve::ContainerDescriptor;
use crate::store::StoreError;

/// The published document describing a healthy container instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRecord {
    pub ip: String,
    pub name: String,
    pub ports: Vec<PortMapping>,
}

impl From<&ContainerDescriptor> for ServiceRecord {
    fn from(descriptor: &ContainerDescriptor) -> Self {
        Self {
            ip: descriptor.address.clone(),
            name: descriptor.name.clone(),
            ports: descriptor.ports.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("cannot encode service record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Service name: the last path segment of the image reference
/// (`registry/group/myservice:tag` -> `myservice:tag`).
pub fn service_name(image: &str) -> &str {
    image.rsplit('/').next().unwrap_or(image)
}

/// Record expiry: one missed tick keeps the record alive, two consecutive
/// misses expire it.
pub fn record_ttl(check_interval: Duration) -> u64 {
    check_interval.as_secs() * 2 + 1
}

pub struct Registrar {
    store: Arc<dyn StoreOps>,
}

impl Registrar {
    pub fn new(store: Arc<dyn StoreOps>) -> Self {
        Self { store }
    }

    /// Write the descriptor's service record and refresh the service
    /// directory's expiry. No retry here; the next tick retries naturally.
    pub async fn register(&self, descriptor: &ContainerDescriptor) -> Result<(), RegisterError> {
        let service = service_name(&descriptor.image);
        let key = format!("/service/{}/{}", service, descriptor.id);
        let ttl = record_ttl(descriptor.check_interval);

        debug!(container = %descriptor, key = %key, ttl, "register service record");

        let value = serde_json::to_string(&ServiceRecord::from(descriptor))?;
        self.store.set(&key, &value, ttl).await?;
        self.store
            .refresh_dir(&format!("/service/{}/", service), ttl)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{container, FakeStore};
    use crate::resolve::{ContainerDescriptor, DEFAULT_CHECK_INTERVAL};

    fn descriptor() -> ContainerDescriptor {
        let info = container(
            "abc123",
            "web-1",
            "registry/team/myservice:1.2",
            &["HEALTHCHECK=/probe", "HEALTHCHECKTTL=5"],
            "172.17.0.2",
            true,
        );
        ContainerDescriptor {
            id: info.id,
            name: info.name,
            image: info.image,
            address: info.ip_address,
            ports: info.ports,
            health_check: Some("/probe".to_string()),
            check_interval: Duration::from_secs(5),
            running: true,
        }
    }

    #[test]
    fn test_service_name_is_last_image_segment() {
        assert_eq!(service_name("registry/group/myservice:tag"), "myservice:tag");
        assert_eq!(service_name("myservice"), "myservice");
        assert_eq!(service_name("library/redis"), "redis");
    }

    #[test]
    fn test_record_ttl_survives_one_missed_tick() {
        assert_eq!(record_ttl(Duration::from_secs(5)), 11);
        assert_eq!(record_ttl(DEFAULT_CHECK_INTERVAL), 61);
    }

    #[tokio::test]
    async fn test_register_writes_record_and_refreshes_dir() {
        let store = Arc::new(FakeStore::new());
        let registrar = Registrar::new(store.clone());

        registrar.register(&descriptor()).await.unwrap();

        let entry = store
            .entry("/service/myservice:1.2/abc123")
            .await
            .expect("record missing");
        assert_eq!(entry.ttl, 11);

        let record: serde_json::Value = serde_json::from_str(&entry.value).unwrap();
        assert_eq!(record["ip"], "172.17.0.2");
        assert_eq!(record["name"], "web-1");
        assert!(record["ports"].is_array());

        assert_eq!(store.dir_ttl("/service/myservice:1.2/").await, Some(11));
    }

    #[tokio::test]
    async fn test_register_overwrites_same_key() {
        let store = Arc::new(FakeStore::new());
        let registrar = Registrar::new(store.clone());

        registrar.register(&descriptor()).await.unwrap();
        registrar.register(&descriptor()).await.unwrap();

        assert_eq!(store.keys().await.len(), 1);
        assert_eq!(
            store.set_count_for("/service/myservice:1.2/abc123").await,
            2
        );
    }

    #[tokio::test]
    async fn test_register_surfaces_store_failure() {
        let store = Arc::new(FakeStore::new());
        store.set_failing(true).await;
        let registrar = Registrar::new(store);

        assert!(matches!(
            registrar.register(&descriptor()).await,
            Err(RegisterError::Store(_))
        ));
    }
}
