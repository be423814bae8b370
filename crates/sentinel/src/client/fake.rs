//! Fake — deterministic test doubles for the collaborators.
//!
//! [`FakeRuntime`] implements [`RuntimeOps`] over in-memory state and
//! [`FakeStore`] implements [`StoreOps`] over a plain map, so the
//! supervision core can be exercised without a Docker daemon or an etcd
//! cluster. Builder methods pre-populate containers and script probe
//! outcomes before running test code.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::runtime::RuntimeOps;
use super::store::StoreOps;
use crate::docker::client::DockerError;
use crate::docker::container::{ContainerHead, ContainerInfo, PortMapping};
use crate::docker::event::LifecycleEvent;
use crate::store::StoreError;

// ── Fake runtime ────────────────────────────────────────────────

/// One recorded ephemeral-container run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRun {
    pub id: String,
    pub image: String,
    pub entrypoint: String,
    pub arg: String,
}

#[derive(Default)]
struct RuntimeInner {
    containers: HashMap<String, ContainerInfo>,
    created: Vec<ProbeRun>,
    removed: Vec<String>,
    probe_seq: u64,
    probe_exit_code: i64,
    probe_output: String,
    refuse_create: bool,
}

/// A fake container runtime for deterministic testing.
pub struct FakeRuntime {
    inner: Mutex<RuntimeInner>,
    events_tx: mpsc::UnboundedSender<LifecycleEvent>,
    events_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<LifecycleEvent>>>,
}

/// Build a [`ContainerInfo`] the way docker inspect would report it.
pub fn container(
    id: &str,
    name: &str,
    image: &str,
    env: &[&str],
    ip: &str,
    running: bool,
) -> ContainerInfo {
    ContainerInfo {
        id: id.to_string(),
        name: name.to_string(),
        image: image.to_string(),
        env: env.iter().map(|e| e.to_string()).collect(),
        ip_address: ip.to_string(),
        ports: vec![PortMapping {
            container_port: 80,
            protocol: "tcp".to_string(),
            host_ip: None,
            host_port: None,
        }],
        running,
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            inner: Mutex::new(RuntimeInner::default()),
            events_tx,
            events_rx: std::sync::Mutex::new(Some(events_rx)),
        }
    }

    /// Seed a container into the fake runtime.
    pub async fn add_container(&self, info: ContainerInfo) {
        let mut state = self.inner.lock().await;
        state.containers.insert(info.id.clone(), info);
    }

    /// Make a container disappear, as if it was removed out of band.
    pub async fn vanish(&self, id: &str) {
        self.inner.lock().await.containers.remove(id);
    }

    /// Script the exit code of every subsequent probe run.
    pub async fn set_probe_exit(&self, code: i64) {
        self.inner.lock().await.probe_exit_code = code;
    }

    /// Script the captured output of failing probe runs.
    pub async fn set_probe_output(&self, output: &str) {
        self.inner.lock().await.probe_output = output.to_string();
    }

    /// Make every subsequent create call fail.
    pub async fn refuse_create(&self) {
        self.inner.lock().await.refuse_create = true;
    }

    /// Handle for injecting lifecycle events into the stream.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<LifecycleEvent> {
        self.events_tx.clone()
    }

    /// Every ephemeral container created so far.
    pub async fn created_probes(&self) -> Vec<ProbeRun> {
        self.inner.lock().await.created.clone()
    }

    /// Every container id removed so far.
    pub async fn removed_containers(&self) -> Vec<String> {
        self.inner.lock().await.removed.clone()
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeOps for FakeRuntime {
    fn list_containers(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ContainerHead>, DockerError>> + Send + '_>> {
        Box::pin(async move {
            let state = self.inner.lock().await;
            Ok(state
                .containers
                .values()
                .map(|info| ContainerHead {
                    id: info.id.clone(),
                    names: vec![format!("/{}", info.name)],
                })
                .collect())
        })
    }

    fn inspect_container<'a>(
        &'a self,
        id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ContainerInfo, DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.inner.lock().await;
            state
                .containers
                .get(id)
                .cloned()
                .ok_or_else(|| DockerError::ContainerNotFound(id.to_string()))
        })
    }

    fn create_container<'a>(
        &'a self,
        image: &'a str,
        entrypoint: &'a str,
        arg: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, DockerError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            if state.refuse_create {
                return Err(DockerError::ConnectionFailed("create refused".to_string()));
            }
            state.probe_seq += 1;
            let id = format!("probe-{}", state.probe_seq);
            state.created.push(ProbeRun {
                id: id.clone(),
                image: image.to_string(),
                entrypoint: entrypoint.to_string(),
                arg: arg.to_string(),
            });
            Ok(id)
        })
    }

    fn start_container<'a>(
        &'a self,
        _id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(async move { Ok(()) })
    }

    fn wait_container<'a>(
        &'a self,
        _id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<i64, DockerError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.inner.lock().await.probe_exit_code) })
    }

    fn container_logs_tail<'a>(
        &'a self,
        _id: &'a str,
        _lines: usize,
    ) -> Pin<Box<dyn Future<Output = Result<String, DockerError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.inner.lock().await.probe_output.clone()) })
    }

    fn remove_container<'a>(
        &'a self,
        id: &'a str,
        _force: bool,
        _remove_volumes: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), DockerError>> + Send + 'a>> {
        Box::pin(async move {
            self.inner.lock().await.removed.push(id.to_string());
            Ok(())
        })
    }

    fn lifecycle_events(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<LifecycleEvent, DockerError>> + Send + '_>> {
        let taken = self
            .events_rx
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        match taken {
            Some(rx) => Box::pin(UnboundedReceiverStream::new(rx).map(Ok::<_, DockerError>)),
            // The stream was already claimed; never end the new one, an
            // ended stream means a dead runtime to the listener.
            None => Box::pin(futures_util::stream::pending()),
        }
    }
}

// ── Fake store ──────────────────────────────────────────────────

/// A stored key with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub ttl: u64,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<String, StoredValue>,
    dirs: HashMap<String, u64>,
    set_log: Vec<String>,
    failing: bool,
}

/// A fake key-value store recording every write.
#[derive(Default)]
pub struct FakeStore {
    inner: Mutex<StoreInner>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail.
    pub async fn set_failing(&self, failing: bool) {
        self.inner.lock().await.failing = failing;
    }

    pub async fn entry(&self, key: &str) -> Option<StoredValue> {
        self.inner.lock().await.entries.get(key).cloned()
    }

    pub async fn dir_ttl(&self, path: &str) -> Option<u64> {
        self.inner.lock().await.dirs.get(path).copied()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.lock().await.entries.keys().cloned().collect()
    }

    /// Total number of successful key writes.
    pub async fn set_count(&self) -> usize {
        self.inner.lock().await.set_log.len()
    }

    /// Number of successful writes to one key.
    pub async fn set_count_for(&self, key: &str) -> usize {
        self.inner
            .lock()
            .await
            .set_log
            .iter()
            .filter(|k| k.as_str() == key)
            .count()
    }
}

impl StoreOps for FakeStore {
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            if state.failing {
                return Err(StoreError::Rejected {
                    status: 500,
                    body: "injected store failure".to_string(),
                });
            }
            state.entries.insert(
                key.to_string(),
                StoredValue {
                    value: value.to_string(),
                    ttl: ttl_secs,
                },
            );
            state.set_log.push(key.to_string());
            Ok(())
        })
    }

    fn refresh_dir<'a>(
        &'a self,
        path: &'a str,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            if state.failing {
                return Err(StoreError::Rejected {
                    status: 500,
                    body: "injected store failure".to_string(),
                });
            }
            state.dirs.insert(path.to_string(), ttl_secs);
            Ok(())
        })
    }
}
