//! Listener — translates runtime lifecycle events into monitor
//! creation and teardown.
//!
//! A single control task owns the container-id → cancellation registry;
//! monitor tasks never touch it. Everything that mutates the registry —
//! engine events, monitor completions, shutdown — is funneled through this
//! task's `select!` loop, so start/stop events for the same id apply in
//! arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::client::{RuntimeOps, StoreOps};
use crate::docker::client::DockerError;
use crate::docker::event::{EventAction, LifecycleEvent};
use crate::monitor::Monitor;
use crate::resolve::{ResolveError, Resolver};

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error(transparent)]
    Docker(#[from] DockerError),
    #[error("event stream ended unexpectedly")]
    EventStreamClosed,
}

/// Event-driven supervisor over all containers known to the runtime.
pub struct Listener {
    runtime: Arc<dyn RuntimeOps>,
    store: Arc<dyn StoreOps>,
    resolver: Resolver,
    /// Cancellation handles, keyed by container id. Owned exclusively by
    /// the event loop; exactly one monitor per tracked id.
    monitors: HashMap<String, oneshot::Sender<()>>,
    /// Running monitor tasks; doubles as the completion barrier on
    /// shutdown. Each task yields its container id when it stops.
    tasks: JoinSet<String>,
}

impl Listener {
    pub fn new(runtime: Arc<dyn RuntimeOps>, store: Arc<dyn StoreOps>) -> Self {
        let resolver = Resolver::new(Arc::clone(&runtime));
        Self {
            runtime,
            store,
            resolver,
            monitors: HashMap::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Run the event loop until `shutdown` fires. Returns only after every
    /// monitor task has observed cancellation and exited.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ListenerError> {
        self.start_existing().await?;

        let runtime = Arc::clone(&self.runtime);
        let mut events = runtime.lifecycle_events();

        loop {
            tokio::select! {
                maybe_event = events.next() => match maybe_event {
                    Some(Ok(event)) => self.apply_event(event).await,
                    Some(Err(e)) => warn!("event stream error: {e}"),
                    None => {
                        self.drain().await;
                        return Err(ListenerError::EventStreamClosed);
                    }
                },
                Some(joined) = self.tasks.join_next() => {
                    if let Ok(id) = joined {
                        // The monitor stopped on its own; drop the stale
                        // registry entry.
                        self.monitors.remove(&id);
                    }
                }
                _ = shutdown.changed() => {
                    info!("stop listening");
                    self.drain().await;
                    return Ok(());
                }
            }
        }
    }

    /// Start monitoring every container already known to the runtime.
    /// Individual containers failing to resolve are logged and skipped.
    async fn start_existing(&mut self) -> Result<(), ListenerError> {
        debug!("start monitoring already existing containers");
        let heads = self.runtime.list_containers().await?;
        for head in heads {
            if let Err(e) = self.add_monitor(&head.id).await {
                warn!(container = %head.id, "cannot create monitor: {e}");
            }
        }
        Ok(())
    }

    async fn apply_event(&mut self, event: LifecycleEvent) {
        match event.action {
            EventAction::Start => {
                if let Err(e) = self.add_monitor(&event.container_id).await {
                    warn!(
                        container = %event.container_id,
                        "got error when trying to monitor started container: {e}"
                    );
                }
            }
            EventAction::Stop => {
                if let Some(cancel) = self.monitors.remove(&event.container_id) {
                    debug!(container = %event.container_id, "stop event, cancelling monitor");
                    let _ = cancel.send(());
                }
            }
            EventAction::Other => {}
        }
    }

    /// Resolve a container and spawn its monitor. Containers without a
    /// probe command never get one; an id that is already tracked is left
    /// alone.
    async fn add_monitor(&mut self, id: &str) -> Result<(), ResolveError> {
        if self.monitors.contains_key(id) {
            debug!(container = %id, "already monitored");
            return Ok(());
        }

        let descriptor = self.resolver.resolve_id(id).await?;
        if descriptor.health_check.is_none() {
            debug!(container = %descriptor, "no health check declared, skipping");
            return Ok(());
        }

        let monitor = Monitor::new(
            descriptor,
            Arc::clone(&self.runtime),
            Arc::clone(&self.store),
        );
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.tasks.spawn(monitor.run(cancel_rx));
        self.monitors.insert(id.to_string(), cancel_tx);
        Ok(())
    }

    /// Cancel every monitor and block until all of them have exited.
    async fn drain(&mut self) {
        for (_, cancel) in self.monitors.drain() {
            let _ = cancel.send(());
        }
        while self.tasks.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{container, FakeRuntime, FakeStore};
    use std::time::Duration;

    const TTL_ENV: &str = "HEALTHCHECKTTL=2";

    fn supported(id: &str, name: &str, service: &str) -> crate::docker::container::ContainerInfo {
        container(
            id,
            name,
            &format!("registry/{service}"),
            &["HEALTHCHECK=/bin/probe", TTL_ENV],
            "172.17.0.2",
            true,
        )
    }

    fn start_event(id: &str) -> LifecycleEvent {
        LifecycleEvent {
            action: EventAction::Start,
            container_id: id.to_string(),
        }
    }

    fn stop_event(id: &str) -> LifecycleEvent {
        LifecycleEvent {
            action: EventAction::Stop,
            container_id: id.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_skips_containers_without_probe() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_container(supported("aaa", "web", "web:1.0")).await;
        runtime
            .add_container(container("bbb", "db", "db:1.0", &[], "172.17.0.3", true))
            .await;
        let store = Arc::new(FakeStore::new());

        let listener = Listener::new(runtime.clone(), store.clone());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(2_500)).await;

        assert_eq!(store.keys().await, vec!["/service/web:1.0/aaa".to_string()]);
        // Every probe ran against the supported container's image.
        for probe in runtime.created_probes().await {
            assert_eq!(probe.image, "registry/web:1.0");
        }

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_event_spawns_monitor() {
        let runtime = Arc::new(FakeRuntime::new());
        let store = Arc::new(FakeStore::new());
        let events = runtime.event_sender();

        let listener = Listener::new(runtime.clone(), store.clone());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        runtime.add_container(supported("ccc", "api", "api:2.0")).await;
        events.send(start_event("ccc")).unwrap();

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(store.entry("/service/api:2.0/ccc").await.is_some());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_start_event_keeps_one_monitor() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_container(supported("aaa", "web", "web:1.0")).await;
        let store = Arc::new(FakeStore::new());
        let events = runtime.event_sender();

        let listener = Listener::new(runtime.clone(), store.clone());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        events.send(start_event("aaa")).unwrap();
        tokio::time::sleep(Duration::from_millis(5_100)).await;

        // Ticks at 2s and 4s; a duplicate monitor would have doubled this.
        assert_eq!(store.set_count_for("/service/web:1.0/aaa").await, 2);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_event_removes_exactly_one_monitor() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_container(supported("aaa", "web", "web:1.0")).await;
        runtime.add_container(supported("bbb", "api", "api:2.0")).await;
        let store = Arc::new(FakeStore::new());
        let events = runtime.event_sender();

        let listener = Listener::new(runtime.clone(), store.clone());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(store.set_count_for("/service/web:1.0/aaa").await, 1);
        assert_eq!(store.set_count_for("/service/api:2.0/bbb").await, 1);

        events.send(stop_event("aaa")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let web_writes = store.set_count_for("/service/web:1.0/aaa").await;
        tokio::time::sleep(Duration::from_secs(4)).await;

        // web stopped writing, api kept going.
        assert_eq!(store.set_count_for("/service/web:1.0/aaa").await, web_writes);
        assert!(store.set_count_for("/service/api:2.0/bbb").await >= 2);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_event_for_unknown_id_is_noop() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_container(supported("aaa", "web", "web:1.0")).await;
        let store = Arc::new(FakeStore::new());
        let events = runtime.event_sender();

        let listener = Listener::new(runtime.clone(), store.clone());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        events.send(stop_event("ghost")).unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        assert_eq!(store.set_count_for("/service/web:1.0/aaa").await, 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_every_monitor() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_container(supported("aaa", "web", "web:1.0")).await;
        runtime.add_container(supported("bbb", "api", "api:2.0")).await;
        runtime.add_container(supported("ccc", "job", "job:3.0")).await;
        let store = Arc::new(FakeStore::new());

        let listener = Listener::new(runtime.clone(), store.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(store.set_count().await, 3);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("shutdown did not drain")
            .unwrap()
            .unwrap();

        // No tick starts after shutdown returned.
        let writes = store.set_count().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.set_count().await, writes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_container_entry_is_reaped() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_container(supported("aaa", "web", "web:1.0")).await;
        let store = Arc::new(FakeStore::new());
        let events = runtime.event_sender();

        let listener = Listener::new(runtime.clone(), store.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        runtime.vanish("aaa").await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        // The monitor stopped itself; a fresh start event re-creates it.
        runtime.add_container(supported("aaa", "web", "web:1.0")).await;
        events.send(start_event("aaa")).unwrap();
        tokio::time::sleep(Duration::from_millis(2_100)).await;

        assert!(store.set_count_for("/service/web:1.0/aaa").await >= 2);

        shutdown_tx.send(true).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }
}
