//! Event domain — Docker engine lifecycle event streaming.

use super::client::{DockerClient, DockerError};
use bollard::models::EventMessage;
use futures_util::stream::StreamExt;

/// Lifecycle actions the listener reacts to. Everything else is `Other`
/// and gets ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Start,
    Stop,
    Other,
}

impl From<&str> for EventAction {
    fn from(action: &str) -> Self {
        match action {
            "start" => EventAction::Start,
            "stop" => EventAction::Stop,
            _ => EventAction::Other,
        }
    }
}

/// A container lifecycle event: `(action, container id)`.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub action: EventAction,
    pub container_id: String,
}

/// Map a raw engine event to a lifecycle event. Events without an actor id
/// carry nothing to act on and are dropped.
pub fn from_message(message: EventMessage) -> Option<LifecycleEvent> {
    let container_id = message.actor.and_then(|actor| actor.id)?;
    let action = message
        .action
        .as_deref()
        .map(EventAction::from)
        .unwrap_or(EventAction::Other);
    Some(LifecycleEvent {
        action,
        container_id,
    })
}

impl DockerClient {
    /// Stream container lifecycle events from the engine.
    pub fn lifecycle_events(
        &self,
    ) -> impl futures_util::Stream<Item = Result<LifecycleEvent, DockerError>> + '_ {
        use bollard::query_parameters::EventsOptionsBuilder;
        use std::collections::HashMap;

        let mut filters = HashMap::new();
        filters.insert("type", vec!["container"]);

        let options = EventsOptionsBuilder::default().filters(&filters).build();

        self.client
            .events(Some(options))
            .filter_map(|result| async move {
                match result {
                    Ok(message) => from_message(message).map(Ok),
                    Err(e) => Some(Err(DockerError::Api(e))),
                }
            })
    }
}
