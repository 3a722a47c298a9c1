//! Inbound event dispatch: event name -> coordinator handler.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use super::coordinator::RoomCoordinator;
use super::events::{EventName, JoinRoomPayload, SendMessagePayload};

type Handler = for<'a> fn(&'a RoomCoordinator, &'a str, Value) -> BoxFuture<'a, ()>;

/// Outcome of routing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Handled,
    Unknown,
}

pub struct Dispatcher {
    coordinator: Arc<RoomCoordinator>,
    handlers: HashMap<&'static str, Handler>,
}

impl Dispatcher {
    pub fn new(coordinator: Arc<RoomCoordinator>) -> Self {
        let mut handlers: HashMap<&'static str, Handler> = HashMap::new();
        handlers.insert(EventName::CONNECT, on_connect);
        handlers.insert(EventName::JOIN_ROOM, on_join_room);
        handlers.insert(EventName::SEND_MESSAGE, on_send_message);
        handlers.insert(EventName::DISCONNECT, on_disconnect);
        Self {
            coordinator,
            handlers,
        }
    }

    pub fn coordinator(&self) -> &Arc<RoomCoordinator> {
        &self.coordinator
    }

    /// Route an event to its handler.
    pub async fn dispatch(&self, connection_id: &str, event: &str, data: Value) -> Dispatched {
        match self.handlers.get(event) {
            Some(handler) => {
                handler(&self.coordinator, connection_id, data).await;
                Dispatched::Handled
            }
            None => {
                tracing::debug!(connection_id = %connection_id, event = %event, "unknown event");
                Dispatched::Unknown
            }
        }
    }

    /// Route an event that arrived from the client. Lifecycle events are
    /// reserved for the transport and treated as unknown here.
    pub async fn dispatch_client(&self, connection_id: &str, event: &str, data: Value) -> Dispatched {
        if EventName::is_lifecycle(event) {
            tracing::debug!(connection_id = %connection_id, event = %event, "client sent lifecycle event");
            return Dispatched::Unknown;
        }
        self.dispatch(connection_id, event, data).await
    }
}

fn on_connect<'a>(c: &'a RoomCoordinator, connection_id: &'a str, _data: Value) -> BoxFuture<'a, ()> {
    Box::pin(c.on_connect(connection_id))
}

fn on_join_room<'a>(c: &'a RoomCoordinator, connection_id: &'a str, data: Value) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let payload = JoinRoomPayload::from_value(data);
        c.on_join(connection_id, &payload.username, &payload.room).await;
    })
}

fn on_send_message<'a>(
    c: &'a RoomCoordinator,
    connection_id: &'a str,
    data: Value,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let payload = SendMessagePayload::from_value(data);
        c.on_message(connection_id, &payload.message).await;
    })
}

fn on_disconnect<'a>(c: &'a RoomCoordinator, connection_id: &'a str, _data: Value) -> BoxFuture<'a, ()> {
    Box::pin(c.on_disconnect(connection_id))
}
