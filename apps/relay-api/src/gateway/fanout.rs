//! Room-scoped fan-out to connected clients.
//!
//! Every live connection registers an outbound queue here and is subscribed
//! to at most one room at a time. Broadcasts are delivered to the set of
//! connections subscribed to the room at the moment of the call.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::events::ServerEvent;

/// Receiving half handed to the connection task.
pub type Outbox = mpsc::UnboundedReceiver<Arc<ServerEvent>>;

struct ConnectionEntry {
    sender: mpsc::UnboundedSender<Arc<ServerEvent>>,
    room: Option<String>,
}

/// Registry of live connections and their room subscriptions.
pub struct ConnectionHub {
    connections: DashMap<String, ConnectionEntry>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection and return the queue its events arrive on.
    pub fn register(&self, connection_id: &str) -> Outbox {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.connections
            .insert(connection_id.to_string(), ConnectionEntry { sender, room: None });
        receiver
    }

    pub fn unregister(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    /// Put a connection into a room's broadcast scope, leaving any previous one.
    pub fn subscribe(&self, connection_id: &str, room: &str) {
        if let Some(mut entry) = self.connections.get_mut(connection_id) {
            entry.room = Some(room.to_string());
        }
    }

    /// Drop a connection from its room's broadcast scope.
    pub fn unsubscribe(&self, connection_id: &str) -> Option<String> {
        self.connections
            .get_mut(connection_id)
            .and_then(|mut entry| entry.room.take())
    }

    pub fn room_of(&self, connection_id: &str) -> Option<String> {
        self.connections
            .get(connection_id)
            .and_then(|entry| entry.room.clone())
    }

    /// Send an event to a single connection. Returns false if the connection
    /// is gone.
    pub fn send_to(&self, connection_id: &str, event: ServerEvent) -> bool {
        match self.connections.get(connection_id) {
            Some(entry) => entry.sender.send(Arc::new(event)).is_ok(),
            None => false,
        }
    }

    /// Deliver an event to every connection in `room` except `exclude`.
    /// Returns the number of connections it was queued for.
    pub fn broadcast(&self, room: &str, event: ServerEvent, exclude: Option<&str>) -> usize {
        let event = Arc::new(event);
        let mut delivered = 0;
        for entry in self.connections.iter() {
            if entry.room.as_deref() != Some(room) || exclude == Some(entry.key().as_str()) {
                continue;
            }
            // A closed queue means the connection is tearing down.
            if entry.sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}
