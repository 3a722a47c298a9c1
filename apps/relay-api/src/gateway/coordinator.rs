//! Room coordination: join / message / disconnect transitions.
//!
//! A connection is either unbound or bound to exactly one (username, room).
//! The coordinator keeps the session table, the hub's broadcast scopes and the
//! history store in step. Store failures are logged and the live path
//! carries on without them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use relay_common::Message;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use utoipa::ToSchema;

use super::events::ServerEvent;
use super::fanout::ConnectionHub;
use super::session::{Session, SessionTable};
use crate::config::RoomSettings;
use crate::db::HistoryStore;
use crate::error::StoreError;

const CONNECTED_MESSAGE: &str = "Connection established";
const JOIN_REQUIRES_FIELDS: &str = "Username and room are required";
const MUST_JOIN_FIRST: &str = "You must join a room first";
const MEMBER_LOCK_STRIPES: usize = 64;

/// A room with at least one durable member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoomSummary {
    pub name: String,
    pub users: Vec<String>,
    pub user_count: usize,
}

/// Serializes member-set changes per `(room, username)`.
///
/// "bind + SADD" and "has_member + SREM" each run under the stripe for their
/// pair, so a release can never remove a member that a concurrent join just
/// bound. At most one stripe is held at a time.
struct MemberLocks {
    stripes: Vec<Mutex<()>>,
}

impl MemberLocks {
    fn new() -> Self {
        Self {
            stripes: (0..MEMBER_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    async fn lock(&self, room: &str, username: &str) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        (room, username).hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.stripes.len();
        self.stripes[idx].lock().await
    }
}

pub struct RoomCoordinator {
    sessions: Arc<SessionTable>,
    hub: Arc<ConnectionHub>,
    store: Arc<dyn HistoryStore>,
    settings: RoomSettings,
    member_locks: MemberLocks,
}

impl RoomCoordinator {
    pub fn new(
        sessions: Arc<SessionTable>,
        hub: Arc<ConnectionHub>,
        store: Arc<dyn HistoryStore>,
        settings: RoomSettings,
    ) -> Self {
        Self {
            sessions,
            hub,
            store,
            settings,
            member_locks: MemberLocks::new(),
        }
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    /// Acknowledge a freshly opened connection.
    pub async fn on_connect(&self, connection_id: &str) {
        tracing::debug!(connection_id = %connection_id, "connection opened");
        self.hub
            .send_to(connection_id, ServerEvent::connected(CONNECTED_MESSAGE));
    }

    /// Bind a connection to `(username, room)`, reply with recent history and
    /// announce the arrival to the rest of the room.
    ///
    /// Joining again while bound leaves the previous room before the new one
    /// is announced.
    pub async fn on_join(&self, connection_id: &str, username: &str, room: &str) {
        let username = username.trim();
        let room = room.trim();
        if username.is_empty() || room.is_empty() {
            self.hub
                .send_to(connection_id, ServerEvent::error(JOIN_REQUIRES_FIELDS));
            return;
        }

        let previous = {
            let _guard = self.member_locks.lock(room, username).await;
            let previous = self.sessions.bind(connection_id, username, room);
            if let Err(e) = self.store.add_member(room, username).await {
                self.log_store_failure(&e, room, username, "failed to record room member");
            }
            previous
        };

        if let Some(prev) = previous {
            if prev.room != room || prev.username != username {
                tracing::info!(
                    connection_id = %connection_id,
                    from = %prev.room,
                    to = %room,
                    "rejoin, leaving previous room"
                );
                self.leave_room(connection_id, &prev).await;
            }
        }

        self.hub.subscribe(connection_id, room);

        let messages = self.history(room).await;
        self.hub.send_to(
            connection_id,
            ServerEvent::room_joined(room, username, messages),
        );

        self.hub.broadcast(
            room,
            ServerEvent::user_joined(username),
            Some(connection_id),
        );

        tracing::info!(connection_id = %connection_id, username = %username, room = %room, "joined room");
    }

    /// Post a message to the sender's room.
    pub async fn on_message(&self, connection_id: &str, text: &str) {
        let Some(session) = self.sessions.lookup(connection_id) else {
            self.hub
                .send_to(connection_id, ServerEvent::error(MUST_JOIN_FIRST));
            return;
        };

        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let message = Message::new(&session.username, &session.room, text);

        if let Err(e) = self
            .store
            .append_message(
                &session.room,
                &message,
                self.settings.history_cap,
                self.settings.history_ttl_secs,
            )
            .await
        {
            tracing::warn!(room = %session.room, message_id = %message.id, ?e, "failed to persist message");
        }

        let delivered = self
            .hub
            .broadcast(&session.room, ServerEvent::new_message(&message), None);

        tracing::debug!(
            room = %session.room,
            username = %session.username,
            delivered,
            "message broadcast"
        );
    }

    /// Tear down a connection's session. A connection that never joined is a
    /// no-op, as is a second disconnect.
    pub async fn on_disconnect(&self, connection_id: &str) {
        let Some(session) = self.sessions.unbind(connection_id) else {
            tracing::debug!(connection_id = %connection_id, "connection closed without a session");
            return;
        };

        self.hub.unsubscribe(connection_id);
        self.release_member(&session).await;
        self.hub
            .broadcast(&session.room, ServerEvent::user_left(&session.username), None);

        tracing::info!(
            connection_id = %connection_id,
            username = %session.username,
            room = %session.room,
            "left room on disconnect"
        );
    }

    /// Rooms with a non-empty member set. Empty when the store is down.
    pub async fn list_active_rooms(&self) -> Vec<RoomSummary> {
        match self.try_list_active_rooms().await {
            Ok(rooms) => rooms,
            Err(e) => {
                tracing::warn!(?e, "failed to list rooms");
                Vec::new()
            }
        }
    }

    /// Like [`list_active_rooms`](Self::list_active_rooms) but surfaces the
    /// store error.
    pub async fn try_list_active_rooms(&self) -> Result<Vec<RoomSummary>, StoreError> {
        let mut names = self.store.member_rooms().await?;
        names.sort();
        names.dedup();

        let mut rooms = Vec::with_capacity(names.len());
        for name in names {
            let mut users = self.store.members(&name).await?;
            if users.is_empty() {
                continue;
            }
            users.sort();
            rooms.push(RoomSummary {
                user_count: users.len(),
                name,
                users,
            });
        }
        Ok(rooms)
    }

    /// Recent history, oldest first. Empty when the store is down.
    async fn history(&self, room: &str) -> Vec<Message> {
        match self
            .store
            .recent_messages(room, self.settings.history_limit)
            .await
        {
            Ok(mut messages) => {
                messages.reverse();
                messages
            }
            Err(e) => {
                tracing::warn!(room = %room, ?e, "failed to load room history");
                Vec::new()
            }
        }
    }

    /// Leave `prev` while the connection stays open (rejoin elsewhere).
    async fn leave_room(&self, connection_id: &str, prev: &Session) {
        self.release_member(prev).await;
        self.hub.broadcast(
            &prev.room,
            ServerEvent::user_left(&prev.username),
            Some(connection_id),
        );
    }

    /// Drop a username from the durable member set unless another live
    /// connection still holds it in the same room.
    async fn release_member(&self, session: &Session) {
        let _guard = self
            .member_locks
            .lock(&session.room, &session.username)
            .await;
        if self.sessions.has_member(&session.room, &session.username) {
            return;
        }
        if let Err(e) = self
            .store
            .remove_member(&session.room, &session.username)
            .await
        {
            self.log_store_failure(&e, &session.room, &session.username, "failed to remove room member");
        }
    }

    /// Connectivity failures are expected while Redis is down and only
    /// warrant a warning; anything else points at bad data.
    fn log_store_failure(&self, e: &StoreError, room: &str, username: &str, what: &str) {
        if e.is_connectivity() {
            tracing::warn!(room = %room, username = %username, error = %e, "{what}");
        } else {
            tracing::error!(room = %room, username = %username, error = %e, "{what}");
        }
    }
}
