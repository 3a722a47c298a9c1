use std::collections::{BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_common::Message;

use crate::error::StoreError;

/// Durable room membership and message history.
///
/// Backed by Redis in production and an in-memory map in tests. History is
/// kept newest-first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Add `username` to the room's member set.
    async fn add_member(&self, room: &str, username: &str) -> Result<(), StoreError>;

    /// Remove `username` from the room's member set.
    async fn remove_member(&self, room: &str, username: &str) -> Result<(), StoreError>;

    /// Current members of a room, in no particular order.
    async fn members(&self, room: &str) -> Result<Vec<String>, StoreError>;

    /// Names of every room that currently has a member set.
    async fn member_rooms(&self) -> Result<Vec<String>, StoreError>;

    /// Prepend a message, trim the list to `cap` entries and refresh the
    /// key's expiry to `ttl_secs`, as one operation.
    async fn append_message(
        &self,
        room: &str,
        message: &Message,
        cap: usize,
        ttl_secs: u64,
    ) -> Result<(), StoreError>;

    /// Up to `limit` messages, newest first.
    async fn recent_messages(&self, room: &str, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Decode raw stored entries, dropping any that no longer parse.
pub(crate) fn decode_entries<I, S>(room: &str, raw: I) -> Vec<Message>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|entry| match Message::from_json(entry.as_ref()) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::warn!(room = %room, ?e, "skipping corrupt history entry");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// In-memory implementation (for tests / running without Redis)
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    members: HashMap<String, BTreeSet<String>>,
    messages: HashMap<String, VecDeque<String>>,
    expiries: HashMap<String, u64>,
}

pub struct MemoryStore {
    data: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(MemoryState::default()),
        }
    }

    /// Last expiry set on a room's history, if any.
    pub fn history_ttl(&self, room: &str) -> Option<u64> {
        self.data.lock().expiries.get(room).copied()
    }

    /// Number of history entries retained for a room.
    pub fn history_len(&self, room: &str) -> usize {
        self.data.lock().messages.get(room).map_or(0, VecDeque::len)
    }

    /// Push a raw entry onto a room's history without validation.
    pub fn push_raw(&self, room: &str, raw: &str) {
        self.data
            .lock()
            .messages
            .entry(room.to_string())
            .or_default()
            .push_front(raw.to_string());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn add_member(&self, room: &str, username: &str) -> Result<(), StoreError> {
        self.data
            .lock()
            .members
            .entry(room.to_string())
            .or_default()
            .insert(username.to_string());
        Ok(())
    }

    async fn remove_member(&self, room: &str, username: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        if let Some(set) = data.members.get_mut(room) {
            set.remove(username);
            // Redis drops empty sets; mirror that.
            if set.is_empty() {
                data.members.remove(room);
            }
        }
        Ok(())
    }

    async fn members(&self, room: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .data
            .lock()
            .members
            .get(room)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn member_rooms(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.data.lock().members.keys().cloned().collect())
    }

    async fn append_message(
        &self,
        room: &str,
        message: &Message,
        cap: usize,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let payload = message.to_json()?;
        let mut data = self.data.lock();
        let list = data.messages.entry(room.to_string()).or_default();
        list.push_front(payload);
        list.truncate(cap);
        data.expiries.insert(room.to_string(), ttl_secs);
        Ok(())
    }

    async fn recent_messages(&self, room: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
        let raw: Vec<String> = self
            .data
            .lock()
            .messages
            .get(room)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default();
        Ok(decode_entries(room, raw))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stand-in used when the real store could not be reached at startup
// ---------------------------------------------------------------------------

/// A store that fails every call with [`StoreError::Unavailable`].
///
/// Lets the relay keep serving chat with no history or durable membership.
pub struct UnavailableStore;

#[async_trait]
impl HistoryStore for UnavailableStore {
    async fn add_member(&self, _room: &str, _username: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn remove_member(&self, _room: &str, _username: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn members(&self, _room: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn member_rooms(&self) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn append_message(
        &self,
        _room: &str,
        _message: &Message,
        _cap: usize,
        _ttl_secs: u64,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn recent_messages(&self, _room: &str, _limit: usize) -> Result<Vec<Message>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_caps_and_orders_newest_first() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let msg = Message::new("alice", "lobby", format!("m{i}"));
            store.append_message("lobby", &msg, 3, 60).await.unwrap();
        }

        assert_eq!(store.history_len("lobby"), 3);
        assert_eq!(store.history_ttl("lobby"), Some(60));

        let recent = store.recent_messages("lobby", 10).await.unwrap();
        let texts: Vec<_> = recent.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["m4", "m3", "m2"]);

        let limited = store.recent_messages("lobby", 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].message, "m4");
    }

    #[tokio::test]
    async fn empty_member_set_disappears() {
        let store = MemoryStore::new();
        store.add_member("lobby", "alice").await.unwrap();
        store.add_member("lobby", "alice").await.unwrap();
        store.add_member("lobby", "bob").await.unwrap();

        let mut members = store.members("lobby").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["alice", "bob"]);

        store.remove_member("lobby", "alice").await.unwrap();
        store.remove_member("lobby", "bob").await.unwrap();
        assert!(store.members("lobby").await.unwrap().is_empty());
        assert!(store.member_rooms().await.unwrap().is_empty());

        // Removing from a room that never existed is fine.
        store.remove_member("nowhere", "carol").await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_entries_are_skipped() {
        let store = MemoryStore::new();
        let good = Message::new("alice", "lobby", "ok");
        store.append_message("lobby", &good, 100, 60).await.unwrap();
        store.push_raw("lobby", "{not json");

        let recent = store.recent_messages("lobby", 50).await.unwrap();
        assert_eq!(recent, vec![good]);
    }

    #[tokio::test]
    async fn unavailable_store_fails_everything() {
        let store = UnavailableStore;
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable)));
        assert!(store.add_member("r", "u").await.is_err());
        assert!(store.recent_messages("r", 1).await.is_err());
        assert!(store.member_rooms().await.is_err());
    }
}
