//! Redis-backed [`HistoryStore`].
//!
//! Key layout per room:
//! - `room:{room}:users`    set of member usernames
//! - `room:{room}:messages` list of JSON messages, newest first

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use relay_common::Message;

use super::store::{decode_entries, HistoryStore};
use crate::error::StoreError;

const KEY_PREFIX: &str = "room:";
const MEMBERS_SUFFIX: &str = ":users";
const MESSAGES_SUFFIX: &str = ":messages";

pub fn members_key(room: &str) -> String {
    format!("{KEY_PREFIX}{room}{MEMBERS_SUFFIX}")
}

pub fn messages_key(room: &str) -> String {
    format!("{KEY_PREFIX}{room}{MESSAGES_SUFFIX}")
}

/// Recover the room name from a member-set key.
pub fn room_from_members_key(key: &str) -> Option<&str> {
    key.strip_prefix(KEY_PREFIX)?
        .strip_suffix(MEMBERS_SUFFIX)
        .filter(|room| !room.is_empty())
}

pub struct RedisStore {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisStore {
    /// Open a managed connection. Fails if Redis is not reachable within
    /// `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(timeout))??;

        let store = Self { conn, timeout };
        store.ping().await?;
        Ok(store)
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl HistoryStore for RedisStore {
    async fn add_member(&self, room: &str, username: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = members_key(room);
        self.bounded(async move { conn.sadd::<_, _, ()>(key, username).await })
            .await
    }

    async fn remove_member(&self, room: &str, username: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = members_key(room);
        self.bounded(async move { conn.srem::<_, _, ()>(key, username).await })
            .await
    }

    async fn members(&self, room: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let key = members_key(room);
        self.bounded(async move { conn.smembers::<_, Vec<String>>(key).await })
            .await
    }

    async fn member_rooms(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{KEY_PREFIX}*{MEMBERS_SUFFIX}");
        let keys = self
            .bounded(async move {
                let mut iter = conn.scan_match::<_, String>(pattern).await?;
                let mut keys = Vec::new();
                while let Some(key) = iter.next_item().await {
                    keys.push(key);
                }
                Ok::<_, redis::RedisError>(keys)
            })
            .await?;

        Ok(keys
            .iter()
            .filter_map(|key| room_from_members_key(key))
            .map(str::to_string)
            .collect())
    }

    async fn append_message(
        &self,
        room: &str,
        message: &Message,
        cap: usize,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let payload = message.to_json()?;
        let key = messages_key(room);
        let stop = cap.saturating_sub(1) as isize;
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);

        let mut conn = self.conn.clone();
        self.bounded(async move {
            let _: () = redis::pipe()
                .atomic()
                .lpush(&key, payload)
                .ignore()
                .ltrim(&key, 0, stop)
                .ignore()
                .expire(&key, ttl)
                .ignore()
                .query_async(&mut conn)
                .await?;
            Ok::<_, redis::RedisError>(())
        })
        .await
    }

    async fn recent_messages(&self, room: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let key = messages_key(room);
        let stop = (limit - 1) as isize;
        let raw = self
            .bounded(async move { conn.lrange::<_, Vec<String>>(key, 0, stop).await })
            .await?;
        Ok(decode_entries(room, raw))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(members_key("lobby"), "room:lobby:users");
        assert_eq!(messages_key("lobby"), "room:lobby:messages");
    }

    #[test]
    fn room_name_roundtrips_through_members_key() {
        assert_eq!(room_from_members_key("room:lobby:users"), Some("lobby"));
        assert_eq!(room_from_members_key("room:a:b:users"), Some("a:b"));
        assert_eq!(room_from_members_key("room::users"), None);
        assert_eq!(room_from_members_key("room:lobby:messages"), None);
        assert_eq!(room_from_members_key("other:lobby:users"), None);
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let result = RedisStore::connect("redis://127.0.0.1:1/0", Duration::from_millis(500)).await;
        assert!(result.is_err());
    }
}
