//! Live connection -> (username, room) bindings.

use dashmap::DashMap;

/// The identity a connection took on when it joined a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub room: String,
}

/// Table of sessions keyed by connection id.
///
/// Uses `DashMap` so operations on different connections only contend at
/// shard level, while operations on one id are linearizable.
pub struct SessionTable {
    sessions: DashMap<String, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Bind a connection, returning whatever session it replaced.
    pub fn bind(&self, connection_id: &str, username: &str, room: &str) -> Option<Session> {
        self.sessions.insert(
            connection_id.to_string(),
            Session {
                username: username.to_string(),
                room: room.to_string(),
            },
        )
    }

    pub fn lookup(&self, connection_id: &str) -> Option<Session> {
        self.sessions.get(connection_id).map(|s| s.clone())
    }

    /// Remove a connection's session. `None` if it never joined.
    pub fn unbind(&self, connection_id: &str) -> Option<Session> {
        self.sessions.remove(connection_id).map(|(_, s)| s)
    }

    /// Whether any live connection is bound to `username` in `room`.
    pub fn has_member(&self, room: &str, username: &str) -> bool {
        self.sessions
            .iter()
            .any(|s| s.room == room && s.username == username)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn bind_lookup_unbind() {
        let table = SessionTable::new();
        assert!(table.lookup("c1").is_none());

        assert!(table.bind("c1", "alice", "lobby").is_none());
        let s = table.lookup("c1").unwrap();
        assert_eq!(s.username, "alice");
        assert_eq!(s.room, "lobby");

        let removed = table.unbind("c1").unwrap();
        assert_eq!(removed, s);
        assert!(table.unbind("c1").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn rebind_returns_previous() {
        let table = SessionTable::new();
        table.bind("c1", "alice", "lobby");
        let prev = table.bind("c1", "alice", "tech").unwrap();
        assert_eq!(prev.room, "lobby");
        assert_eq!(table.lookup("c1").unwrap().room, "tech");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn duplicate_usernames_are_allowed() {
        let table = SessionTable::new();
        table.bind("c1", "alice", "lobby");
        table.bind("c2", "alice", "lobby");
        assert_eq!(table.len(), 2);
        assert!(table.has_member("lobby", "alice"));

        table.unbind("c1");
        assert!(table.has_member("lobby", "alice"));
        table.unbind("c2");
        assert!(!table.has_member("lobby", "alice"));
    }

    #[test]
    fn concurrent_binds_on_distinct_ids() {
        let table = Arc::new(SessionTable::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let id = format!("c{t}-{i}");
                        table.bind(&id, &format!("user{t}"), "lobby");
                        assert_eq!(table.lookup(&id).unwrap().username, format!("user{t}"));
                        if i % 2 == 0 {
                            assert!(table.unbind(&id).is_some());
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(table.len(), 8 * 50);
    }
}
