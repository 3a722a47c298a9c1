//! Behavior of the Redis history store against the dev Redis from `.env`.
//!
//! Each test works on rooms with a fresh ULID suffix so runs never clash.
//! When no Redis is reachable the tests log and return early.

use std::time::Duration;

use redis::AsyncCommands;
use relay_api::db::redis_store::{members_key, messages_key};
use relay_api::db::{HistoryStore, RedisStore};
use relay_common::id::prefixed_ulid;
use relay_common::Message;

fn redis_url() -> String {
    let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(env_path);
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Connect the store plus a raw connection for inspecting keys.
async fn connect() -> Option<(RedisStore, redis::aio::MultiplexedConnection)> {
    let url = redis_url();
    let store = match RedisStore::connect(&url, Duration::from_secs(2)).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("skipping: redis not reachable at {url}: {e}");
            return None;
        }
    };
    let raw = redis::Client::open(url.as_str())
        .expect("invalid REDIS_URL")
        .get_multiplexed_async_connection()
        .await
        .expect("raw redis connection");
    Some((store, raw))
}

fn test_room() -> String {
    prefixed_ulid("test")
}

async fn cleanup(raw: &mut redis::aio::MultiplexedConnection, room: &str) {
    let _: () = raw
        .del(vec![members_key(room), messages_key(room)])
        .await
        .expect("cleanup");
}

#[tokio::test]
async fn append_caps_list_and_refreshes_expiry() {
    let Some((store, mut raw)) = connect().await else {
        return;
    };
    let room = test_room();

    for i in 0..101 {
        let msg = Message::new("alice", &room, &format!("m{i}"));
        store.append_message(&room, &msg, 100, 86_400).await.unwrap();
    }

    let len: usize = raw.llen(messages_key(&room)).await.unwrap();
    assert_eq!(len, 100);

    let ttl: i64 = raw.ttl(messages_key(&room)).await.unwrap();
    assert!((86_390..=86_400).contains(&ttl), "ttl was {ttl}");

    let all = store.recent_messages(&room, 1000).await.unwrap();
    assert_eq!(all.len(), 100);
    assert_eq!(all[0].message, "m100");
    assert_eq!(all[99].message, "m1");
    assert!(all.iter().all(|m| m.message != "m0"));

    cleanup(&mut raw, &room).await;
}

#[tokio::test]
async fn recent_messages_are_newest_first_and_limited() {
    let Some((store, mut raw)) = connect().await else {
        return;
    };
    let room = test_room();

    for text in ["one", "two", "three"] {
        let msg = Message::new("bob", &room, text);
        store.append_message(&room, &msg, 100, 60).await.unwrap();
    }

    let texts: Vec<_> = store
        .recent_messages(&room, 2)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.message)
        .collect();
    assert_eq!(texts, vec!["three", "two"]);
    assert!(store.recent_messages(&room, 0).await.unwrap().is_empty());
    assert!(store.recent_messages(&test_room(), 10).await.unwrap().is_empty());

    cleanup(&mut raw, &room).await;
}

#[tokio::test]
async fn member_rooms_lists_only_non_empty_member_sets() {
    let Some((store, mut raw)) = connect().await else {
        return;
    };
    let active = test_room();
    let emptied = test_room();
    let history_only = test_room();

    store.add_member(&active, "alice").await.unwrap();
    store.add_member(&active, "bob").await.unwrap();
    store.add_member(&emptied, "carol").await.unwrap();
    store.remove_member(&emptied, "carol").await.unwrap();
    let msg = Message::new("dave", &history_only, "hello");
    store.append_message(&history_only, &msg, 100, 60).await.unwrap();

    let rooms = store.member_rooms().await.unwrap();
    assert!(rooms.contains(&active));
    assert!(!rooms.contains(&emptied));
    assert!(!rooms.contains(&history_only));

    let mut members = store.members(&active).await.unwrap();
    members.sort();
    assert_eq!(members, vec!["alice", "bob"]);

    for room in [&active, &emptied, &history_only] {
        cleanup(&mut raw, room).await;
    }
}

#[tokio::test]
async fn ping_succeeds() {
    let Some((store, _raw)) = connect().await else {
        return;
    };
    store.ping().await.unwrap();
}
