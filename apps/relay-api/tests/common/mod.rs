#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use relay_api::config::{Config, RoomSettings};
use relay_api::db::{HistoryStore, MemoryStore};
use relay_api::AppState;

/// Config that never touches the environment or a real Redis.
pub fn test_config() -> Config {
    Config {
        redis_url: "redis://127.0.0.1:1/0".to_string(),
        port: 0,
        store_timeout: Duration::from_millis(500),
        rooms: RoomSettings::default(),
    }
}

/// Build a test AppState on the given store.
pub fn test_state_with(store: Arc<dyn HistoryStore>) -> AppState {
    AppState::new(test_config(), store)
}

/// Build a test AppState with an in-memory store, returning the store too
/// so tests can inspect what was persisted.
pub fn test_state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (test_state_with(store.clone()), store)
}

/// Build the full application router wired to the test state.
pub fn test_app() -> (Router, AppState, Arc<MemoryStore>) {
    let (state, store) = test_state();
    let app = relay_api::routes::router().with_state(state.clone());
    (app, state, store)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background.
pub async fn start_server(state: AppState) -> SocketAddr {
    let app = relay_api::routes::router().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}
