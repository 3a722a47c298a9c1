pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use config::Config;
use db::HistoryStore;
use gateway::coordinator::RoomCoordinator;
use gateway::dispatch::Dispatcher;
use gateway::fanout::ConnectionHub;
use gateway::session::SessionTable;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn HistoryStore>,
    pub hub: Arc<ConnectionHub>,
    pub coordinator: Arc<RoomCoordinator>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Wire the session table, hub, coordinator and dispatcher around a store.
    pub fn new(config: Config, store: Arc<dyn HistoryStore>) -> Self {
        let hub = Arc::new(ConnectionHub::new());
        let coordinator = Arc::new(RoomCoordinator::new(
            Arc::new(SessionTable::new()),
            hub.clone(),
            store.clone(),
            config.rooms,
        ));
        let dispatcher = Arc::new(Dispatcher::new(coordinator.clone()));

        Self {
            config: Arc::new(config),
            store,
            hub,
            coordinator,
            dispatcher,
        }
    }
}
