pub mod health;
pub mod rooms;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest("/api", rooms::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::index,
        health::health,
        // Rooms
        rooms::list_rooms,
    ),
    components(
        schemas(
            health::IndexResponse,
            health::HealthResponse,
            rooms::ListRoomsResponse,
            crate::gateway::coordinator::RoomSummary,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Rooms", description = "Active chat rooms"),
    )
)]
pub struct ApiDoc;
