//! Read-only room listing.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::gateway::coordinator::RoomSummary;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/rooms", get(list_rooms))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListRoomsResponse {
    pub rooms: Vec<RoomSummary>,
    /// Present only when the store could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// GET /api/rooms
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/rooms",
    tag = "Rooms",
    responses(
        (status = 200, description = "Rooms with at least one member", body = ListRoomsResponse),
    ),
)]
pub async fn list_rooms(State(state): State<AppState>) -> Json<ListRoomsResponse> {
    match state.coordinator.try_list_active_rooms().await {
        Ok(rooms) => Json(ListRoomsResponse { rooms, error: None }),
        Err(e) => {
            tracing::warn!(?e, "room listing unavailable");
            Json(ListRoomsResponse {
                rooms: Vec::new(),
                error: Some("Room listing is unavailable".to_string()),
            })
        }
    }
}
