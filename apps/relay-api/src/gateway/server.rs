//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use relay_common::id::{prefix, prefixed_ulid};
use serde_json::Value;

use crate::AppState;

use super::dispatch::Dispatched;
use super::events::{ClientEvent, EventName, ServerEvent};

const INVALID_PAYLOAD: &str = "Invalid event payload";

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let connection_id = prefixed_ulid(prefix::CONNECTION);
    let (mut ws_tx, mut ws_rx) = socket.split();

    let hub = state.hub.clone();
    let dispatcher = state.dispatcher.clone();
    let mut outbox = hub.register(&connection_id);

    tracing::info!(connection_id = %connection_id, "client connected");
    dispatcher
        .dispatch(&connection_id, EventName::CONNECT, Value::Null)
        .await;

    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let event: ClientEvent = match serde_json::from_str(text.as_str()) {
                            Ok(ev) => ev,
                            Err(e) => {
                                tracing::debug!(connection_id = %connection_id, ?e, "unparsable frame");
                                hub.send_to(&connection_id, ServerEvent::error(INVALID_PAYLOAD));
                                continue;
                            }
                        };

                        if dispatcher
                            .dispatch_client(&connection_id, &event.event, event.data)
                            .await
                            == Dispatched::Unknown
                        {
                            tracing::debug!(connection_id = %connection_id, event = %event.event, "ignored event");
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Event queued for this connection.
            event = outbox.recv() => {
                match event {
                    Some(event) => {
                        if send_event(&mut ws_tx, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    dispatcher
        .dispatch(&connection_id, EventName::DISCONNECT, Value::Null)
        .await;
    hub.unregister(&connection_id);

    tracing::info!(connection_id = %connection_id, "client disconnected");
}

/// Serialize and send one event frame.
async fn send_event(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    event: &Arc<ServerEvent>,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(event.as_ref()) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(?e, event = %event.event, "failed to encode event");
            return Ok(());
        }
    };
    ws_tx.send(Message::Text(json.into())).await
}
