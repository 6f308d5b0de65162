//! WebSocket subscription endpoint.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use redub_core::error::AppError;
use redub_realtime::InboundMessage;

use crate::state::AppState;

/// Query parameter for WebSocket authentication.
#[derive(Debug, serde::Deserialize)]
pub struct WsQuery {
    /// Bearer token.
    pub token: String,
}

/// GET /ws?token={jwt} — WebSocket upgrade
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
) -> Result<Response, AppError> {
    // Authenticate before upgrading.
    state.session_manager.authenticate(&query.token).await?;
    Ok(ws.on_upgrade(move |socket| handle_connection(state, socket)))
}

/// Drives one established WebSocket connection.
async fn handle_connection(state: AppState, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (handle, mut rx) = state.gateway.register();
    let client_id = handle.id;

    info!(client_id = %client_id, "WebSocket connection established");

    // Outbound forwarder: gateway channel -> socket.
    let outbound_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to serialize outbound message");
                }
            }
        }
    });

    // Inbound loop: subscribe/unsubscribe requests.
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<InboundMessage>(&text) {
                Ok(InboundMessage::Subscribe { job_ids }) => {
                    state.gateway.subscribe(client_id, &job_ids);
                }
                Ok(InboundMessage::Unsubscribe { job_ids }) => {
                    state.gateway.unsubscribe(client_id, &job_ids);
                }
                Err(e) => {
                    debug!(client_id = %client_id, error = %e, "Unparseable client message");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    outbound_task.abort();
    state.gateway.unregister(client_id);
    info!(client_id = %client_id, "WebSocket connection closed");
}
