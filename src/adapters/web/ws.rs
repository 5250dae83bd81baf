//! Push channel over websocket.
//!
//! Server-to-client only: inbound frames other than close are ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::services::app::App;
use crate::services::push::PushMessage;

pub async fn websocket_handler(ws: WebSocketUpgrade, State(app): State<Arc<App>>) -> Response {
    ws.on_upgrade(|socket| websocket_connection(socket, app))
}

async fn websocket_connection(mut socket: WebSocket, app: Arc<App>) {
    let subscription = app.registry.add();
    let id = subscription.id();
    info!(subscriber = id, "websocket connected");

    let snapshot = PushMessage::MarketUpdate {
        markets: app.snapshot.markets().await,
        timestamp: Utc::now(),
    };
    let greeted = match serde_json::to_string(&snapshot) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => true,
    };

    if greeted {
        loop {
            tokio::select! {
                outbound = subscription.recv() => {
                    let Some(payload) = outbound else { break };
                    if socket.send(Message::Text(payload.as_ref().into())).await.is_err() {
                        break;
                    }
                }
                inbound = socket.recv() => {
                    match inbound {
                        Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                        _ => {}
                    }
                }
            }
        }
    }

    app.registry.remove(id);
    debug!(
        subscriber = id,
        dropped = subscription.dropped(),
        "websocket closed"
    );
}
