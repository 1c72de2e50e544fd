//! WebSocket upgrade handler and per-connection read loop.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;

use timetable_common::id::{prefix, prefixed_ulid};

use crate::AppState;

use super::events::{ServerMessage, PING};
use super::registry::{Connection, ConnectionError};

/// Normal closure (RFC 6455).
const CLOSE_NORMAL: u16 = 1000;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/schedule", get(ws_upgrade))
}

/// Server side of one subscriber socket. Only the write half lives here;
/// the read half stays with the connection task.
struct WsConnection {
    id: String,
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_text(&self, text: &str) -> Result<(), ConnectionError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }
}

impl WsConnection {
    async fn close(&self) {
        let frame = Message::Close(Some(CloseFrame {
            code: CLOSE_NORMAL,
            reason: "".into(),
        }));
        let _ = self.sink.lock().await.send(frame).await;
    }
}

#[utoipa::path(
    get,
    path = "/ws/schedule",
    tag = "Live updates",
    responses(
        (status = 101, description = "Switching to the live timetable WebSocket"),
    )
)]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (ws_tx, mut ws_rx) = socket.split();
    let ws_conn = Arc::new(WsConnection {
        id: prefixed_ulid(prefix::CONNECTION),
        sink: Mutex::new(ws_tx),
    });
    let conn: Arc<dyn Connection> = ws_conn.clone();

    let broadcaster = &state.broadcaster;
    let registry = broadcaster.registry();
    registry.register(conn.clone());

    let welcome = ServerMessage::connected(registry.count());
    if !broadcaster.send_direct(&welcome, &conn).await {
        return;
    }

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if text.as_str() == PING {
                    if !broadcaster.send_direct(&ServerMessage::Pong, &conn).await {
                        break;
                    }
                } else {
                    tracing::debug!(connection_id = %conn.id(), "ignoring client text frame");
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(?e, connection_id = %conn.id(), "ws read error");
                break;
            }
        }
    }

    registry.unregister(conn.id());
    ws_conn.close().await;
}
