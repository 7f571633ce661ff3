use crate::state::{AppState, WsMessage};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| stream_session(socket, state))
}

/// Current snapshot first, then every reset and step until either side hangs up.
async fn stream_session(mut socket: WebSocket, state: Arc<AppState>) {
    let mut events = state.ws_tx.subscribe();

    let current = WsMessage::SessionState {
        state: state.snapshot_rx.borrow().clone(),
    };
    if send_json(&mut socket, &current).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(msg) => {
                    if send_json(&mut socket, &msg).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "ws client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            // client frames are only read to notice a disconnect
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send_json(socket: &mut WebSocket, msg: &WsMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::warn!(error = %e, "ws message serialization failed");
            Ok(())
        }
    }
}
