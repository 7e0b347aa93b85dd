use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Owns one subscriber connection: registers an outbound queue,
/// forwards queued events to the socket and waits for the peer to go
/// away. Inbound payloads are ignored; this is a push-only channel.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = Uuid::new_v4();
    info!(%id, "subscriber connected");

    let (tx, mut outbound) = mpsc::unbounded_channel::<String>();
    state.subscribers.add(id, tx);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(text) => {
                    if sink.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                // Queue dropped during shutdown; close the connection.
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%id, %e, "subscriber socket error");
                    break;
                }
            },
        }
    }

    state.subscribers.remove(&id);
    info!(%id, "subscriber disconnected");
}
