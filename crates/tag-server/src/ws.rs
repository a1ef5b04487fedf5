use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use tag_core::net::protocol::{MAX_MESSAGE_SIZE, decode_client_message};
use tag_core::player::SessionId;

use crate::rate_limit::InboundLimiter;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let max_ws = state.config.limits.max_ws_connections;
    let Some(guard) = ConnectionGuard::try_acquire(Arc::clone(&state.ws_connection_count), max_ws)
    else {
        tracing::warn!(max = max_ws, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, guard))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);

    // Queue the roster before the writer starts so it is the first frame out
    let session_id = {
        let mut relay = state.relay.write().await;
        relay.connect(tx, Instant::now())
    };

    let writer = spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, session_id).await;

    state.relay.write().await.disconnect(session_id);
    // Dropping the relay's sender ends the writer once its queue drains
    if let Err(e) = writer.await {
        tracing::debug!(session = %session_id, error = %e, "Writer task ended abnormally");
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    })
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    session_id: SessionId,
) {
    let mut limiter = InboundLimiter::new(&state.config.limits);
    let shutdown = state.shutdown.clone();

    loop {
        let msg = tokio::select! {
            () = shutdown.cancelled() => break,
            next = ws_receiver.next() => match next {
                Some(Ok(msg)) => msg,
                _ => break,
            },
        };

        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            Message::Text(_) => {
                tracing::debug!(session = %session_id, "Dropping text frame");
                continue;
            },
            _ => continue,
        };

        if let Err(class) = limiter.admit(&data) {
            tracing::warn!(session = %session_id, ?class, "Rate limited");
            continue;
        }

        if data.len() > MAX_MESSAGE_SIZE {
            tracing::debug!(session = %session_id, len = data.len(), "Dropping oversized frame");
            continue;
        }

        let client_msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(session = %session_id, error = %e, "Dropping malformed message");
                continue;
            },
        };

        state
            .relay
            .write()
            .await
            .handle_message(session_id, client_msg, Instant::now());
    }
}
