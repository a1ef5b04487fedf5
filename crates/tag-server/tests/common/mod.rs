use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use tag_core::net::messages::{ClientMessage, ServerMessage};
use tag_core::net::protocol::{decode_server_message, encode_client_message};
use tag_core::player::{PlayerSnapshot, SessionId};

use tag_server::config::{GameConfig, ServerConfig};
use tag_server::state::AppState;
use tag_server::{build_app, spawn_buff_timer};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default config.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server whose buff timer fires every `interval_ms`.
    pub async fn with_spawn_interval(interval_ms: u64) -> Self {
        let config = ServerConfig {
            game: GameConfig {
                buff_spawn_interval_ms: interval_ms,
                ..GameConfig::default()
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);
        spawn_buff_timer(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _server: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.state.shutdown.cancel();
    }
}

/// A connected client after the server's join handshake.
pub struct Client {
    pub stream: WsStream,
    pub id: SessionId,
    pub roster: Vec<PlayerSnapshot>,
    pub tag_holder: SessionId,
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Connect and consume the RosterInit and TagAssigned every new session gets.
pub async fn join(server: &TestServer) -> Client {
    let mut stream = ws_connect(&server.ws_url()).await;

    let init = match ws_read_server_msg(&mut stream).await {
        ServerMessage::RosterInit(init) => init,
        other => panic!("Expected RosterInit, got: {other:?}"),
    };
    let tag_holder = match ws_read_server_msg(&mut stream).await {
        ServerMessage::TagAssigned(t) => t.session_id,
        other => panic!("Expected TagAssigned, got: {other:?}"),
    };

    Client {
        stream,
        id: init.self_id,
        roster: init.players,
        tag_holder,
    }
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Assert nothing arrives within `timeout_ms`.
pub async fn ws_expect_silence(stream: &mut WsStream, timeout_ms: u64) {
    if let Some(data) = ws_try_read_raw(stream, timeout_ms).await {
        panic!(
            "Expected no message, got: {:?}",
            decode_server_message(&data)
        );
    }
}

/// Send a ClientMessage from a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Send arbitrary bytes as a binary frame.
pub async fn ws_send_raw(stream: &mut WsStream, data: Vec<u8>) {
    stream.send(Message::Binary(data.into())).await.unwrap();
}
