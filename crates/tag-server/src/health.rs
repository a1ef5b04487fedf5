use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use tag_core::powerup::BuffId;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub session: SessionInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
}

#[derive(Serialize)]
pub struct SessionInfo {
    pub players: usize,
    /// Session id of the current tag holder.
    pub tagged: Option<String>,
    pub active_buff: Option<BuffId>,
}

/// Returns server status, connection count and session summary as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ws = state.ws_connection_count.load(Ordering::Relaxed);

    let session = {
        let relay = state.relay.read().await;
        SessionInfo {
            players: relay.player_count(),
            tagged: relay.tag_holder().map(|id| id.to_string()),
            active_buff: relay.active_buff().map(|b| b.buff_id),
        }
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo { websocket: ws },
        session,
    })
}
