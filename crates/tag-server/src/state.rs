use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::relay::SessionRelay;

pub type SharedRelay = Arc<RwLock<SessionRelay>>;

#[derive(Clone)]
pub struct AppState {
    pub relay: SharedRelay,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub config: Arc<ServerConfig>,
    /// Cancelled on shutdown; stops the spawn timer and the HTTP server.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let relay = SessionRelay::new(&config.game);
        Self::with_relay(config, relay)
    }

    pub fn with_relay(config: ServerConfig, relay: SessionRelay) -> Self {
        Self {
            relay: Arc::new(RwLock::new(relay)),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Holds one slot of the global WebSocket connection count; released on drop.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    /// Take a slot unless `max` connections are already open.
    pub fn try_acquire(count: Arc<AtomicUsize>, max: usize) -> Option<Self> {
        count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()
            .map(|_| Self { count })
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}
