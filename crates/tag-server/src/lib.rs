pub mod buffs;
pub mod config;
pub mod health;
pub mod rate_limit;
pub mod registry;
pub mod relay;
pub mod roster;
pub mod state;
pub mod tag;
pub mod ws;

use axum::Router;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::services::ServeDir;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);
    (router(state.clone()), state)
}

/// Build the router around an existing state.
pub fn router(state: AppState) -> Router<()> {
    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check));

    let app = match &state.config.web_root {
        Some(root) => app.fallback_service(ServeDir::new(root)),
        None => app,
    };

    app.with_state(state)
}

/// Background task that runs buff spawn cycles. Idle until spawn locations
/// are registered, then spawns immediately and once per interval until
/// shutdown.
pub fn spawn_buff_timer(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ready = state.relay.read().await.spawn_ready();
        loop {
            if *ready.borrow_and_update() {
                break;
            }
            tokio::select! {
                () = state.shutdown.cancelled() => return,
                changed = ready.changed() => {
                    if changed.is_err() {
                        return;
                    }
                },
            }
        }

        let period = state.config.game.buff_spawn_interval();
        tracing::info!(interval_ms = period.as_millis() as u64, "Buff spawn timer started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = state.shutdown.cancelled() => break,
                _ = interval.tick() => {
                    state.relay.write().await.spawn_tick();
                },
            }
        }
        tracing::info!("Buff spawn timer stopped");
    })
}
