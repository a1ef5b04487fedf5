use tracing_subscriber::EnvFilter;

use tag_server::config::ServerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    let listen_addr = config.listen_addr.clone();
    let (app, state) = tag_server::build_app(config);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %listen_addr, "Failed to bind: {e}");
            std::process::exit(1);
        },
    };
    tracing::info!(addr = %listen_addr, "Tag server listening");

    let timer = tag_server::spawn_buff_timer(state.clone());

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        tracing::info!("Shutdown requested");
        shutdown.cancel();
    });

    let server_shutdown = state.shutdown.clone();
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await
    {
        tracing::error!("Server error: {e}");
    }

    state.shutdown.cancel();
    if let Err(e) = timer.await {
        tracing::warn!("Buff timer task failed: {e}");
    }
    tracing::info!("Tag server stopped");
}
