use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use server::config::ServerConfig;
use server::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting pitch editor server...");

    // Load configuration from environment
    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: port={}, canvas_height={}, max_sessions={}, max_document_bytes={}",
        config.port, config.canvas_height, config.max_sessions, config.max_document_bytes
    );

    let state = AppState::new(config.clone());
    let app = build_app(state)?;

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT."))?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
