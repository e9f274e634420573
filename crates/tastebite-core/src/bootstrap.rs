use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::{app_state::AppState, config};

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

pub fn init_env() {
    dotenvy::dotenv().ok();
}

/// Builds shared state, binds the listener and serves the app until shutdown.
pub async fn bootstrap(service_name: &str, app: Router<AppState>) -> Result<()> {
    let config = config::load()?;
    let state = AppState::new(&config).await?;
    let app = app.with_state(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("{service_name} listening on {addr}");
    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")?;
    Ok(())
}
