pub mod error;
pub mod frontend;
pub mod manifest;
pub mod push;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// HTTP routes. No CORS headers are sent: the UI is served from this origin,
/// and other sites must not be able to read project files.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(frontend::index_handler))
        .route("/build/{*path}", get(frontend::build_asset_handler))
        .nest("/api", routes::api_router())
        .fallback(frontend::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the HTTP API on `http_addr` and the push channel on `push_addr`
/// until either listener fails.
pub async fn serve(state: AppState, http_addr: SocketAddr, push_addr: SocketAddr) -> Result<()> {
    let push = push::push_router(state.bus.clone());
    let app = create_router(state);

    let http_listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind {http_addr}"))?;
    let push_listener = tokio::net::TcpListener::bind(push_addr)
        .await
        .with_context(|| format!("failed to bind {push_addr}"))?;

    tracing::info!("Server running at http://{}", http_listener.local_addr()?);
    tracing::info!("WebSocket server running at ws://{}", push_listener.local_addr()?);

    tokio::try_join!(
        async { axum::serve(http_listener, app).await.context("HTTP server stopped") },
        async { axum::serve(push_listener, push).await.context("push server stopped") },
    )?;
    Ok(())
}
