//! HTTP front end.

pub mod error;
pub mod handlers;
pub mod security;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::pipeline::Renderer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub renderer: Arc<Renderer>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(renderer: Renderer, config: ServerConfig) -> Self {
        Self {
            renderer: Arc::new(renderer),
            config: Arc::new(config),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_size;
    let static_dir = state.config.static_dir.clone();
    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(&static_dir))
        .route("/health", get(handlers::health))
        .route("/create", post(handlers::create))
        .route("/batch", post(handlers::batch))
        .route("/download/*path", get(handlers::download))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds to the configured address and serves until Ctrl+C.
pub async fn serve(state: AppState) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&state.config.output_dir).await?;
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        "Listening on http://{} (outputs in {})",
        addr,
        state.config.output_dir.display()
    );
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    }
}
