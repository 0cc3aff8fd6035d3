//! HTTP server setup and routing
//!
//! Sets up the axum router for player control, transcript and SSE.

use crate::error::{Error, Result};
use crate::playback::PlayerHandle;
use crate::visibility::ManualVisibility;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub player: PlayerHandle,
    /// Visibility source the player subscribed to; fed by `POST /visibility`
    pub visibility: Arc<ManualVisibility>,
}

/// Build the router with all routes
pub fn router(ctx: AppContext) -> Router {
    use super::{handlers, sse};

    Router::new()
        .route("/health", get(handlers::health))
        // Playback control
        .route("/playback/play", post(handlers::play))
        .route("/playback/pause", post(handlers::pause))
        .route("/playback/toggle", post(handlers::toggle))
        .route("/playback/click", post(handlers::click))
        .route("/playback/restart", post(handlers::restart))
        .route("/playback/activate", post(handlers::activate))
        .route("/playback/seek", post(handlers::seek))
        .route("/playback/state", get(handlers::get_state))
        .route("/playback/position", get(handlers::get_position))
        // Transcript and host signals
        .route("/transcript", get(handlers::get_transcript))
        .route("/visibility", post(handlers::set_visibility))
        // SSE event stream
        .route("/events", get(sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run(
    port: u16,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
