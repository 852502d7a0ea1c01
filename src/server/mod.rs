use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod events;
pub mod handlers;
pub mod state;

pub use self::state::AppState;
use handlers::{
    get_settings, get_view, open_entry, set_region, tap_map, tap_marker, view_events_stream,
};

// Create the main application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/view", get(get_view))
        .route("/api/events", get(view_events_stream))
        .route("/api/region", post(set_region))
        .route("/api/tap/marker", post(tap_marker))
        .route("/api/tap/map", post(tap_map))
        .route("/api/entries/open", post(open_entry))
        .route("/api/settings", get(get_settings))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

pub async fn start_server(
    state: AppState,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = create_app(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("✅ Surface bridge listening at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
