//! Read-only channel catalog API.

pub mod api;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::WebState;

/// Build the API router.
pub fn router(web_state: Arc<WebState>) -> Router {
    Router::new()
        .route("/api/channels", get(api::get_channels))
        .route("/api/channels/update", post(api::trigger_update))
        .route("/api/channels/:display_channel_id", get(api::get_channel))
        .with_state(web_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the web API server.
pub async fn start_web_server(
    listen_addr: SocketAddr,
    web_state: WebState,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(Arc::new(web_state));

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    log::info!("Web API listening on http://{}", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
