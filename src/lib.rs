//! HTTP gateway that turns a media URL into a downloaded, transcoded
//! audio or video payload by orchestrating an external yt-dlp compatible
//! binary. The binary crate wraps this library with a small process CLI.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// --- Modules ---
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod options;
pub mod reshape;
pub mod resolver;
pub mod ytdlp;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

/// Builds the application router: the two conversion routes, a bare-500
/// fallback for everything else, CORS and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/dl/mp3", get(handlers::dl_mp3))
        .route("/dl/mp4", get(handlers::dl_mp4))
        .fallback(handlers::fallback)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
