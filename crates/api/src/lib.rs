pub mod error;
pub mod routes;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Uploads are validated against 25 MiB in the handler; the transport limit
/// sits above that so oversize files get a 400 rather than a 413.
pub const BODY_LIMIT_BYTES: usize = 30 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/analyze", post(routes::analyze::analyze))
        .route("/fetch-and-transcribe", post(routes::batch::fetch_and_transcribe))
        .route("/health", get(routes::health::health_check))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
