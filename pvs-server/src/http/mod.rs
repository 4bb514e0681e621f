//! Router assembly, grounded on `ferrex-server::main`'s route wiring.

mod info;
mod metrics;
mod preview;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(info::root))
        .route("/test/", get(info::test))
        .route("/metrics/", get(metrics::metrics))
        .route("/preview/*path", get(preview::get_preview))
        .route("/preview", post(preview::post_preview))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
