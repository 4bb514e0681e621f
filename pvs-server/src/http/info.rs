//! `GET /` and `GET /test/`, grounded on `preview/__init__.py`'s
//! informational root handler and smoke-test route.

use axum::extract::State;
use axum::response::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "service": "preview-service",
        "default_format": state.config.default_format,
        "default_width": state.config.default_width,
        "default_height": state.config.default_height,
        "store_enabled": state.config.store_root.is_some(),
        "metrics_enabled": state.metrics.enabled(),
    }))
}

/// A cheap liveness check distinct from `/`: confirms the process can
/// still reach its own configuration and worker pools without touching
/// any backend or the store.
pub async fn test(State(_state): State<AppState>) -> &'static str {
    "ok"
}
