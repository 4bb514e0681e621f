//! Process-wide shared state, grounded on `ferrex-server`'s `AppState`
//! pattern: everything here is built once at startup and handed to every
//! handler behind an `Arc` clone.

use std::sync::Arc;

use pvs_config::Config;
use pvs_core::coordinator::Coordinator;
use pvs_core::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub coordinator: Arc<Coordinator>,
    pub http_client: reqwest::Client,
    pub metrics: Metrics,
}
