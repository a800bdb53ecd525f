pub mod error;
pub mod routes;
pub mod stream;

use crate::application::alerts::AlertBus;
use crate::application::price_alerts::PriceWatchRegistry;
use crate::application::scheduler::{ScanStatus, SchedulerCommand};
use crate::application::signal_store::SignalStore;
use axum::Router;
use axum::routing::get;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::mpsc::Sender;
use tower_http::cors::CorsLayer;

/// Shared read-side state for HTTP handlers. Handlers only read the signal
/// store and the bus; analyzers are never reachable from here.
pub struct AppState {
    pub store: Arc<SignalStore>,
    pub bus: Arc<AlertBus>,
    pub status: Arc<RwLock<ScanStatus>>,
    pub scheduler_tx: Sender<SchedulerCommand>,
    pub watches: Arc<PriceWatchRegistry>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::api_router())
        .route("/alerts/stream", get(stream::alerts_stream))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(json!({ "status": "ok" }))
}
