use crate::application::scheduler::{ScanStatus, SchedulerCommand};
use crate::application::signal_store::{SignalFilter, StoredSignal};
use crate::domain::signal::SignalDirection;
use crate::interfaces::http::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use super::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signals", get(list_signals))
        .route("/signals/search", get(search_signals))
        .route("/signals/{symbol}", get(get_signal))
        .route("/signals/{symbol}/favorite", post(toggle_favorite))
        .route("/stats", get(stats))
        .route("/rescan", post(rescan))
        .route("/alerts", get(list_alerts))
        .route("/alerts/{id}/read", post(mark_alert_read))
        .route("/alerts/price", get(list_price_watches).post(add_price_watch))
        .route("/alerts/price/{id}", axum::routing::delete(remove_price_watch))
}

// ── Query params ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignalsQuery {
    #[serde(rename = "minMatches")]
    min_matches: Option<usize>,
    direction: Option<String>,
    proximity: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    #[serde(default = "default_alert_limit")]
    limit: usize,
}

fn default_alert_limit() -> usize {
    50
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn list_signals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignalsQuery>,
) -> Result<Json<Vec<StoredSignal>>, ApiError> {
    let direction = match &query.direction {
        Some(raw) => Some(
            SignalDirection::from_str(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };

    let filter = SignalFilter {
        min_matches: query.min_matches,
        direction,
        structure: None,
        proximity_within: query.proximity,
    };

    Ok(Json(state.store.query(&filter).await))
}

async fn get_signal(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<StoredSignal>, ApiError> {
    let symbol = symbol.to_uppercase();
    state
        .store
        .get(&symbol)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no signal for {symbol}")))
}

async fn search_signals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<StoredSignal>>, ApiError> {
    if query.q.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    Ok(Json(state.store.search(&query.q, 20).await))
}

async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Json<Value> {
    let symbol = symbol.to_uppercase();
    let favorite = state.store.toggle_favorite(&symbol).await;
    Json(json!({ "symbol": symbol, "favorite": favorite }))
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    total: usize,
    upper: usize,
    lower: usize,
    favorites: usize,
    #[serde(rename = "lastScanTime")]
    last_scan_time: Option<DateTime<Utc>>,
    #[serde(rename = "nextScanInSeconds")]
    next_scan_in_seconds: i64,
    #[serde(rename = "lastScanDurationMs")]
    last_scan_duration_ms: Option<u64>,
    #[serde(rename = "signalsPublished")]
    signals_published: usize,
    #[serde(rename = "alertsDropped")]
    alerts_dropped: u64,
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let counts = state.store.counts().await;
    let status: ScanStatus = state.status.read().await.clone();

    Json(StatsResponse {
        total: counts.total,
        upper: counts.upper,
        lower: counts.lower,
        favorites: counts.favorites,
        last_scan_time: status.last_scan_time,
        next_scan_in_seconds: status.next_scan_in_seconds(),
        last_scan_duration_ms: status.last_scan_duration_ms,
        signals_published: status.signals_published,
        alerts_dropped: state.bus.overflow_total(),
    })
}

async fn rescan(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state
        .scheduler_tx
        .send(SchedulerCommand::Rescan)
        .await
        .map_err(|_| ApiError::Internal("scheduler is not running".to_string()))?;
    Ok(StatusCode::ACCEPTED)
}

async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> Json<Vec<crate::domain::alert::Alert>> {
    Json(state.bus.recent(query.limit).await)
}

async fn mark_alert_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("invalid alert id: {id}")))?;

    if state.bus.mark_read(id).await {
        Ok(Json(json!({ "id": id.to_string(), "read": true })))
    } else {
        Err(ApiError::NotFound(format!("no alert {id}")))
    }
}

#[derive(Debug, Deserialize)]
struct PriceWatchRequest {
    symbol: String,
    level: Decimal,
    direction: String,
}

async fn list_price_watches(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<crate::application::price_alerts::PriceWatch>> {
    Json(state.watches.list().await)
}

async fn add_price_watch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PriceWatchRequest>,
) -> Result<(StatusCode, Json<crate::application::price_alerts::PriceWatch>), ApiError> {
    use crate::application::price_alerts::WatchDirection;

    if body.level <= Decimal::ZERO {
        return Err(ApiError::BadRequest("level must be positive".to_string()));
    }
    let direction = WatchDirection::from_str(&body.direction)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let watch = state.watches.add(&body.symbol, body.level, direction).await;
    Ok((StatusCode::CREATED, Json(watch)))
}

async fn remove_price_watch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("invalid watch id: {id}")))?;

    if state.watches.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no price watch {id}")))
    }
}
