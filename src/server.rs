//! ==============================================================================
//! server.rs - http api and dashboard
//! ==============================================================================
//!
//! routes:
//!     POST /update              - esp32 pushes a reading (replaces the last one)
//!     GET  /latest              - last stored reading
//!     GET  /predict/:interval   - constant-factor projection (6hr | 12hr)
//!     GET  /                    - static dashboard
//!
//! every breach found on /update or /predict is handed to the alert
//! forwarder's background task. the response never waits on delivery and
//! delivery errors never reach the client. /update stores the reading
//! before dispatching.
//!
//! ==============================================================================

use std::any::Any;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::alerts::AlertKind;
use crate::error::{AppError, AppResult};
use crate::ingest::parse_update;
use crate::projection::{self, Horizon, Projection};
use crate::ranges;
use crate::state::AppState;

const DASHBOARD_HTML: &str = include_str!("../static/index.html");

/// Builds the full router with middleware.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/update", post(update_handler))
        .route("/latest", get(latest_handler))
        .route("/predict/:interval", get(predict_handler))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn dashboard_handler() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

/// POST /update
///
/// body is read raw so malformed json gets our own 400 instead of axum's
/// extractor rejection.
async fn update_handler(State(state): State<AppState>, body: Bytes) -> AppResult<Json<Value>> {
    let reading = parse_update(&body, &chrono::Local::now())?;
    tracing::debug!(values = ?reading.values, "[UPDATE] received");

    state.replace(reading.clone()).await;

    let breaches = ranges::check(reading.parameter_values());
    state.alerts.dispatch(breaches, AlertKind::RealTime);

    Ok(Json(json!({
        "message": "Data received",
        "data": reading,
    })))
}

/// GET /latest
async fn latest_handler(State(state): State<AppState>) -> Response {
    match state.latest().await {
        Some(reading) => Json(reading).into_response(),
        None => Json(json!({"message": "No data available"})).into_response(),
    }
}

/// GET /predict/:interval
async fn predict_handler(
    State(state): State<AppState>,
    Path(interval): Path<String>,
) -> AppResult<Json<Projection>> {
    let horizon: Horizon = interval
        .parse()
        .map_err(|_| AppError::InvalidInterval(interval.clone()))?;

    let reading = state.latest().await.ok_or(AppError::NoData)?;
    let projection = projection::project(&reading, horizon);

    let breaches = ranges::check(projection.parameter_values());
    state.alerts.dispatch(breaches, AlertKind::Prediction(horizon));

    Ok(Json(projection))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    AppError::Internal(detail).into_response()
}
