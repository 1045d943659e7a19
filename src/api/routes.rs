//! API route definitions.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use super::state::AppState;
use super::ApiError;
use crate::detect::features::FeatureInput;
use crate::detect::idle::DailyAggregateInput;
use crate::detect::{DailyResult, DetectionResult};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/anomaly/detect", post(detect))
        .route("/anomaly/daily-report", post(daily_report))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "models_loaded": state.engine.store().is_loaded(),
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }
    }))
}

// Evaluation is synchronous and the first call may read artifacts from
// disk, so it runs on the blocking pool.

async fn detect(
    State(state): State<AppState>,
    body: Result<Json<FeatureInput>, JsonRejection>,
) -> Result<Json<DetectionResult>, ApiError> {
    let Json(input) = body?;
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.evaluate(&input)).await??;
    Ok(Json(result))
}

async fn daily_report(
    State(state): State<AppState>,
    body: Result<Json<DailyAggregateInput>, JsonRejection>,
) -> Result<Json<DailyResult>, ApiError> {
    let Json(input) = body?;
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.evaluate_daily(&input)).await??;
    Ok(Json(result))
}
