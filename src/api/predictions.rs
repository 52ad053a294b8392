use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::cache::vehicles::Prediction;

#[derive(Debug, Serialize, ToSchema)]
pub struct PredictionListResponse {
    pub predictions: Vec<Prediction>,
    /// Core time the response was generated at, epoch milliseconds.
    pub generated_at_ms: i64,
}

/// Predictions for all stops a vehicle is expected at
#[utoipa::path(
    get,
    path = "/api/predictions/by-vehicle/{vehicle_id}",
    params(("vehicle_id" = String, Path, description = "Vehicle identifier")),
    responses(
        (status = 200, description = "Predictions for the vehicle", body = PredictionListResponse)
    ),
    tag = "predictions"
)]
pub async fn predictions_by_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
) -> Json<PredictionListResponse> {
    let predictions = state.ctx.predictions().read().await;
    let matching: Vec<Prediction> = predictions
        .values()
        .flatten()
        .filter(|p| p.vehicle_id == vehicle_id)
        .cloned()
        .collect();
    Json(PredictionListResponse {
        predictions: matching,
        generated_at_ms: state.ctx.clock().now_ms(),
    })
}

/// Predictions for vehicles arriving at a stop, soonest first
#[utoipa::path(
    get,
    path = "/api/predictions/by-stop/{stop_id}",
    params(("stop_id" = String, Path, description = "Stop identifier")),
    responses(
        (status = 200, description = "Predictions for the stop", body = PredictionListResponse)
    ),
    tag = "predictions"
)]
pub async fn predictions_by_stop(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
) -> Json<PredictionListResponse> {
    let predictions = state.ctx.predictions().read().await;
    let mut matching = predictions.get(&stop_id).cloned().unwrap_or_default();
    matching.sort_by_key(|p| p.predicted_time_ms);
    Json(PredictionListResponse {
        predictions: matching,
        generated_at_ms: state.ctx.clock().now_ms(),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/by-vehicle/{vehicle_id}", get(predictions_by_vehicle))
        .route("/by-stop/{stop_id}", get(predictions_by_stop))
        .with_state(state)
}
