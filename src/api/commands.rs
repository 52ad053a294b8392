use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{bad_request, internal_error, not_found, AppState, ErrorResponse};
use crate::models::AvlReport;

#[derive(Debug, Serialize, ToSchema)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
}

fn ok(message: impl Into<String>) -> Json<CommandResponse> {
    Json(CommandResponse {
        success: true,
        message: message.into(),
    })
}

/// Inject an AVL report for a vehicle
#[utoipa::path(
    post,
    path = "/api/commands/avl-report",
    request_body = AvlReport,
    responses(
        (status = 200, description = "Report accepted", body = CommandResponse),
        (status = 500, description = "Report could not be queued", body = ErrorResponse)
    ),
    tag = "commands"
)]
pub async fn submit_avl_report(
    State(state): State<AppState>,
    Json(report): Json<AvlReport>,
) -> Response {
    let vehicle_id = report.vehicle_id.clone();
    match state.ctx.process_avl_report(report).await {
        Ok(()) => ok(format!("Report for vehicle '{vehicle_id}' accepted")).into_response(),
        // Rejected-and-reported per queue policy; surfaced to the caller
        // rather than lost.
        Err(e) => internal_error(e).into_response(),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EnablePlaybackRequest {
    /// Epoch milliseconds the playback clock starts at.
    pub epoch_ms: i64,
}

/// Switch the core clock into playback mode (allowed once per process)
#[utoipa::path(
    post,
    path = "/api/commands/enable-playback",
    request_body = EnablePlaybackRequest,
    responses(
        (status = 200, description = "Playback enabled", body = CommandResponse),
        (status = 400, description = "Playback already enabled", body = ErrorResponse)
    ),
    tag = "commands"
)]
pub async fn enable_playback(
    State(state): State<AppState>,
    Json(request): Json<EnablePlaybackRequest>,
) -> Response {
    if state.ctx.clock().is_playback() {
        return bad_request("Playback mode is already enabled").into_response();
    }
    state.ctx.clock().enable_playback(request.epoch_ms);
    ok("Playback mode enabled").into_response()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetVehicleRequest {
    pub vehicle_id: String,
}

/// Drop a vehicle from the live cache
#[utoipa::path(
    post,
    path = "/api/commands/reset-vehicle",
    request_body = ResetVehicleRequest,
    responses(
        (status = 200, description = "Vehicle removed", body = CommandResponse),
        (status = 404, description = "Vehicle not tracked", body = ErrorResponse)
    ),
    tag = "commands"
)]
pub async fn reset_vehicle(
    State(state): State<AppState>,
    Json(request): Json<ResetVehicleRequest>,
) -> Response {
    let removed = state
        .ctx
        .vehicles()
        .write()
        .await
        .remove(&request.vehicle_id);
    match removed {
        Some(_) => (
            StatusCode::OK,
            ok(format!("Vehicle '{}' removed", request.vehicle_id)),
        )
            .into_response(),
        None => not_found(format!(
            "No vehicle '{}' is being tracked",
            request.vehicle_id
        ))
        .into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/avl-report", post(submit_avl_report))
        .route("/enable-playback", post(enable_playback))
        .route("/reset-vehicle", post(reset_vehicle))
        .with_state(state)
}
