use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::{not_found, AppState, ErrorResponse};
use crate::cache::vehicles::VehicleState;

#[derive(Debug, Serialize, ToSchema)]
pub struct VehicleListResponse {
    pub vehicles: Vec<VehicleState>,
    pub total: usize,
    /// Core time the response was generated at, epoch milliseconds.
    pub generated_at_ms: i64,
}

/// All tracked vehicles and their latest positions
#[utoipa::path(
    get,
    path = "/api/vehicles",
    responses(
        (status = 200, description = "Latest position of every tracked vehicle", body = VehicleListResponse)
    ),
    tag = "vehicles"
)]
pub async fn list_vehicles(State(state): State<AppState>) -> Json<VehicleListResponse> {
    let cache = state.ctx.vehicles().read().await;
    let mut vehicles: Vec<VehicleState> = cache.values().cloned().collect();
    vehicles.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
    let total = vehicles.len();
    Json(VehicleListResponse {
        vehicles,
        total,
        generated_at_ms: state.ctx.clock().now_ms(),
    })
}

/// Latest position of one vehicle
#[utoipa::path(
    get,
    path = "/api/vehicles/{vehicle_id}",
    params(("vehicle_id" = String, Path, description = "Vehicle identifier")),
    responses(
        (status = 200, description = "Latest vehicle state", body = VehicleState),
        (status = 404, description = "Vehicle not tracked", body = ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
) -> Response {
    let cache = state.ctx.vehicles().read().await;
    match cache.get(&vehicle_id) {
        Some(vehicle) => (StatusCode::OK, Json(vehicle.clone())).into_response(),
        None => not_found(format!("No vehicle '{vehicle_id}' is being tracked")).into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_vehicles))
        .route("/{vehicle_id}", get(get_vehicle))
        .with_state(state)
}
