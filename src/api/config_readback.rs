use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::{not_found, AppState, ErrorResponse};
use crate::models::Route;
use crate::schedule::{build_schedules, IpcSchedule};

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigInfoResponse {
    pub agency_id: String,
    pub config_rev: i32,
    pub timezone: String,
    pub routes: usize,
    pub stops: usize,
    pub trips: usize,
    pub blocks: usize,
}

/// The configuration snapshot this core is running against
#[utoipa::path(
    get,
    path = "/api/config",
    responses(
        (status = 200, description = "Loaded configuration summary", body = ConfigInfoResponse)
    ),
    tag = "config"
)]
pub async fn get_config_info(State(state): State<AppState>) -> Json<ConfigInfoResponse> {
    let snapshot = state.ctx.snapshot();
    Json(ConfigInfoResponse {
        agency_id: state.ctx.agency_id().to_string(),
        config_rev: state.ctx.config_rev(),
        timezone: state.ctx.time().tz().to_string(),
        routes: snapshot.route_count(),
        stops: snapshot.stop_count(),
        trips: snapshot.trip_count(),
        blocks: snapshot.block_count(),
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteListResponse {
    pub routes: Vec<Route>,
}

/// All routes in the loaded configuration
#[utoipa::path(
    get,
    path = "/api/config/routes",
    responses(
        (status = 200, description = "Routes in the snapshot", body = RouteListResponse)
    ),
    tag = "config"
)]
pub async fn list_routes(State(state): State<AppState>) -> Json<RouteListResponse> {
    Json(RouteListResponse {
        routes: state
            .ctx
            .snapshot()
            .routes_sorted()
            .into_iter()
            .cloned()
            .collect(),
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScheduleListResponse {
    pub schedules: Vec<IpcSchedule>,
}

/// Schedules for a route, one per service/direction combination
#[utoipa::path(
    get,
    path = "/api/config/schedule/{route_id}",
    params(("route_id" = String, Path, description = "Route identifier")),
    responses(
        (status = 200, description = "Schedules built for the route", body = ScheduleListResponse),
        (status = 404, description = "Unknown route", body = ErrorResponse)
    ),
    tag = "config"
)]
pub async fn get_route_schedules(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
) -> Response {
    let snapshot = state.ctx.snapshot();
    let Some(route) = snapshot.route(&route_id) else {
        return not_found(format!("No route '{route_id}' in the loaded configuration"))
            .into_response();
    };

    let blocks = snapshot.blocks_for_route(&route_id);
    let schedules = build_schedules(route, &blocks);
    Json(ScheduleListResponse { schedules }).into_response()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_config_info))
        .route("/routes", get(list_routes))
        .route("/schedule/{route_id}", get(get_route_schedules))
        .with_state(state)
}
