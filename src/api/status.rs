use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::core::time::TimeHelper;
use crate::persist::QueueStats;

#[derive(Debug, Serialize, ToSchema)]
pub struct ServerStatusResponse {
    pub agency_id: String,
    pub config_rev: i32,
    pub server_version: String,
    pub uptime_secs: u64,
    /// "live" or "playback"
    pub clock_mode: String,
    /// Current core time, epoch milliseconds.
    pub clock_now_ms: i64,
    /// Current core time rendered in the agency timezone.
    pub local_time: String,
    /// Time into the current service day, HH:MM:SS in the agency timezone.
    pub service_time: String,
    pub data_log: QueueStats,
    pub tracked_vehicles: usize,
    pub stale_vehicles: usize,
    pub trip_history_events: usize,
    pub stop_event_entries: usize,
}

/// Server status: uptime, clock mode, queue and cache statistics
#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Current server status", body = ServerStatusResponse)
    ),
    tag = "status"
)]
pub async fn get_status(State(state): State<AppState>) -> Json<ServerStatusResponse> {
    let ctx = &state.ctx;
    let tracked_vehicles = ctx.vehicles().read().await.len();
    Json(ServerStatusResponse {
        agency_id: ctx.agency_id().to_string(),
        config_rev: ctx.config_rev(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: ctx.uptime_secs(),
        clock_mode: if ctx.clock().is_playback() {
            "playback".to_string()
        } else {
            "live".to_string()
        },
        clock_now_ms: ctx.clock().now_ms(),
        local_time: ctx.time().local(ctx.clock().now_ms()).to_rfc3339(),
        service_time: TimeHelper::format_time_of_day(
            ctx.time().secs_into_day(ctx.clock().now_ms()),
        ),
        data_log: ctx.data_log().stats(),
        tracked_vehicles,
        stale_vehicles: ctx.timeout_monitor().stale_count(),
        trip_history_events: state.trip_history.event_count().await,
        stop_event_entries: state.stop_events.entry_count().await,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/", get(get_status)).with_state(state)
}
