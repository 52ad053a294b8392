use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::{not_found, AppState, ErrorResponse};
use crate::cache::HistoricalEvent;

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheSummary {
    pub name: String,
    pub entries: usize,
    pub events: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheListResponse {
    pub caches: Vec<CacheSummary>,
}

/// The historical caches this core maintains
#[utoipa::path(
    get,
    path = "/api/caches",
    responses(
        (status = 200, description = "Cache names and sizes", body = CacheListResponse)
    ),
    tag = "caches"
)]
pub async fn list_caches(State(state): State<AppState>) -> Json<CacheListResponse> {
    Json(CacheListResponse {
        caches: vec![
            CacheSummary {
                name: "trip-history".to_string(),
                entries: state.trip_history.entry_count().await,
                events: state.trip_history.event_count().await,
            },
            CacheSummary {
                name: "stop-events".to_string(),
                entries: state.stop_events.entry_count().await,
                events: state.stop_events.event_count().await,
            },
        ],
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheEventsResponse {
    pub events: Vec<HistoricalEvent>,
}

/// Logged arrival/departure history for a trip
#[utoipa::path(
    get,
    path = "/api/caches/trip-history/{trip_id}",
    params(("trip_id" = String, Path, description = "Trip identifier")),
    responses(
        (status = 200, description = "Events for the trip, oldest first", body = CacheEventsResponse),
        (status = 404, description = "Unknown trip", body = ErrorResponse)
    ),
    tag = "caches"
)]
pub async fn get_trip_history(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Response {
    let events = state.trip_history.events_for_trip(&trip_id).await;
    if events.is_empty() && state.ctx.snapshot().trip(&trip_id).is_none() {
        return not_found(format!("No trip '{trip_id}' in the loaded configuration"))
            .into_response();
    }
    Json(CacheEventsResponse { events }).into_response()
}

/// Logged arrival/departure history at a stop
#[utoipa::path(
    get,
    path = "/api/caches/stop-events/{stop_id}",
    params(("stop_id" = String, Path, description = "Stop identifier")),
    responses(
        (status = 200, description = "Events at the stop", body = CacheEventsResponse),
        (status = 404, description = "Unknown stop", body = ErrorResponse)
    ),
    tag = "caches"
)]
pub async fn get_stop_events(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
) -> Response {
    let events = state.stop_events.events_for_stop(&stop_id).await;
    if events.is_empty() && state.ctx.snapshot().stop(&stop_id).is_none() {
        return not_found(format!("No stop '{stop_id}' in the loaded configuration"))
            .into_response();
    }
    Json(CacheEventsResponse { events }).into_response()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_caches))
        .route("/trip-history/{trip_id}", get(get_trip_history))
        .route("/stop-events/{stop_id}", get(get_stop_events))
        .with_state(state)
}
