use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::{internal_error, AppState, ErrorResponse};

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct RouteEventStats {
    pub route_id: String,
    pub arrivals: i64,
    pub departures: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalysisSummaryResponse {
    pub routes: Vec<RouteEventStats>,
    pub total_events: i64,
}

/// Per-route summary of logged arrival/departure events
#[utoipa::path(
    get,
    path = "/api/analysis",
    responses(
        (status = 200, description = "Event counts per route", body = AnalysisSummaryResponse),
        (status = 500, description = "Query failed", body = ErrorResponse)
    ),
    tag = "analysis"
)]
pub async fn get_analysis_summary(State(state): State<AppState>) -> Response {
    let result: Result<Vec<RouteEventStats>, sqlx::Error> = sqlx::query_as(
        "SELECT route_id, \
                SUM(CASE WHEN is_arrival THEN 1 ELSE 0 END) AS arrivals, \
                SUM(CASE WHEN is_arrival THEN 0 ELSE 1 END) AS departures \
         FROM arrivals_departures \
         GROUP BY route_id \
         ORDER BY route_id",
    )
    .fetch_all(state.ctx.db().pool())
    .await;

    match result {
        Ok(routes) => {
            let total_events = routes.iter().map(|r| r.arrivals + r.departures).sum();
            Json(AnalysisSummaryResponse {
                routes,
                total_events,
            })
            .into_response()
        }
        Err(e) => internal_error(e).into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_analysis_summary))
        .with_state(state)
}
