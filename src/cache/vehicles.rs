//! In-memory caches of live per-vehicle state.
//!
//! Fed by the AVL producer path, read by the service endpoints and the
//! timeout monitor. Only the population contract matters to the core: a
//! report for a vehicle replaces that vehicle's entry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::models::AvlReport;

/// Latest known state for one tracked vehicle.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VehicleState {
    pub vehicle_id: String,
    pub route_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    /// Epoch milliseconds of the last report for this vehicle.
    pub last_report_ms: i64,
}

/// A predicted arrival/departure for a vehicle at a stop.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Prediction {
    pub vehicle_id: String,
    pub trip_id: String,
    pub route_id: String,
    pub stop_id: String,
    pub is_arrival: bool,
    /// Epoch milliseconds of the predicted event.
    pub predicted_time_ms: i64,
}

/// vehicle id -> latest state
pub type VehicleCache = Arc<RwLock<HashMap<String, VehicleState>>>;

/// stop id -> predictions for that stop, soonest first
pub type PredictionCache = Arc<RwLock<HashMap<String, Vec<Prediction>>>>;

pub fn new_vehicle_cache() -> VehicleCache {
    Arc::new(RwLock::new(HashMap::new()))
}

pub fn new_prediction_cache() -> PredictionCache {
    Arc::new(RwLock::new(HashMap::new()))
}

/// Apply an AVL report to the vehicle cache, replacing the vehicle's
/// previous state.
pub async fn apply_report(cache: &VehicleCache, report: &AvlReport) {
    let state = VehicleState {
        vehicle_id: report.vehicle_id.clone(),
        route_id: report.route_id.clone(),
        lat: report.lat,
        lon: report.lon,
        speed: report.speed,
        heading: report.heading,
        last_report_ms: report.time_ms,
    };
    cache
        .write()
        .await
        .insert(report.vehicle_id.clone(), state);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(vehicle_id: &str, time_ms: i64) -> AvlReport {
        AvlReport {
            vehicle_id: vehicle_id.to_string(),
            route_id: Some("12".to_string()),
            lat: 37.77,
            lon: -122.42,
            speed: Some(8.5),
            heading: Some(180.0),
            time_ms,
        }
    }

    #[tokio::test]
    async fn newer_report_replaces_vehicle_state() {
        let cache = new_vehicle_cache();
        apply_report(&cache, &report("v1", 1_000)).await;
        apply_report(&cache, &report("v1", 2_000)).await;
        apply_report(&cache, &report("v2", 1_500)).await;

        let vehicles = cache.read().await;
        assert_eq!(vehicles.len(), 2);
        assert_eq!(vehicles["v1"].last_report_ms, 2_000);
        assert_eq!(vehicles["v2"].last_report_ms, 1_500);
    }
}
