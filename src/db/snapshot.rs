//! Loading of the immutable configuration snapshot for one revision.

use std::collections::HashMap;

use tracing::info;

use crate::db::Db;
use crate::error::StartupError;
use crate::models::{Block, Route, ScheduleTime, Stop, Trip, TripStop};

/// Full configuration data for one revision: routes, stops, trips grouped
/// into blocks. Loaded once at startup, immutable afterwards.
#[derive(Debug)]
pub struct ConfigSnapshot {
    config_rev: i32,
    routes: HashMap<String, Route>,
    stops: HashMap<String, Stop>,
    trips: HashMap<String, Trip>,
    blocks: Vec<Block>,
}

#[derive(Debug, sqlx::FromRow)]
struct RouteRow {
    id: String,
    name: String,
    color: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct StopRow {
    id: String,
    name: String,
    lat: f64,
    lon: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct TripRow {
    id: String,
    route_id: String,
    service_id: String,
    direction_id: String,
    headsign: String,
    block_id: String,
}

#[derive(Debug, sqlx::FromRow)]
struct StopTimeRow {
    trip_id: String,
    stop_id: String,
    arrival_secs: Option<i32>,
    departure_secs: Option<i32>,
}

impl ConfigSnapshot {
    /// Read all configuration data for the revision. An empty revision
    /// (no routes) is a fatal startup error.
    pub async fn load(db: &Db, config_rev: i32) -> Result<Self, StartupError> {
        let route_rows: Vec<RouteRow> =
            sqlx::query_as("SELECT id, name, color FROM routes WHERE config_rev = ?")
                .bind(config_rev)
                .fetch_all(db.pool())
                .await?;
        if route_rows.is_empty() {
            return Err(StartupError::EmptySnapshot { config_rev });
        }

        let stop_rows: Vec<StopRow> =
            sqlx::query_as("SELECT id, name, lat, lon FROM stops WHERE config_rev = ?")
                .bind(config_rev)
                .fetch_all(db.pool())
                .await?;

        let stop_time_rows: Vec<StopTimeRow> = sqlx::query_as(
            "SELECT trip_id, stop_id, arrival_secs, departure_secs \
             FROM trip_stop_times WHERE config_rev = ? \
             ORDER BY trip_id, stop_sequence",
        )
        .bind(config_rev)
        .fetch_all(db.pool())
        .await?;

        let mut stops_by_trip: HashMap<String, Vec<TripStop>> = HashMap::new();
        for row in stop_time_rows {
            let schedule_time = if row.arrival_secs.is_some() || row.departure_secs.is_some() {
                Some(ScheduleTime {
                    arrival_secs: row.arrival_secs,
                    departure_secs: row.departure_secs,
                })
            } else {
                None
            };
            stops_by_trip.entry(row.trip_id).or_default().push(TripStop {
                stop_id: row.stop_id,
                schedule_time,
            });
        }

        // Trips come back in block order so blocks can be assembled with a
        // single pass.
        let trip_rows: Vec<TripRow> = sqlx::query_as(
            "SELECT id, route_id, service_id, direction_id, headsign, block_id \
             FROM trips WHERE config_rev = ? \
             ORDER BY block_id, block_index",
        )
        .bind(config_rev)
        .fetch_all(db.pool())
        .await?;

        let mut trips = HashMap::new();
        let mut blocks: Vec<Block> = Vec::new();
        for row in trip_rows {
            let trip = Trip {
                id: row.id.clone(),
                route_id: row.route_id,
                service_id: row.service_id.clone(),
                direction_id: row.direction_id,
                headsign: row.headsign,
                block_id: row.block_id.clone(),
                stops: stops_by_trip.remove(&row.id).unwrap_or_default(),
            };
            trips.insert(trip.id.clone(), trip.clone());

            match blocks.last_mut() {
                Some(block) if block.id == row.block_id => block.trips.push(trip),
                _ => blocks.push(Block {
                    id: row.block_id,
                    service_id: row.service_id,
                    trips: vec![trip],
                }),
            }
        }

        let snapshot = Self {
            config_rev,
            routes: route_rows
                .into_iter()
                .map(|r| {
                    (
                        r.id.clone(),
                        Route {
                            id: r.id,
                            name: r.name,
                            color: r.color,
                        },
                    )
                })
                .collect(),
            stops: stop_rows
                .into_iter()
                .map(|s| {
                    (
                        s.id.clone(),
                        Stop {
                            id: s.id,
                            name: s.name,
                            lat: s.lat,
                            lon: s.lon,
                        },
                    )
                })
                .collect(),
            trips,
            blocks,
        };

        info!(
            config_rev,
            routes = snapshot.routes.len(),
            stops = snapshot.stops.len(),
            trips = snapshot.trips.len(),
            blocks = snapshot.blocks.len(),
            "Loaded configuration snapshot"
        );
        Ok(snapshot)
    }

    pub fn config_rev(&self) -> i32 {
        self.config_rev
    }

    pub fn route(&self, route_id: &str) -> Option<&Route> {
        self.routes.get(route_id)
    }

    /// All routes, ordered by id for stable readback output.
    pub fn routes_sorted(&self) -> Vec<&Route> {
        let mut routes: Vec<&Route> = self.routes.values().collect();
        routes.sort_by(|a, b| a.id.cmp(&b.id));
        routes
    }

    pub fn stop(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.get(stop_id)
    }

    pub fn trip(&self, trip_id: &str) -> Option<&Trip> {
        self.trips.get(trip_id)
    }

    /// Blocks containing at least one trip of the route. Interlined blocks
    /// qualify even when most of their trips belong to other routes.
    pub fn blocks_for_route(&self, route_id: &str) -> Vec<&Block> {
        self.blocks
            .iter()
            .filter(|b| b.serves_route(route_id))
            .collect()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}
