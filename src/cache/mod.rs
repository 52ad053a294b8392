//! Historical caches and their startup population.
//!
//! The retrospective window is never loaded with one unbounded query.
//! [`populate`] walks it in date chunks (configurable size, one day by
//! default), newest chunk first, so peak memory during startup stays
//! bounded no matter how large the window is.

pub mod vehicles;

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::config::HistoryConfig;
use crate::db::Db;

/// A named cache that can load one bounded date range at a time. Ranges
/// are half-open `[from, to)` over service dates.
pub trait HistoricalCache {
    fn name(&self) -> &'static str;
    fn load_range(
        &self,
        db: &Db,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl std::future::Future<Output = Result<usize, sqlx::Error>>;
}

/// The chunk boundaries covering `window_days` of history up to and
/// including `today`, newest chunk first. Chunks are contiguous,
/// non-overlapping, and the oldest one may be short.
pub fn day_chunks(today: NaiveDate, window_days: u32, chunk_days: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let chunk_days = chunk_days.max(1);
    let upper = today + Days::new(1);
    let lower = upper - Days::new(window_days as u64);

    let mut chunks = Vec::new();
    let mut to = upper;
    while to > lower {
        let from = std::cmp::max(to - Days::new(chunk_days as u64), lower);
        chunks.push((from, to));
        to = from;
    }
    chunks
}

/// Walk the configured retrospective window chunk by chunk and load each
/// chunk into the cache. A failed chunk is reported and skipped; the
/// persistence layer is a non-fatal collaborator.
pub async fn populate<C: HistoricalCache>(
    db: &Db,
    cache: &C,
    config: &HistoryConfig,
    today: NaiveDate,
) {
    let chunks = day_chunks(today, config.window_days, config.chunk_days);
    let mut total = 0usize;
    for (from, to) in &chunks {
        debug!(cache = cache.name(), %from, %to, "Populating historical cache chunk");
        match cache.load_range(db, *from, *to).await {
            Ok(rows) => total += rows,
            Err(e) => {
                error!(
                    cache = cache.name(),
                    %from, %to, error = %e,
                    "Failed to load historical cache chunk, skipping"
                );
            }
        }
    }
    info!(
        cache = cache.name(),
        chunks = chunks.len(),
        rows = total,
        "Historical cache populated"
    );
}

/// One logged arrival/departure event read back from the database.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, utoipa::ToSchema)]
pub struct HistoricalEvent {
    pub vehicle_id: String,
    pub trip_id: String,
    pub route_id: String,
    pub stop_id: String,
    pub is_arrival: bool,
    pub time_ms: i64,
    pub service_date: String,
}

async fn fetch_events(
    db: &Db,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<HistoricalEvent>, sqlx::Error> {
    sqlx::query_as(
        "SELECT vehicle_id, trip_id, route_id, stop_id, is_arrival, time_ms, service_date \
         FROM arrivals_departures \
         WHERE service_date >= ? AND service_date < ? \
         ORDER BY time_ms",
    )
    .bind(from.to_string())
    .bind(to.to_string())
    .fetch_all(db.pool())
    .await
}

/// Per-trip history of logged arrival/departure events, keyed by trip and
/// service date.
#[derive(Debug, Default)]
pub struct TripHistoryCache {
    entries: RwLock<HashMap<(String, String), Vec<HistoricalEvent>>>,
}

impl TripHistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events_for_trip(&self, trip_id: &str) -> Vec<HistoricalEvent> {
        let entries = self.entries.read().await;
        let mut events: Vec<HistoricalEvent> = entries
            .iter()
            .filter(|((t, _), _)| t == trip_id)
            .flat_map(|(_, v)| v.iter().cloned())
            .collect();
        events.sort_by_key(|e| e.time_ms);
        events
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn event_count(&self) -> usize {
        self.entries.read().await.values().map(Vec::len).sum()
    }
}

impl HistoricalCache for TripHistoryCache {
    fn name(&self) -> &'static str {
        "trip-history"
    }

    async fn load_range(&self, db: &Db, from: NaiveDate, to: NaiveDate) -> Result<usize, sqlx::Error> {
        let events = fetch_events(db, from, to).await?;
        let count = events.len();
        let mut entries = self.entries.write().await;
        for event in events {
            entries
                .entry((event.trip_id.clone(), event.service_date.clone()))
                .or_default()
                .push(event);
        }
        Ok(count)
    }
}

/// Per-stop history of logged arrival/departure events.
#[derive(Debug, Default)]
pub struct StopEventCache {
    entries: RwLock<HashMap<String, Vec<HistoricalEvent>>>,
}

impl StopEventCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events_for_stop(&self, stop_id: &str) -> Vec<HistoricalEvent> {
        let mut events = self
            .entries
            .read()
            .await
            .get(stop_id)
            .cloned()
            .unwrap_or_default();
        // Chunks load newest day first, so stored order interleaves days.
        events.sort_by_key(|e| e.time_ms);
        events
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn event_count(&self) -> usize {
        self.entries.read().await.values().map(Vec::len).sum()
    }
}

impl HistoricalCache for StopEventCache {
    fn name(&self) -> &'static str {
        "stop-events"
    }

    async fn load_range(&self, db: &Db, from: NaiveDate, to: NaiveDate) -> Result<usize, sqlx::Error> {
        let events = fetch_events(db, from, to).await?;
        let count = events.len();
        let mut entries = self.entries.write().await;
        for event in events {
            entries.entry(event.stop_id.clone()).or_default().push(event);
        }
        Ok(count)
    }
}
