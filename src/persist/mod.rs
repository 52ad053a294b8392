//! Asynchronous durable logging of generated data.
//!
//! Producers (the AVL feed, arrival/departure generation) hand records to
//! the [`DataLogQueue`]; a background drain task writes them to the
//! database. Producers never touch the database directly, and a failed
//! write never crashes a producer. When the queue fills, the configured
//! policy either backpressures the producer or rejects the record with a
//! report. A record is never lost silently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::config::DataLogConfig;
use crate::core::time::TimeHelper;
use crate::db::Db;
use crate::models::{ArrivalDeparture, AvlReport};

/// A unit of durable data. Ownership transfers to the queue on submit and
/// the record is never mutated afterwards.
#[derive(Debug, Clone)]
pub enum PersistenceRecord {
    AvlReport(AvlReport),
    ArrivalDeparture(ArrivalDeparture),
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Data log queue is full, record rejected")]
    Full,
    #[error("Data log queue has shut down")]
    Closed,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    stored: AtomicU64,
    dropped: AtomicU64,
    write_failures: AtomicU64,
}

/// Point-in-time queue statistics for the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueStats {
    pub enabled: bool,
    pub capacity: usize,
    pub queued: usize,
    pub submitted: u64,
    pub stored: u64,
    pub dropped: u64,
    pub write_failures: u64,
}

pub struct DataLogQueue {
    // Absent when durable logging is disabled (playback mode).
    tx: Option<mpsc::Sender<PersistenceRecord>>,
    capacity: usize,
    pause_if_filling: bool,
    counters: Arc<Counters>,
}

impl DataLogQueue {
    /// Create the queue without a drain task. The caller owns the receiver
    /// half; production code goes through [`DataLogQueue::start`].
    fn new(config: &DataLogConfig) -> (Self, Option<mpsc::Receiver<PersistenceRecord>>) {
        let (tx, rx) = if config.enabled {
            let (tx, rx) = mpsc::channel(config.capacity);
            (Some(tx), Some(rx))
        } else {
            info!("Data logging disabled, generated records will be discarded");
            (None, None)
        };
        let queue = Self {
            tx,
            capacity: config.capacity,
            pause_if_filling: config.pause_if_filling,
            counters: Arc::new(Counters::default()),
        };
        (queue, rx)
    }

    /// Create the queue and spawn its drain task against the database.
    pub fn start(config: &DataLogConfig, db: Db) -> Self {
        let (queue, rx) = Self::new(config);
        if let Some(rx) = rx {
            let counters = queue.counters.clone();
            tokio::spawn(drain(rx, db, counters));
        }
        queue
    }

    /// Hand a record over for durable storage. Under normal load this does
    /// not block. When the queue is full the `pause_if_filling` policy
    /// decides: backpressure the producer, or reject with
    /// [`QueueError::Full`] (counted, reported, never silent).
    pub async fn submit(&self, record: PersistenceRecord) -> Result<(), QueueError> {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        let Some(tx) = &self.tx else {
            // Disabled: accepted and discarded by design (playback mode).
            return Ok(());
        };

        if self.pause_if_filling {
            tx.send(record).await.map_err(|_| QueueError::Closed)
        } else {
            tx.try_send(record).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(capacity = self.capacity, "Data log queue full, record rejected");
                    QueueError::Full
                }
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            })
        }
    }

    /// Backpressure signal: the buffer has crossed its high-water mark.
    pub fn is_filling(&self) -> bool {
        match &self.tx {
            Some(tx) => tx.capacity() < self.capacity / 4,
            None => false,
        }
    }

    pub fn stats(&self) -> QueueStats {
        let queued = match &self.tx {
            Some(tx) => self.capacity - tx.capacity(),
            None => 0,
        };
        QueueStats {
            enabled: self.tx.is_some(),
            capacity: self.capacity,
            queued,
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            stored: self.counters.stored.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Drain loop: writes records in the order they were submitted. A failed
/// write is retried once and then dropped with a report; the loop itself
/// keeps running.
async fn drain(
    mut rx: mpsc::Receiver<PersistenceRecord>,
    db: Db,
    counters: Arc<Counters>,
) {
    let time = TimeHelper::new(db.tz());
    info!("Data log drain task started");

    while let Some(record) = rx.recv().await {
        let mut result = write_record(&db, &time, &record).await;
        if let Err(e) = &result {
            counters.write_failures.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Data log write failed, retrying once");
            result = write_record(&db, &time, &record).await;
        }
        match result {
            Ok(()) => {
                counters.stored.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.write_failures.fetch_add(1, Ordering::Relaxed);
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Data log write failed after retry, record dropped");
            }
        }
    }
    info!("Data log drain task stopped");
}

async fn write_record(
    db: &Db,
    time: &TimeHelper,
    record: &PersistenceRecord,
) -> Result<(), sqlx::Error> {
    match record {
        PersistenceRecord::AvlReport(report) => {
            sqlx::query(
                "INSERT INTO vehicle_positions \
                 (vehicle_id, route_id, lat, lon, speed, heading, time_ms, service_date) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&report.vehicle_id)
            .bind(&report.route_id)
            .bind(report.lat)
            .bind(report.lon)
            .bind(report.speed)
            .bind(report.heading)
            .bind(report.time_ms)
            .bind(time.service_date(report.time_ms).to_string())
            .execute(db.pool())
            .await?;
        }
        PersistenceRecord::ArrivalDeparture(event) => {
            sqlx::query(
                "INSERT INTO arrivals_departures \
                 (vehicle_id, trip_id, route_id, stop_id, is_arrival, time_ms, service_date) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&event.vehicle_id)
            .bind(&event.trip_id)
            .bind(&event.route_id)
            .bind(&event.stop_id)
            .bind(event.is_arrival)
            .bind(event.time_ms)
            .bind(time.service_date(event.time_ms).to_string())
            .execute(db.pool())
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn report(n: i64) -> PersistenceRecord {
        PersistenceRecord::AvlReport(AvlReport {
            vehicle_id: format!("v{n}"),
            route_id: Some("12".to_string()),
            lat: 37.77,
            lon: -122.42,
            speed: None,
            heading: None,
            time_ms: n,
        })
    }

    fn test_config(capacity: usize, pause_if_filling: bool) -> DataLogConfig {
        DataLogConfig {
            enabled: true,
            capacity,
            pause_if_filling,
        }
    }

    #[tokio::test]
    async fn rejecting_queue_reports_overflow() {
        let (queue, _rx) = DataLogQueue::new(&test_config(3, false));

        for n in 0..3 {
            queue.submit(report(n)).await.unwrap();
        }
        // Capacity reached and nothing draining: the next record must be
        // rejected, not silently lost.
        let err = queue.submit(report(3)).await.unwrap_err();
        assert!(matches!(err, QueueError::Full));

        let stats = queue.stats();
        assert_eq!(stats.submitted, 4);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.queued, 3);
    }

    #[tokio::test]
    async fn pausing_queue_blocks_producer_until_drained() {
        let (queue, rx) = DataLogQueue::new(&test_config(3, true));
        let mut rx = rx.unwrap();

        for n in 0..3 {
            queue.submit(report(n)).await.unwrap();
        }

        // The 4th submit must block rather than drop the record.
        let blocked = tokio::time::timeout(Duration::from_millis(50), queue.submit(report(3)));
        assert!(blocked.await.is_err(), "submit should have blocked on a full queue");

        // Draining one record unblocks it.
        let drained = rx.recv().await.unwrap();
        assert!(matches!(drained, PersistenceRecord::AvlReport(r) if r.vehicle_id == "v0"));
        tokio::time::timeout(Duration::from_millis(500), queue.submit(report(3)))
            .await
            .expect("submit should complete once space frees up")
            .unwrap();

        assert_eq!(queue.stats().dropped, 0);
    }

    #[tokio::test]
    async fn records_drain_in_submission_order() {
        let (queue, rx) = DataLogQueue::new(&test_config(10, true));
        let mut rx = rx.unwrap();

        for n in 0..5 {
            queue.submit(report(n)).await.unwrap();
        }
        for n in 0..5 {
            let rec = rx.recv().await.unwrap();
            match rec {
                PersistenceRecord::AvlReport(r) => assert_eq!(r.vehicle_id, format!("v{n}")),
                other => panic!("unexpected record {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn disabled_queue_accepts_and_discards() {
        let config = DataLogConfig {
            enabled: false,
            capacity: 3,
            pause_if_filling: false,
        };
        let (queue, rx) = DataLogQueue::new(&config);
        assert!(rx.is_none());

        for n in 0..10 {
            queue.submit(report(n)).await.unwrap();
        }
        let stats = queue.stats();
        assert!(!stats.enabled);
        assert_eq!(stats.submitted, 10);
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test]
    async fn high_water_mark_signals_backpressure() {
        let (queue, _rx) = DataLogQueue::new(&test_config(8, false));
        assert!(!queue.is_filling());
        for n in 0..7 {
            queue.submit(report(n)).await.unwrap();
        }
        assert!(queue.is_filling());
    }

    #[tokio::test]
    async fn drain_task_stores_records() {
        use crate::db::testutil::memory_pool;

        let pool = memory_pool().await;
        let db = Db::for_tests(pool, chrono_tz::America::Los_Angeles);
        let queue = DataLogQueue::start(&test_config(10, true), db.clone());

        queue.submit(report(1_700_000_000_000)).await.unwrap();
        queue
            .submit(PersistenceRecord::ArrivalDeparture(ArrivalDeparture {
                vehicle_id: "v1".to_string(),
                trip_id: "t1".to_string(),
                route_id: "12".to_string(),
                stop_id: "s5".to_string(),
                is_arrival: true,
                time_ms: 1_700_000_000_000,
            }))
            .await
            .unwrap();

        // Wait for the drain task to catch up.
        for _ in 0..50 {
            if queue.stats().stored == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(queue.stats().stored, 2);

        let (positions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vehicle_positions")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(positions, 1);
        let (events,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM arrivals_departures")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(events, 1);
    }
}
