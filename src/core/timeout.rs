//! Vehicle staleness detection.
//!
//! Mandatory module: it must be running before any data-producing module
//! starts, since it reacts to vehicle state as it is produced. Scans the
//! vehicle cache against the virtual clock so it behaves the same in
//! playback mode as it does live.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::vehicles::VehicleCache;
use crate::clock::SystemClock;
use crate::config::TimeoutConfig;

#[derive(Debug)]
pub struct TimeoutMonitor {
    stale_count: Arc<AtomicUsize>,
}

impl TimeoutMonitor {
    pub fn start(config: TimeoutConfig, clock: Arc<SystemClock>, vehicles: VehicleCache) -> Self {
        let stale_count = Arc::new(AtomicUsize::new(0));
        let counter = stale_count.clone();

        tokio::spawn(async move {
            info!(
                check_interval_secs = config.check_interval_secs,
                stale_after_secs = config.stale_after_secs,
                "Timeout monitor started"
            );
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(
                config.check_interval_secs.max(1),
            ));
            // The immediate first tick would scan an empty cache.
            interval.tick().await;

            loop {
                interval.tick().await;
                let now_ms = clock.now_ms();
                let cutoff_ms = now_ms - config.stale_after_secs * 1000;

                let mut stale = 0usize;
                let vehicles = vehicles.read().await;
                for state in vehicles.values() {
                    if state.last_report_ms < cutoff_ms {
                        stale += 1;
                        warn!(
                            vehicle = %state.vehicle_id,
                            last_report_ms = state.last_report_ms,
                            "Vehicle has not reported recently"
                        );
                    }
                }
                drop(vehicles);
                counter.store(stale, Ordering::Relaxed);
            }
        });

        Self { stale_count }
    }

    /// Number of stale vehicles seen on the most recent scan.
    pub fn stale_count(&self) -> usize {
        self.stale_count.load(Ordering::Relaxed)
    }
}
