//! The process-wide core context.
//!
//! One `CoreContext` is constructed per process and handed to every
//! component that needs it as an explicit `Arc` handle; there is no global
//! accessor. Construction is guarded so a second attempt cannot re-run any
//! startup side effects: a later call is reported and handed the existing
//! context, and a concurrent call waits on the in-flight construction
//! instead of starting its own.
//!
//! The startup steps run in dependency order and each is a hard
//! precondition for the next. In particular the agency timezone must be
//! resolved before the service database pool is opened, because every
//! date-boundary computation made through that pool uses the zone the pool
//! was created with. A failure at any step is fatal; a partially
//! initialized core is not a state worth keeping alive.

pub mod time;
pub mod timeout;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::cache::vehicles::{
    apply_report, new_prediction_cache, new_vehicle_cache, PredictionCache, VehicleCache,
};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::db::snapshot::ConfigSnapshot;
use crate::db::{self, Db};
use crate::error::StartupError;
use crate::models::AvlReport;
use crate::persist::{DataLogQueue, PersistenceRecord, QueueError};
use crate::revision;
use self::time::TimeHelper;
use self::timeout::TimeoutMonitor;

static CONTEXT: OnceCell<Arc<CoreContext>> = OnceCell::const_new();

pub struct CoreContext {
    agency_id: String,
    db: Db,
    snapshot: ConfigSnapshot,
    time: TimeHelper,
    clock: Arc<SystemClock>,
    data_log: DataLogQueue,
    timeout_monitor: TimeoutMonitor,
    vehicles: VehicleCache,
    predictions: PredictionCache,
    started: Instant,
}

impl CoreContext {
    /// Construct the core for this process. Exactly one construction ever
    /// runs; later calls are reported and receive the existing handle
    /// without any side effects re-running, and a concurrent second call
    /// waits for the first instead of racing it through startup.
    pub async fn create(
        config: &Config,
        config_rev_override: Option<i32>,
    ) -> Result<Arc<Self>, StartupError> {
        if let Some(existing) = CONTEXT.get() {
            error!("Core context already created, returning existing instance");
            return Ok(existing.clone());
        }

        let ctx = CONTEXT
            .get_or_try_init(|| Self::build(config, config_rev_override))
            .await?;
        Ok(ctx.clone())
    }

    async fn build(
        config: &Config,
        config_rev_override: Option<i32>,
    ) -> Result<Arc<Self>, StartupError> {
        let agency_id = config.agency_id.clone();

        // Bootstrap pool for the lookups that must happen before the
        // timezone is known. Also applies migrations.
        let bootstrap = db::bootstrap_pool(&config.database.url).await?;

        let config_rev =
            revision::resolve(&bootstrap, &agency_id, config_rev_override).await?;

        // Timezone must be resolved before any further time-sensitive work
        // and before the service pool exists.
        let tz = db::agency_timezone(&bootstrap, &agency_id).await?;
        info!(agency = %agency_id, timezone = %tz, config_rev, "Resolved agency configuration");

        // Discard pre-timezone connections; everything from here on uses
        // connections established under the resolved zone.
        bootstrap.close().await;
        let db = Db::connect(&config.database.url, tz).await?;

        let snapshot = ConfigSnapshot::load(&db, config_rev).await?;

        let data_log = DataLogQueue::start(&config.data_log, db.clone());

        // Mandatory modules start last in construction but before any
        // data-producing module: they react to data as it is produced.
        let clock = Arc::new(SystemClock::new());
        let vehicles = new_vehicle_cache();
        let timeout_monitor =
            TimeoutMonitor::start(config.timeout.clone(), clock.clone(), vehicles.clone());

        info!("Core context created");
        Ok(Arc::new(Self {
            agency_id,
            db,
            snapshot,
            time: TimeHelper::new(tz),
            clock,
            data_log,
            timeout_monitor,
            vehicles,
            predictions: new_prediction_cache(),
            started: Instant::now(),
        }))
    }

    pub fn agency_id(&self) -> &str {
        &self.agency_id
    }

    pub fn config_rev(&self) -> i32 {
        self.snapshot.config_rev()
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    /// Shared timezone-aware calendar arithmetic.
    pub fn time(&self) -> &TimeHelper {
        &self.time
    }

    /// The process time source. Live by default; switched into playback
    /// mode at most once.
    pub fn clock(&self) -> &SystemClock {
        &self.clock
    }

    pub fn data_log(&self) -> &DataLogQueue {
        &self.data_log
    }

    pub fn timeout_monitor(&self) -> &TimeoutMonitor {
        &self.timeout_monitor
    }

    pub fn vehicles(&self) -> &VehicleCache {
        &self.vehicles
    }

    pub fn predictions(&self) -> &PredictionCache {
        &self.predictions
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Producer path for AVL reports: update the live vehicle cache, then
    /// hand the report to the data log queue. In playback mode the clock
    /// advances to the report time so downstream logic sees replayed time.
    pub async fn process_avl_report(&self, report: AvlReport) -> Result<(), QueueError> {
        if self.clock.is_playback() {
            self.clock.set_ms(report.time_ms);
        }
        apply_report(&self.vehicles, &report).await;
        self.data_log
            .submit(PersistenceRecord::AvlReport(report))
            .await
    }

    #[cfg(test)]
    pub(crate) fn installed() -> bool {
        CONTEXT.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::snapshot::testutil::insert_route;
    use crate::db::testutil::{insert_active_revision, insert_agency};
    use sqlx::SqlitePool;

    fn test_config(url: &str) -> Config {
        let yaml = format!(
            r#"
agency_id: sfmta
database:
  url: "{url}"
"#
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    // The construction guard is process-wide state, so the whole
    // create-twice contract lives in a single test: a failed attempt
    // installs nothing, the first success installs the context, and a
    // second attempt observes the same instance without re-running
    // anything.
    #[tokio::test]
    async fn context_creation_is_guarded_and_exactly_once() {
        let path = std::env::temp_dir().join(format!(
            "transitd-core-test-{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let config = test_config(&url);

        // No active revision record yet: construction must fail fatally
        // and install nothing.
        let Err(err) = CoreContext::create(&config, None).await else {
            panic!("construction must fail without an active revision record");
        };
        assert!(matches!(err, StartupError::NoActiveRevision { .. }));
        assert!(!CoreContext::installed());

        // Seed a valid revision and snapshot.
        let pool = SqlitePool::connect(&url).await.unwrap();
        insert_agency(&pool, "sfmta", "America/Los_Angeles").await;
        insert_active_revision(&pool, "sfmta", 1, true).await;
        insert_route(&pool, 1, "12", "12 Folsom").await;
        pool.close().await;

        // Concurrent attempts: only one construction runs, the other waits
        // on it and observes the same instance.
        let (first, second) = tokio::join!(
            CoreContext::create(&config, None),
            CoreContext::create(&config, None)
        );
        let ctx = first.unwrap();
        assert!(Arc::ptr_eq(&ctx, &second.unwrap()));
        assert!(CoreContext::installed());
        assert_eq!(ctx.config_rev(), 1);
        assert_eq!(ctx.agency_id(), "sfmta");
        assert_eq!(ctx.snapshot().route_count(), 1);
        assert!(!ctx.clock().is_playback());

        // Second attempt: same instance, no new side effects.
        let again = CoreContext::create(&config, None).await.unwrap();
        assert!(Arc::ptr_eq(&ctx, &again));

        let _ = std::fs::remove_file(&path);
    }
}
