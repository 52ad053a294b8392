//! Database access: connection factory, migrations, agency lookup.
//!
//! The timezone resolved for the agency is threaded through [`Db`] as an
//! explicit value rather than set as ambient process state. Connections in
//! the service pool are only opened after the timezone is known, so every
//! date-boundary computation the pool's users perform goes through the
//! same resolved zone.

pub mod snapshot;

use chrono_tz::Tz;
use sqlx::SqlitePool;

use crate::error::StartupError;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Handle to the service database pool plus the agency timezone under
/// which its connections were established.
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
    tz: Tz,
}

impl Db {
    /// The timezone-aware connection factory. Must only be called once the
    /// agency timezone has been resolved.
    pub async fn connect(url: &str, tz: Tz) -> Result<Self, StartupError> {
        let pool = SqlitePool::connect(url).await?;
        Ok(Self { pool, tz })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    #[cfg(test)]
    pub(crate) fn for_tests(pool: SqlitePool, tz: Tz) -> Self {
        Self { pool, tz }
    }
}

/// Short-lived pool used before the agency timezone is known: revision
/// resolution and the timezone lookup itself. Runs migrations. Closed and
/// replaced by [`Db::connect`] once the timezone is resolved.
pub async fn bootstrap_pool(url: &str) -> Result<SqlitePool, StartupError> {
    let pool = SqlitePool::connect(url).await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

#[derive(Debug, sqlx::FromRow)]
struct AgencyRow {
    timezone: String,
}

/// Resolve the agency's timezone. Must happen before the service pool is
/// opened and before any other time-sensitive work.
pub async fn agency_timezone(pool: &SqlitePool, agency_id: &str) -> Result<Tz, StartupError> {
    let row: Option<AgencyRow> =
        sqlx::query_as("SELECT timezone FROM agencies WHERE id = ?")
            .bind(agency_id)
            .fetch_optional(pool)
            .await?;

    let row = row.ok_or_else(|| StartupError::UnknownAgency {
        agency_id: agency_id.to_string(),
    })?;

    row.timezone
        .parse::<Tz>()
        .map_err(|_| StartupError::BadTimezone {
            agency_id: agency_id.to_string(),
            timezone: row.timezone,
        })
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    /// In-memory database with the schema applied. Single connection so
    /// every query sees the same memory database.
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        MIGRATOR.run(&pool).await.unwrap();
        pool
    }

    pub async fn insert_agency(pool: &SqlitePool, id: &str, timezone: &str) {
        sqlx::query("INSERT INTO agencies (id, name, timezone) VALUES (?, ?, ?)")
            .bind(id)
            .bind(id)
            .bind(timezone)
            .execute(pool)
            .await
            .unwrap();
    }

    pub async fn insert_active_revision(pool: &SqlitePool, agency_id: &str, rev: i32, valid: bool) {
        sqlx::query("INSERT INTO active_revisions (agency_id, config_rev, valid) VALUES (?, ?, ?)")
            .bind(agency_id)
            .bind(rev)
            .bind(valid)
            .execute(pool)
            .await
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    #[tokio::test]
    async fn agency_timezone_parses_valid_zone() {
        let pool = memory_pool().await;
        insert_agency(&pool, "sfmta", "America/Los_Angeles").await;

        let tz = agency_timezone(&pool, "sfmta").await.unwrap();
        assert_eq!(tz, chrono_tz::America::Los_Angeles);
    }

    #[tokio::test]
    async fn missing_agency_is_fatal() {
        let pool = memory_pool().await;
        let err = agency_timezone(&pool, "nowhere").await.unwrap_err();
        assert!(matches!(err, StartupError::UnknownAgency { .. }));
        assert!(err.to_string().contains("nowhere"));
    }

    #[tokio::test]
    async fn bad_timezone_is_fatal() {
        let pool = memory_pool().await;
        insert_agency(&pool, "sfmta", "Not/AZone").await;
        let err = agency_timezone(&pool, "sfmta").await.unwrap_err();
        assert!(matches!(err, StartupError::BadTimezone { .. }));
    }
}
