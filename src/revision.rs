//! Resolution of the configuration revision to load.
//!
//! An explicit `--config-rev` override wins; otherwise the active-revision
//! record for the agency decides. An absent or invalid record is fatal:
//! the process must not run against an unresolved revision.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::StartupError;

#[derive(Debug, sqlx::FromRow)]
struct ActiveRevisionRow {
    config_rev: i32,
    valid: bool,
}

pub async fn resolve(
    pool: &SqlitePool,
    agency_id: &str,
    override_rev: Option<i32>,
) -> Result<i32, StartupError> {
    let config_rev = match override_rev {
        Some(rev) => {
            info!(config_rev = rev, "Using configuration revision from command line");
            rev
        }
        None => {
            let row: Option<ActiveRevisionRow> = sqlx::query_as(
                "SELECT config_rev, valid FROM active_revisions WHERE agency_id = ?",
            )
            .bind(agency_id)
            .fetch_optional(pool)
            .await?;

            let row = row.ok_or_else(|| StartupError::NoActiveRevision {
                agency_id: agency_id.to_string(),
            })?;

            if !row.valid {
                return Err(StartupError::InvalidActiveRevision {
                    agency_id: agency_id.to_string(),
                    config_rev: row.config_rev,
                });
            }

            info!(
                agency = %agency_id,
                config_rev = row.config_rev,
                "Using active configuration revision from database"
            );
            row.config_rev
        }
    };

    if config_rev < 0 {
        return Err(StartupError::NegativeRevision(config_rev));
    }
    Ok(config_rev)
}
