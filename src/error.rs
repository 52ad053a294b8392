use thiserror::Error;

/// Failures of startup preconditions. Any of these aborts the process;
/// there is no degraded mode to fall back to.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("No active revision record found for agency '{agency_id}'")]
    NoActiveRevision { agency_id: String },
    #[error(
        "Active revision for agency '{agency_id}' is marked invalid \
         (config_rev {config_rev}); the revision must be set to a proper value"
    )]
    InvalidActiveRevision { agency_id: String, config_rev: i32 },
    #[error("Configuration revision {0} is negative")]
    NegativeRevision(i32),
    #[error("No agency record found for '{agency_id}'")]
    UnknownAgency { agency_id: String },
    #[error("Agency '{agency_id}' has unparseable timezone '{timezone}'")]
    BadTimezone { agency_id: String, timezone: String },
    #[error("No configuration data found for revision {config_rev}")]
    EmptySnapshot { config_rev: i32 },
    #[error("Database error during startup: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_name_the_agency() {
        let err = StartupError::NoActiveRevision {
            agency_id: "sfmta".to_string(),
        };
        assert!(err.to_string().contains("sfmta"));

        let err = StartupError::InvalidActiveRevision {
            agency_id: "sfmta".to_string(),
            config_rev: 7,
        };
        assert!(err.to_string().contains("sfmta"));
        assert!(err.to_string().contains('7'));
    }
}
