//! Optional background modules.
//!
//! Started from the configured name list once the core context is live and
//! the historical caches are populated. A module that fails to start (or a
//! name that matches nothing) is reported and skipped; optional modules
//! are never allowed to take the process down.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::core::CoreContext;

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("Unknown optional module '{0}'")]
    Unknown(String),
}

pub fn known_modules() -> &'static [&'static str] {
    &["queue-monitor", "vehicle-summary"]
}

pub fn start_optional_modules(ctx: &Arc<CoreContext>, names: &[String]) {
    if names.is_empty() {
        info!("No optional modules to start");
        return;
    }
    for name in names {
        match start_module(ctx, name) {
            Ok(()) => info!(module = %name, "Started optional module"),
            Err(e) => error!(
                module = %name,
                error = %e,
                known = ?known_modules(),
                "Failed to start optional module, skipping"
            ),
        }
    }
}

fn start_module(ctx: &Arc<CoreContext>, name: &str) -> Result<(), ModuleError> {
    match name {
        "queue-monitor" => {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                interval.tick().await;
                loop {
                    interval.tick().await;
                    let stats = ctx.data_log().stats();
                    if ctx.data_log().is_filling() {
                        warn!(queued = stats.queued, capacity = stats.capacity, "Data log queue is filling");
                    }
                    info!(
                        submitted = stats.submitted,
                        stored = stats.stored,
                        dropped = stats.dropped,
                        write_failures = stats.write_failures,
                        "Data log queue stats"
                    );
                }
            });
            Ok(())
        }
        "vehicle-summary" => {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                interval.tick().await;
                loop {
                    interval.tick().await;
                    let tracked = ctx.vehicles().read().await.len();
                    info!(
                        tracked,
                        stale = ctx.timeout_monitor().stale_count(),
                        "Vehicle tracking summary"
                    );
                }
            });
            Ok(())
        }
        other => Err(ModuleError::Unknown(other.to_string())),
    }
}
