//! The service endpoints exposed to remote callers.
//!
//! Every group takes the already-initialized shared state; the router is
//! only assembled after mandatory modules are running and the historical
//! caches have been populated, so no handler can observe a partially
//! initialized process.

pub mod analysis;
pub mod caches;
pub mod commands;
pub mod config_readback;
pub mod error;
pub mod predictions;
pub mod status;
pub mod vehicles;

pub use error::{bad_request, internal_error, not_found, ErrorResponse};

use std::sync::Arc;

use axum::Router;

use crate::cache::{StopEventCache, TripHistoryCache};
use crate::core::CoreContext;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<CoreContext>,
    pub trip_history: Arc<TripHistoryCache>,
    pub stop_events: Arc<StopEventCache>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/predictions", predictions::router(state.clone()))
        .nest("/vehicles", vehicles::router(state.clone()))
        .nest("/config", config_readback::router(state.clone()))
        .nest("/status", status::router(state.clone()))
        .nest("/commands", commands::router(state.clone()))
        .nest("/caches", caches::router(state.clone()))
        .nest("/analysis", analysis::router(state))
}
