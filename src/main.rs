mod api;
mod cache;
mod clock;
mod config;
mod core;
mod db;
mod error;
mod models;
mod modules;
mod persist;
mod revision;
mod schedule;

use std::sync::Arc;

use axum::{routing::get, Router};
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::AppState;
use crate::cache::{StopEventCache, TripHistoryCache};
use crate::config::Config;
use crate::core::CoreContext;

#[derive(Debug, Parser)]
#[command(
    name = "transitd",
    version,
    about = "Real-time transit vehicle tracking and prediction core"
)]
struct Args {
    /// Configuration revision to load. If not set, the active revision
    /// stored in the database for the agency is used.
    #[arg(long = "config-rev")]
    config_rev: Option<i32>,
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "config.yaml")]
    config: std::path::PathBuf,
}

#[derive(OpenApi)]
#[openapi(
    info(title = "transitd API", version = "0.1.0"),
    paths(
        api::predictions::predictions_by_vehicle,
        api::predictions::predictions_by_stop,
        api::vehicles::list_vehicles,
        api::vehicles::get_vehicle,
        api::config_readback::get_config_info,
        api::config_readback::list_routes,
        api::config_readback::get_route_schedules,
        api::status::get_status,
        api::commands::submit_avl_report,
        api::commands::enable_playback,
        api::commands::reset_vehicle,
        api::caches::list_caches,
        api::caches::get_trip_history,
        api::caches::get_stop_events,
        api::analysis::get_analysis_summary,
    ),
    components(schemas(
        api::ErrorResponse,
        api::predictions::PredictionListResponse,
        api::vehicles::VehicleListResponse,
        api::config_readback::ConfigInfoResponse,
        api::config_readback::RouteListResponse,
        api::config_readback::ScheduleListResponse,
        api::status::ServerStatusResponse,
        api::commands::CommandResponse,
        api::commands::EnablePlaybackRequest,
        api::commands::ResetVehicleRequest,
        api::caches::CacheSummary,
        api::caches::CacheListResponse,
        api::caches::CacheEventsResponse,
        api::analysis::AnalysisSummaryResponse,
        api::analysis::RouteEventStats,
        cache::HistoricalEvent,
        cache::vehicles::VehicleState,
        cache::vehicles::Prediction,
        models::Route,
        models::AvlReport,
        persist::QueueStats,
        schedule::IpcSchedule,
        schedule::IpcScheduleTrip,
        schedule::IpcStopTime,
    )),
    tags(
        (name = "predictions", description = "Arrival/departure predictions"),
        (name = "vehicles", description = "Live vehicle locations"),
        (name = "config", description = "Configuration readback and schedules"),
        (name = "status", description = "Server status"),
        (name = "commands", description = "Operator commands"),
        (name = "caches", description = "Historical cache inspection"),
        (name = "analysis", description = "Prediction analysis")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // --help prints usage and exits 0 before anything starts; a bad
    // argument exits non-zero. Both are handled by clap inside parse().
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info,sqlx=warn".into()),
        )
        .init();

    if let Err(e) = run(args).await {
        tracing::error!(error = %e, "Fatal startup failure");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&args.config)?;
    tracing::info!(agency = %config.agency_id, "Loaded configuration");

    // Construct the core: revision resolution, timezone, snapshot, data
    // log queue, mandatory modules. Any precondition failure is fatal.
    let ctx = CoreContext::create(&config, args.config_rev).await?;

    // Populate the historical caches before any endpoint can observe
    // them, one bounded chunk at a time.
    let trip_history = Arc::new(TripHistoryCache::new());
    let stop_events = Arc::new(StopEventCache::new());
    let today = ctx.time().service_date(ctx.clock().now_ms());
    cache::populate(ctx.db(), trip_history.as_ref(), &config.history, today).await;
    cache::populate(ctx.db(), stop_events.as_ref(), &config.history, today).await;

    // Optional modules come after the mandatory subsystems and caches.
    modules::start_optional_modules(&ctx, &config.optional_modules);

    let state = AppState {
        ctx,
        trip_history,
        stop_events,
    };

    let mut app = Router::new()
        .route("/", get(root))
        .nest("/api", api::router(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode explicitly enabled (all origins allowed) - DO NOT USE IN PRODUCTION");
        app = app.layer(CorsLayer::permissive());
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Service endpoints listening");
    tracing::info!("Swagger UI: /swagger-ui");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn root() -> &'static str {
    "transitd"
}
