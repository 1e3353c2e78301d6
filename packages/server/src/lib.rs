#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web facade over the data hub: dataset browsing, ingestion,
//! analytics, and chart projections behind one JSON envelope.

pub mod cache;
pub mod handlers;

use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{App, HttpServer, Scope, middleware, web};
use data_hub_store::StoreError;
use data_hub_store::db::{DataHubDb, connect_from_env};

use crate::cache::ResponseCache;

/// Errors that can keep the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The record store could not be opened.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Binding or running the HTTP server failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared per-worker state.
pub struct AppState {
    /// Handle to the record store.
    pub db: DataHubDb,
    /// TTL cache for describe and dashboard responses.
    pub cache: ResponseCache,
}

/// Where the server binds and which store it opens.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: String,
    /// Port to listen on.
    pub port: u16,
    /// Explicit store path; `None` defers to `DATA_HUB_DB_PATH`.
    pub db_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Reads `BIND_ADDR` and `PORT`, defaulting to `127.0.0.1:8080`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(8080),
            db_path: None,
        }
    }
}

/// All `/api` routes.
///
/// `visualize/timeseries` registers before the generic
/// `visualize/{chart_kind}` so it is never captured as a chart kind.
pub fn api_scope() -> Scope {
    web::scope("/api")
        .route("/health", web::get().to(handlers::health))
        .route("/datasets", web::get().to(handlers::datasets))
        .route("/dataset/{id}", web::get().to(handlers::dataset_detail))
        .route(
            "/dataset/{id}/records",
            web::get().to(handlers::dataset_records),
        )
        .route(
            "/dataset/{id}/query",
            web::post().to(handlers::dataset_query),
        )
        .route("/ingest/api", web::post().to(handlers::ingest_api))
        .route("/ingest/file", web::post().to(handlers::ingest_file))
        .route(
            "/analytics/statistical/{id}",
            web::get().to(handlers::analytics_statistical),
        )
        .route(
            "/analytics/trend/{id}",
            web::get().to(handlers::analytics_trend),
        )
        .route(
            "/analytics/summary/{id}",
            web::get().to(handlers::analytics_summary),
        )
        .route(
            "/analytics/describe/{id}",
            web::get().to(handlers::analytics_describe),
        )
        .route("/analyses/{id}", web::get().to(handlers::analyses_history))
        .route(
            "/analysis/{analysis_id}",
            web::get().to(handlers::analysis_detail),
        )
        .route(
            "/visualize/timeseries/{id}",
            web::get().to(handlers::visualize_timeseries),
        )
        .route(
            "/visualize/{chart_kind}/{id}",
            web::get().to(handlers::visualize_chart),
        )
        .route("/dashboard/{id}", web::get().to(handlers::dashboard))
}

/// Opens the record store and serves the API until shutdown.
///
/// # Errors
///
/// Returns [`ServerError`] if the store cannot be opened or the bind
/// address is unavailable.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let db = match &config.db_path {
        Some(path) => DataHubDb::open(path)?,
        None => connect_from_env()?,
    };
    let state = web::Data::new(AppState {
        db,
        cache: ResponseCache::new(cache::DEFAULT_TTL),
    });

    log::info!(
        "Starting data hub server at http://{}:{}",
        config.bind_addr,
        config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .service(api_scope())
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
