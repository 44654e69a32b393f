mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::feed::AblyFeedClient;
use services::runner::JobRunner;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing trend-harvest server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "collection_jobs_submitted",
        "Total collection jobs submitted"
    );
    metrics::describe_counter!(
        "collection_jobs_completed",
        "Total collection jobs that succeeded"
    );
    metrics::describe_counter!(
        "collection_jobs_failed",
        "Total collection jobs that failed"
    );
    metrics::describe_counter!(
        "collection_products_collected",
        "Total products fully collected across all jobs"
    );
    metrics::describe_histogram!(
        "collection_job_seconds",
        "Time to run a collection job to a terminal state"
    );
    metrics::describe_gauge!(
        "collection_jobs_in_flight",
        "Collection jobs currently running"
    );

    // Initialize database
    tracing::info!("Connecting to SQLite job store");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to open database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize the upstream feed client and the job runner
    tracing::info!("Initializing feed client");
    let feed = AblyFeedClient::new(&config).expect("Failed to initialize feed client");
    let runner = JobRunner::new(db_pool.clone(), Arc::new(feed));

    let state = AppState::new(db_pool, runner);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/v1/categories", get(routes::products::list_categories))
        .route("/v1/products", get(routes::products::list_products))
        .route("/v1/jobs", post(routes::jobs::submit_job))
        .route("/v1/jobs", get(routes::jobs::list_jobs))
        .route("/v1/jobs/{job_id}", get(routes::jobs::get_job))
        .route("/v1/jobs/{job_id}/result", get(routes::jobs::get_job_result))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Internal tool: the frontend may call from another origin.
        .layer(CorsLayer::permissive());

    tracing::info!("Starting trend-harvest on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
