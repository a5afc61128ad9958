mod admin;
mod api_budget;
mod barangay;
mod boundary;
mod cache;
mod config;
mod error;
mod extractors;
mod fallback;
mod hub;
mod openapi;
mod prediction;
mod refresh;
mod routes;
mod weather;

use axum::{error_handling::HandleErrorLayer, http::StatusCode, BoxError};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::admin::AdminService;
use crate::barangay::BarangayRegistry;
use crate::boundary::BoundaryService;
use crate::cache::{create_weekly_cache, start_cache_purge_task};
use crate::config::AppConfig;
use crate::fallback::FallbackPolicy;
use crate::hub::ForecastHub;
use crate::prediction::{HttpPredictionBackend, PredictionService};
use crate::weather::{WeatherService, WeatherSettings};

/// Shared HTTP client configuration
const HTTP_TIMEOUT_SECS: u64 = 30;
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 5;
const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Outer bound for any request; model retraining is the slowest path
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<BarangayRegistry>,
    pub weather_service: Arc<WeatherService>,
    pub prediction_service: Arc<PredictionService>,
    pub admin_service: Arc<AdminService>,
    pub hub: Arc<ForecastHub>,
    pub metrics: PrometheusHandle,
}

/// Create shared HTTP client with connection pooling
fn create_http_client() -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
        .pool_max_idle_per_host(10)
        .build()
}

/// Handle request timeout errors
async fn handle_timeout_error(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {}", err),
        )
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moskita=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;
    let tz = config.location.tz()?;
    let policy = FallbackPolicy::from(&config.timeouts);
    tracing::info!(
        location = %config.location.name,
        backend = %config.backend_url,
        "Configuration loaded successfully"
    );

    let metrics = PrometheusBuilder::new().install_recorder()?;

    // Create shared HTTP client with connection pooling
    let http_client = create_http_client()?;
    tracing::debug!("Shared HTTP client created");

    let registry = Arc::new(BarangayRegistry::from_config(&config.barangays));
    tracing::info!(barangays = registry.len(), "Barangay registry loaded");

    let weather_service = Arc::new(WeatherService::new(
        http_client.clone(),
        WeatherSettings {
            api_key: config.weather_api_key().map(str::to_string),
            base_url: config.openweathermap_url.clone(),
            location: config.location.name.clone(),
            lat: config.location.lat,
            lon: config.location.lon,
            tz,
            timeout: policy.call_timeout,
            daily_limit: config.weather_daily_limit,
        },
    ));

    if weather_service.has_provider() {
        tracing::info!(
            daily_limit = config.weather_daily_limit,
            "Weather provider configured"
        );
    } else {
        tracing::info!("No weather provider key, serving simulated weather");
    }

    let weekly_cache = create_weekly_cache(config.refresh.predictions_interval());
    start_cache_purge_task(
        Arc::clone(&weekly_cache),
        config.refresh.predictions_interval(),
    );

    let prediction_service = Arc::new(PredictionService::new(
        Arc::new(HttpPredictionBackend::new(
            http_client.clone(),
            &config.backend_url,
        )),
        Arc::clone(&weather_service),
        Arc::clone(&registry),
        policy,
        weekly_cache,
    ));

    {
        let prediction_service = Arc::clone(&prediction_service);
        tokio::spawn(async move { prediction_service.log_backend_barangays().await });
    }

    let boundary_service = Arc::new(BoundaryService::new(
        http_client.clone(),
        config.overpass_url.clone(),
        config.location.area.clone(),
        Arc::clone(&registry),
        policy.call_timeout,
    ));

    let admin_service = Arc::new(AdminService::new(
        http_client,
        &config.backend_url,
        Arc::clone(&registry),
        tz,
        policy.call_timeout,
    ));

    let hub = Arc::new(ForecastHub::new(
        Arc::clone(&registry),
        Arc::clone(&weather_service),
        Arc::clone(&prediction_service),
        boundary_service,
    ));

    // Refreshes stop when these are dropped at the end of main
    let subscriptions = hub.start(&config.refresh);
    tracing::info!(refreshes = subscriptions.len(), "Snapshot refreshes started");

    // Create shared application state
    let state = AppState {
        registry,
        weather_service,
        prediction_service,
        admin_service,
        hub,
        metrics,
    };

    let app = routes::build_router()
        .layer(
            ServiceBuilder::new()
                // Handle timeout errors
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
        )
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    drop(subscriptions);
    tracing::info!("Server shutdown complete");

    Ok(())
}
