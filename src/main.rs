//! Price Forecast Backend Service
//!
//! Main entry point. Loads the per-competitor models and feature tables,
//! connects the record store and serves the HTTP API.

use price_forecast::config::AppConfig;
use price_forecast::database::{create_pool, run_migrations};
use price_forecast::error::{AppError, AppResult};
use price_forecast::features::{FeatureResolver, FeatureTables};
use price_forecast::registry::ModelRegistry;
use price_forecast::repositories::{MemoryRecordStore, PredictionRepository, StoreBackend};
use price_forecast::services::{AuditTrailService, PredictionService};
use price_forecast::{http, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    init_tracing(&config);

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Price Forecast Service Starting                ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("HTTP port: {}", config.http_port);

    // =========================================================================
    // MODELS AND FEATURES
    // =========================================================================
    info!("Loading models from {:?}...", config.models_dir);
    let registry = Arc::new(ModelRegistry::load(&config.models_dir).map_err(|e| {
        error!("Failed to load models: {}", e);
        AppError::Model(e)
    })?);
    info!("✓ Model registry initialized");

    info!("Loading feature tables from {:?}...", config.features_dir);
    let tables = FeatureTables::load(&config.features_dir).map_err(|e| {
        error!("Failed to load feature tables: {}", e);
        AppError::Features(e)
    })?;
    let resolver = FeatureResolver::new(tables);
    info!("✓ Feature resolver initialized ({} skus)", resolver.tables().sku_count());

    // =========================================================================
    // RECORD STORE
    // =========================================================================
    let store = if config.database.is_memory() {
        warn!("DATABASE_URL selects the in-memory store; records are lost on exit");
        StoreBackend::Memory(MemoryRecordStore::new())
    } else {
        info!("Connecting to database...");
        let pool = create_pool(&config.database).await.map_err(|e| {
            error!("Failed to create database pool: {}", e);
            AppError::Database(e)
        })?;
        info!("Database connection pool created (max connections: {})", config.database.max_connections);

        if config.database.run_migrations {
            info!("Running database migrations...");
            run_migrations(&pool, None).await.map_err(|e| {
                error!("Database migration failed: {}", e);
                AppError::Database(e)
            })?;
            info!("Database migrations completed successfully");
        }

        StoreBackend::Postgres(PredictionRepository::new(pool))
    };
    info!("✓ Record store ready ({})", store.name());

    // =========================================================================
    // SERVICES
    // =========================================================================
    let mut predictions = PredictionService::new(Arc::new(store), registry, resolver)
        .with_retry(config.retry);

    if let Some(dir) = &config.audit_log_dir {
        let audit = AuditTrailService::new(dir).map_err(|e| {
            error!("Failed to initialize audit trail: {}", e);
            AppError::Message(format!("Audit trail initialization failed: {}", e))
        })?;
        predictions = predictions.with_audit(Arc::new(audit));
        info!("✓ Audit trail service initialized");
    } else {
        warn!("AUDIT_LOG_DIR not configured - audit trail disabled");
    }

    let state = Arc::new(AppState::from_service(predictions));
    let app = http::router(state);

    // =========================================================================
    // START SERVER
    // =========================================================================
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind HTTP server on {}: {}", addr, e)))?;

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Price Forecast Service Ready!                  ║");
    info!("╠══════════════════════════════════════════════════════════╣");
    info!("║  HTTP API:     {}", addr);
    info!("║  Environment:  {}", config.environment);
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Price forecast service shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "price_forecast={level},price_forecast_backend={level},sqlx=warn,axum=info",
            level = config.log_level
        )
        .into()
    });

    if config.is_production() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        // Keep serving; the process manager can still terminate us
        futures::future::pending::<()>().await;
    }
    info!("Shutdown signal received, shutting down gracefully...");
}
