//! Price Forecast Backend Library
//!
//! Serves per-competitor price forecasts, persists every prediction as an
//! auditable record and accepts the observed price later for evaluation.

pub mod config;
pub mod database;
pub mod error;
pub mod features;
pub mod http;
pub mod models;
pub mod registry;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use features::FeatureResolver;
use registry::ModelRegistry;
use repositories::RecordStore;
use services::PredictionService;
use std::sync::Arc;

/// Application state shared by all request handlers
pub struct AppState<S> {
    pub predictions: PredictionService<S>,
}

impl<S: RecordStore> AppState<S> {
    /// Create a new AppState around an initialized store, registry and resolver
    pub fn new(store: Arc<S>, registry: Arc<ModelRegistry>, resolver: FeatureResolver) -> Self {
        Self {
            predictions: PredictionService::new(store, registry, resolver),
        }
    }

    pub fn from_service(predictions: PredictionService<S>) -> Self {
        Self { predictions }
    }
}
