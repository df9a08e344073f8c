//! Per-competitor model registry.
//!
//! Models are loaded once by explicit initialization and held in a
//! fixed-size table indexed by `Competitor`; inference never mutates them.

pub mod linear;

pub use linear::LinearModel;

use crate::features::FeatureVector;
use crate::models::Competitor;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors raised while loading or evaluating a model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model artifact {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid model artifact: {0}")]
    Invalid(String),

    #[error("Model for {0} produced a non-finite prediction")]
    NonFinite(Competitor),
}

/// An inference-capable price model
pub trait PriceModel: Send + Sync + fmt::Debug {
    /// Names of the features this model reads
    fn required_features(&self) -> &[String];

    /// Predict a price from a resolved feature vector
    fn predict(&self, features: &FeatureVector) -> f64;
}

/// Immutable mapping competitor → model
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: [Arc<dyn PriceModel>; Competitor::COUNT],
}

impl ModelRegistry {
    /// Build a registry from one model per competitor, in `Competitor::ALL` order
    pub fn new(models: [Arc<dyn PriceModel>; Competitor::COUNT]) -> Self {
        Self { models }
    }

    /// Load `model_<competitor>.json` for every competitor from a directory
    pub fn load(dir: &Path) -> Result<Self, ModelError> {
        let load = |competitor: Competitor| -> Result<Arc<dyn PriceModel>, ModelError> {
            let path = dir.join(format!("model_{}.json", competitor.as_str()));
            let model = LinearModel::from_file(&path)?;
            info!(
                "Loaded model for {} from {:?} ({} features)",
                competitor,
                path,
                model.required_features().len()
            );
            Ok(Arc::new(model))
        };

        Ok(Self::new([load(Competitor::A)?, load(Competitor::B)?]))
    }

    pub fn model(&self, competitor: Competitor) -> &dyn PriceModel {
        self.models[competitor.index()].as_ref()
    }

    /// Run inference for one competitor; rejects non-finite output
    pub fn infer(&self, competitor: Competitor, features: &FeatureVector) -> Result<f64, ModelError> {
        let price = self.model(competitor).predict(features);
        if price.is_finite() {
            Ok(price)
        } else {
            Err(ModelError::NonFinite(competitor))
        }
    }
}
