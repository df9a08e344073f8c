//! Feature resolution for per-competitor price models.
//!
//! Feature tables are produced offline and loaded once at start-up; the
//! resolver derives a named feature vector for one (sku, date, competitor).

pub mod resolver;
pub mod tables;

pub use resolver::FeatureResolver;
pub use tables::{Campaign, FeatureTables, PriceObservation, PriceStats, SkuStructure};

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while loading feature tables
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Failed to read feature table {path}: {source}")]
    Table {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid feature data: {0}")]
    Invalid(String),
}

/// Named numeric model inputs for one observation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureVector(BTreeMap<String, f64>);

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
