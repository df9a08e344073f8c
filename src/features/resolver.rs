use super::tables::STRUCTURE_LEVELS;
use super::{FeatureTables, FeatureVector};
use crate::error::{AppError, AppResult};
use crate::models::{Competitor, TimeKey};
use chrono::{Datelike, Weekday};
use std::sync::Arc;
use tracing::debug;

const CAMPAIGN_PREFIX: &str = "campaign_";
const LEAFLET_PREFIX: &str = "leaflet_";
const NO_LEAFLET: &str = "leaflet_none";

/// Derives model inputs from the immutable feature tables
#[derive(Debug, Clone)]
pub struct FeatureResolver {
    tables: Arc<FeatureTables>,
}

impl FeatureResolver {
    pub fn new(tables: FeatureTables) -> Self {
        Self {
            tables: Arc::new(tables),
        }
    }

    pub fn tables(&self) -> &FeatureTables {
        &self.tables
    }

    /// Resolve exactly the `required` features for one observation.
    ///
    /// Fails with `UnknownSku` only when the sku has no sales history; dates
    /// outside the historical range resolve normally. Features that cannot be
    /// derived take their neutral default.
    pub fn resolve(
        &self,
        sku: &str,
        time_key: TimeKey,
        competitor: Competitor,
        required: &[String],
    ) -> AppResult<FeatureVector> {
        let derived = self.derive(sku, time_key, competitor, required)?;

        let vector: FeatureVector = required
            .iter()
            .map(|name| {
                let value = derived.get(name).unwrap_or_else(|| default_value(name));
                (name.clone(), value)
            })
            .collect();

        debug!(
            "Resolved {} features for sku={} time_key={} competitor={} ({} defaulted)",
            vector.len(),
            sku,
            time_key,
            competitor,
            required.iter().filter(|n| !derived.contains(n)).count()
        );

        Ok(vector)
    }

    fn derive(
        &self,
        sku: &str,
        time_key: TimeKey,
        competitor: Competitor,
        required: &[String],
    ) -> AppResult<FeatureVector> {
        let structure = self
            .tables
            .structure(sku)
            .ok_or_else(|| AppError::UnknownSku(sku.to_string()))?;

        let date = time_key.date();
        let mut features = FeatureVector::new();

        let levels = structure.levels();
        for (i, code) in levels.iter().enumerate() {
            features.insert(format!("structure_level_{}", i + 1), *code as f64);
        }

        let weekday = date.weekday();
        features.insert("year", f64::from(date.year()));
        features.insert("month", f64::from(date.month()));
        features.insert("day_of_week", f64::from(weekday.num_days_from_monday()));
        features.insert(
            "is_weekend",
            if matches!(weekday, Weekday::Sat | Weekday::Sun) { 1.0 } else { 0.0 },
        );
        features.insert("is_promo_period", 0.0);

        let active_campaign = self.tables.active_campaign(competitor, date);
        for name in required {
            if let Some(campaign) = name.strip_prefix(CAMPAIGN_PREFIX) {
                let active = active_campaign == Some(campaign);
                features.insert(name.clone(), if active { 1.0 } else { 0.0 });
            } else if name.starts_with(LEAFLET_PREFIX) {
                features.insert(name.clone(), if name == NO_LEAFLET { 1.0 } else { 0.0 });
            }
        }

        if let Some(stats) = self.tables.price_stats(sku) {
            features.insert("mean_price", stats.mean);
            features.insert("std_price", stats.std);
            features.insert("min_price", stats.min);
            features.insert("max_price", stats.max);
        }

        for level in 0..STRUCTURE_LEVELS {
            if let Some(avg) = self.tables.level_avg_price(level, levels[level]) {
                features.insert(format!("structure_level_{}_avg_price", level + 1), avg);
            }
        }

        Ok(features)
    }
}

fn default_value(name: &str) -> f64 {
    if name == NO_LEAFLET {
        1.0
    } else {
        0.0
    }
}
