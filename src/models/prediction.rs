use super::{Competitor, TimeKey};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::cmp::Ordering;

/// A persisted forecast and, once reported, the observed price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub observation_id: String,
    pub sku: String,
    pub time_key: TimeKey,
    pub competitor: Competitor,
    pub predicted_price: f64,
    pub actual_price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PredictionRecord {
    /// Create a new unresolved record stamped with the current time, at the
    /// microsecond precision the database keeps
    pub fn new(
        observation_id: String,
        sku: String,
        time_key: TimeKey,
        competitor: Competitor,
        predicted_price: f64,
    ) -> Self {
        Self {
            observation_id,
            sku,
            time_key,
            competitor,
            predicted_price,
            actual_price: None,
            created_at: Utc::now().trunc_subsecs(6),
            updated_at: None,
        }
    }

    /// Check if the actual price has been recorded
    pub fn is_resolved(&self) -> bool {
        self.actual_price.is_some()
    }

    /// Whether `other` is the same forecast write, as opposed to a different
    /// record that happens to share the observation id
    pub fn is_same_forecast(&self, other: &Self) -> bool {
        self.observation_id == other.observation_id
            && self.sku == other.sku
            && self.time_key == other.time_key
            && self.competitor == other.competitor
            && self.predicted_price == other.predicted_price
            && self.created_at == other.created_at
    }

    /// Absolute forecast error, available once resolved
    pub fn absolute_error(&self) -> Option<f64> {
        self.actual_price.map(|actual| (actual - self.predicted_price).abs())
    }

    /// Listing order: newest `time_key` first, then newest `created_at`,
    /// then `observation_id` descending so equal timestamps stay deterministic.
    pub fn listing_order(a: &Self, b: &Self) -> Ordering {
        b.time_key
            .cmp(&a.time_key)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.observation_id.cmp(&a.observation_id))
    }
}

/// Row shape of the `prediction_prices` table
#[derive(Debug, Clone, FromRow)]
pub struct PredictionRow {
    pub observation_id: String,
    pub sku: String,
    pub time_key: i32,
    pub competitor: String,
    pub predicted_price: f64,
    pub actual_price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<PredictionRow> for PredictionRecord {
    type Error = String;

    fn try_from(row: PredictionRow) -> Result<Self, Self::Error> {
        let time_key = TimeKey::from_i64(i64::from(row.time_key))
            .map_err(|e| format!("{}: {}", row.observation_id, e))?;
        let competitor = row
            .competitor
            .parse::<Competitor>()
            .map_err(|e| format!("{}: {}", row.observation_id, e))?;
        if !row.predicted_price.is_finite() {
            return Err(format!("{}: non-finite predicted price", row.observation_id));
        }

        Ok(Self {
            observation_id: row.observation_id,
            sku: row.sku,
            time_key,
            competitor,
            predicted_price: row.predicted_price,
            actual_price: row.actual_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, time_key: i64) -> PredictionRecord {
        PredictionRecord::new(
            id.to_string(),
            "4443".to_string(),
            TimeKey::from_i64(time_key).unwrap(),
            Competitor::A,
            120.0,
        )
    }

    #[test]
    fn test_new_record_is_unresolved() {
        let r = record("obs-1", 20250520);
        assert!(!r.is_resolved());
        assert!(r.updated_at.is_none());
        assert_eq!(r.absolute_error(), None);
    }

    #[test]
    fn test_same_forecast_ignores_resolution() {
        let forecast = record("obs-1", 20250520);
        let mut resolved = forecast.clone();
        resolved.actual_price = Some(126.0);
        resolved.updated_at = Some(Utc::now());
        assert!(forecast.is_same_forecast(&resolved));

        let mut other = forecast.clone();
        other.created_at = forecast.created_at + Duration::microseconds(1);
        assert!(!forecast.is_same_forecast(&other));
        assert!(!forecast.is_same_forecast(&record("obs-1", 20250521)));
    }

    #[test]
    fn test_created_at_has_microsecond_precision() {
        let r = record("obs-1", 20250520);
        assert_eq!(r.created_at.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_absolute_error() {
        let mut r = record("obs-1", 20250520);
        r.actual_price = Some(126.0);
        assert_eq!(r.absolute_error(), Some(6.0));
    }

    #[test]
    fn test_listing_order() {
        let mut old_day = record("a", 20250519);
        let mut same_day_early = record("b", 20250520);
        let mut same_day_late = record("c", 20250520);
        let base = Utc::now();
        old_day.created_at = base + Duration::seconds(10);
        same_day_early.created_at = base;
        same_day_late.created_at = base + Duration::seconds(1);

        let mut records = vec![old_day, same_day_early, same_day_late];
        records.sort_by(PredictionRecord::listing_order);
        let ids: Vec<&str> = records.iter().map(|r| r.observation_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_row_conversion_rejects_bad_competitor() {
        let row = PredictionRow {
            observation_id: "obs-9".into(),
            sku: "1".into(),
            time_key: 20250520,
            competitor: "competitorZ".into(),
            predicted_price: 1.0,
            actual_price: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert!(PredictionRecord::try_from(row).is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let r = record("obs-1", 20250520);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["sku"], "4443");
        assert_eq!(json["time_key"], 20250520);
        assert_eq!(json["competitor"], "competitorA");
        assert!(json["actual_price"].is_null());
    }
}
