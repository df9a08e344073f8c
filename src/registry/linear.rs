use super::{ModelError, PriceModel};
use crate::features::FeatureVector;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Linear regression exported from the offline training pipeline
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinearModel {
    features: Vec<String>,
    intercept: f64,
    coefficients: HashMap<String, f64>,
}

impl LinearModel {
    pub fn new(
        features: Vec<String>,
        intercept: f64,
        coefficients: HashMap<String, f64>,
    ) -> Result<Self, ModelError> {
        let model = Self {
            features,
            intercept,
            coefficients,
        };
        model.validate()?;
        Ok(model)
    }

    /// Read a JSON artifact: `{"features": [...], "intercept": f, "coefficients": {...}}`
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model: Self = serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if !self.intercept.is_finite() {
            return Err(ModelError::Invalid("intercept must be finite".to_string()));
        }
        for (name, weight) in &self.coefficients {
            if !self.features.contains(name) {
                return Err(ModelError::Invalid(format!(
                    "coefficient for undeclared feature '{}'",
                    name
                )));
            }
            if !weight.is_finite() {
                return Err(ModelError::Invalid(format!(
                    "coefficient for '{}' must be finite",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl PriceModel for LinearModel {
    fn required_features(&self) -> &[String] {
        &self.features
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        self.features.iter().fold(self.intercept, |acc, name| {
            let weight = self.coefficients.get(name).copied().unwrap_or(0.0);
            acc + weight * features.get(name).unwrap_or(0.0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_weighted_sum() {
        let model = LinearModel::new(
            vec!["mean_price".into(), "is_weekend".into()],
            2.0,
            HashMap::from([("mean_price".to_string(), 0.5), ("is_weekend".to_string(), -1.0)]),
        )
        .unwrap();

        let features: FeatureVector = [("mean_price".to_string(), 100.0), ("is_weekend".to_string(), 1.0)]
            .into_iter()
            .collect();
        assert_eq!(model.predict(&features), 51.0);
    }

    #[test]
    fn test_missing_feature_counts_as_zero() {
        let model = LinearModel::new(
            vec!["a".into()],
            5.0,
            HashMap::from([("a".to_string(), 3.0)]),
        )
        .unwrap();
        assert_eq!(model.predict(&FeatureVector::new()), 5.0);
    }

    #[test]
    fn test_rejects_undeclared_coefficient() {
        let result = LinearModel::new(vec![], 0.0, HashMap::from([("ghost".to_string(), 1.0)]));
        assert!(matches!(result, Err(ModelError::Invalid(_))));
    }

    #[test]
    fn test_parse_error_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(LinearModel::from_file(&path), Err(ModelError::Parse { .. })));
    }
}
