#![allow(dead_code)]

use price_forecast::config::RetryConfig;
use price_forecast::error::{StoreError, StoreResult};
use price_forecast::features::{
    Campaign, FeatureResolver, FeatureTables, FeatureVector, PriceObservation, SkuStructure,
};
use price_forecast::models::{Competitor, PredictionRecord, TimeKey, TimeKeyInput};
use price_forecast::registry::{LinearModel, ModelRegistry, PriceModel};
use price_forecast::repositories::{MemoryRecordStore, RecordStore};
use price_forecast::services::{ForecastRequest, PredictionService};
use price_forecast::AppState;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Predicted price of sku 4443 for competitorA on a weekday
pub const SKU_4443_PRICE_A: f64 = 121.0;
/// Predicted price of sku 4443 for competitorB
pub const SKU_4443_PRICE_B: f64 = 126.0;

/// Model wrapper counting inference calls
#[derive(Debug)]
pub struct CountingModel {
    inner: LinearModel,
    calls: Arc<AtomicUsize>,
}

impl PriceModel for CountingModel {
    fn required_features(&self) -> &[String] {
        self.inner.required_features()
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.predict(features)
    }
}

/// Record store that fails the first `failures` calls as unavailable
/// and counts every call it receives
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryRecordStore,
    failures_left: AtomicUsize,
    lost_acks_left: AtomicUsize,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            ..Self::default()
        }
    }

    /// Commits the first `lost` successful inserts, then reports them as
    /// unavailable, as when the response is lost after the write
    pub fn losing_acks(lost: usize) -> Self {
        Self {
            lost_acks_left: AtomicUsize::new(lost),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryRecordStore {
        &self.inner
    }

    fn enter(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(StoreError::Unavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for FlakyStore {
    async fn insert(&self, record: &PredictionRecord) -> StoreResult<PredictionRecord> {
        self.enter()?;
        let inserted = self.inner.insert(record).await?;
        let lost = self
            .lost_acks_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return Err(StoreError::Unavailable("connection reset after commit".to_string()));
        }
        Ok(inserted)
    }

    async fn get(&self, observation_id: &str) -> StoreResult<Option<PredictionRecord>> {
        self.enter()?;
        self.inner.get(observation_id).await
    }

    async fn find_latest_by_key(
        &self,
        sku: &str,
        time_key: TimeKey,
        competitor: Competitor,
    ) -> StoreResult<Option<PredictionRecord>> {
        self.enter()?;
        self.inner.find_latest_by_key(sku, time_key, competitor).await
    }

    async fn resolve_actual(
        &self,
        observation_id: &str,
        actual_price: f64,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<PredictionRecord> {
        self.enter()?;
        self.inner.resolve_actual(observation_id, actual_price, updated_at).await
    }

    async fn list_ordered(&self) -> StoreResult<Vec<PredictionRecord>> {
        self.enter()?;
        self.inner.list_ordered().await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.enter()
    }
}

/// Service wired to a store, in-code models and feature tables
pub struct TestHarness<S> {
    pub state: Arc<AppState<S>>,
    pub store: Arc<S>,
    pub inferences: Arc<AtomicUsize>,
}

impl<S: RecordStore> TestHarness<S> {
    pub fn service(&self) -> &PredictionService<S> {
        &self.state.predictions
    }

    pub fn inference_count(&self) -> usize {
        self.inferences.load(Ordering::SeqCst)
    }
}

/// Harness over a fresh in-memory store
pub fn harness() -> TestHarness<MemoryRecordStore> {
    harness_with(MemoryRecordStore::new(), RetryConfig::none())
}

/// Harness over any store with an explicit retry policy
pub fn harness_with<S: RecordStore>(store: S, retry: RetryConfig) -> TestHarness<S> {
    let inferences = Arc::new(AtomicUsize::new(0));
    let store = Arc::new(store);
    let service = PredictionService::new(
        store.clone(),
        Arc::new(sample_registry(inferences.clone())),
        FeatureResolver::new(sample_tables()),
    )
    .with_retry(RetryConfig {
        backoff_ms: 1,
        ..retry
    });

    TestHarness {
        state: Arc::new(AppState::from_service(service)),
        store,
        inferences,
    }
}

/// competitorA: 1 + mean_price + 2 * is_weekend; competitorB: 1.05 * mean_price
pub fn sample_registry(calls: Arc<AtomicUsize>) -> ModelRegistry {
    let model_a = LinearModel::new(
        vec!["mean_price".into(), "is_weekend".into()],
        1.0,
        HashMap::from([("mean_price".to_string(), 1.0), ("is_weekend".to_string(), 2.0)]),
    )
    .expect("valid model A");
    let model_b = LinearModel::new(
        vec!["mean_price".into(), "campaign_summer".into()],
        0.0,
        HashMap::from([("mean_price".to_string(), 1.05), ("campaign_summer".to_string(), -10.0)]),
    )
    .expect("valid model B");

    ModelRegistry::new([
        Arc::new(CountingModel {
            inner: model_a,
            calls: calls.clone(),
        }),
        Arc::new(CountingModel {
            inner: model_b,
            calls,
        }),
    ])
}

/// Skus 4443 (prices 118, 122) and 6001 (no price history)
pub fn sample_tables() -> FeatureTables {
    let structure = |sku: &str, base: i64| SkuStructure {
        sku: sku.to_string(),
        structure_level_1: base,
        structure_level_2: base * 10,
        structure_level_3: base * 100,
        structure_level_4: base * 1000,
    };

    FeatureTables::from_parts(
        vec![structure("4443", 1), structure("6001", 6)],
        vec![
            PriceObservation {
                sku: "4443".into(),
                target_price: 118.0,
            },
            PriceObservation {
                sku: "4443".into(),
                target_price: 122.0,
            },
        ],
        vec![Campaign {
            competitor: "competitorB".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 7, 1).expect("valid date"),
            end_date: NaiveDate::from_ymd_opt(2025, 7, 31).expect("valid date"),
            chain_campaign: "summer".into(),
        }],
    )
    .expect("valid feature tables")
}

/// Repository root holding the sample `models/` and `data/` artifacts
pub fn artifacts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn request(
    sku: &str,
    time_key: impl Into<TimeKeyInput>,
    competitor: &str,
    observation_id: Option<&str>,
) -> ForecastRequest {
    ForecastRequest {
        sku: sku.to_string(),
        time_key: time_key.into(),
        competitor: competitor.to_string(),
        observation_id: observation_id.map(str::to_string),
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {} to be close to {}",
        actual,
        expected
    );
}
