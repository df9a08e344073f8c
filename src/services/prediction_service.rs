use crate::config::RetryConfig;
use crate::error::{AppError, AppResult, StoreError, StoreResult};
use crate::features::FeatureResolver;
use crate::models::{Competitor, PredictionRecord, TimeKey, TimeKeyInput};
use crate::registry::ModelRegistry;
use crate::repositories::RecordStore;
use crate::services::AuditTrailService;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Regeneration budget for server-assigned observation ids
const MAX_ID_ATTEMPTS: usize = 3;

/// Forecast request as received from a client
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastRequest {
    pub sku: String,
    #[serde(alias = "date")]
    pub time_key: TimeKeyInput,
    pub competitor: String,
    #[serde(default)]
    pub observation_id: Option<String>,
}

/// Orchestrates feature resolution, inference and persistence of forecasts
pub struct PredictionService<S> {
    store: Arc<S>,
    registry: Arc<ModelRegistry>,
    resolver: FeatureResolver,
    audit: Option<Arc<AuditTrailService>>,
    retry: RetryConfig,
}

impl<S: RecordStore> PredictionService<S> {
    pub fn new(store: Arc<S>, registry: Arc<ModelRegistry>, resolver: FeatureResolver) -> Self {
        Self {
            store,
            registry,
            resolver,
            audit: None,
            retry: RetryConfig::default(),
        }
    }

    /// Record every write in an audit trail
    pub fn with_audit(mut self, audit: Arc<AuditTrailService>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Set the retry policy for transient store failures
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Forecast one competitor's price and persist the prediction.
    ///
    /// Date, competitor and identifier validation happen before inference and
    /// before any store access. A client-supplied id that already exists fails
    /// with `DuplicateObservation`.
    pub async fn forecast(&self, request: ForecastRequest) -> AppResult<PredictionRecord> {
        let time_key = request.time_key.normalize()?;
        let competitor = request.competitor.parse::<Competitor>()?;
        let sku = validate_sku(&request.sku)?;
        let observation_id = request
            .observation_id
            .as_deref()
            .map(validate_observation_id)
            .transpose()?;

        let predicted_price = self.predict(sku, time_key, competitor)?;

        let record = match observation_id {
            Some(id) => {
                let record = PredictionRecord::new(
                    id.to_string(),
                    sku.to_string(),
                    time_key,
                    competitor,
                    predicted_price,
                );
                self.insert_record(&record).await?
            }
            None => self.insert_generated(sku, time_key, competitor, predicted_price).await?,
        };

        info!(
            "Forecast {} sku={} time_key={} competitor={} price={:.4}",
            record.observation_id, record.sku, record.time_key, record.competitor, record.predicted_price
        );
        self.audit_created(&record).await;

        Ok(record)
    }

    /// Forecast every competitor for one sku and date.
    ///
    /// All inference runs before the first write, so an unknown sku or a bad
    /// date never leaves a partial set of records.
    pub async fn forecast_all(&self, sku: &str, time_key: &TimeKeyInput) -> AppResult<Vec<PredictionRecord>> {
        let time_key = time_key.normalize()?;
        let sku = validate_sku(sku)?;

        let mut prices = Vec::with_capacity(Competitor::COUNT);
        for competitor in Competitor::ALL {
            prices.push((competitor, self.predict(sku, time_key, competitor)?));
        }

        let mut records = Vec::with_capacity(prices.len());
        for (competitor, price) in prices {
            let record = self.insert_generated(sku, time_key, competitor, price).await?;
            info!(
                "Forecast {} sku={} time_key={} competitor={} price={:.4}",
                record.observation_id, record.sku, record.time_key, record.competitor, record.predicted_price
            );
            self.audit_created(&record).await;
            records.push(record);
        }

        Ok(records)
    }

    /// Record the observed price of a forecast.
    ///
    /// Only the first update succeeds; later ones fail with `AlreadyResolved`
    /// and leave the stored price untouched.
    pub async fn update_actual(&self, observation_id: &str, actual_price: f64) -> AppResult<PredictionRecord> {
        validate_actual_price(actual_price)?;

        let updated_at = chrono::Utc::now();
        let record = self
            .call_store("resolve_actual", || {
                self.store.resolve_actual(observation_id, actual_price, updated_at)
            })
            .await?;

        info!(
            "Actual price recorded for {}: predicted={:.4} actual={:.4}",
            record.observation_id, record.predicted_price, actual_price
        );
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_actual_recorded(&record).await {
                warn!("Failed to audit actual price for {}: {}", record.observation_id, e);
            }
        }

        Ok(record)
    }

    /// Record the observed price against the latest forecast for a natural key
    pub async fn update_actual_by_key(
        &self,
        sku: &str,
        time_key: &TimeKeyInput,
        competitor: &str,
        actual_price: f64,
    ) -> AppResult<PredictionRecord> {
        let time_key = time_key.normalize()?;
        let competitor = competitor.parse::<Competitor>()?;
        let sku = validate_sku(sku)?;
        validate_actual_price(actual_price)?;

        let latest = self.latest_by_key(sku, time_key, competitor).await?;
        self.update_actual(&latest.observation_id, actual_price).await
    }

    /// Record observed prices for several competitors of one sku and date.
    ///
    /// Every price is validated and every target record located before the
    /// first write, so a bad entry never leaves the others applied.
    pub async fn update_actuals_by_key(
        &self,
        sku: &str,
        time_key: &TimeKeyInput,
        actuals: &[(Competitor, f64)],
    ) -> AppResult<Vec<PredictionRecord>> {
        let time_key = time_key.normalize()?;
        let sku = validate_sku(sku)?;
        if actuals.is_empty() {
            return Err(AppError::InvalidValue(
                "at least one actual price is required".to_string(),
            ));
        }
        for (_, actual_price) in actuals {
            validate_actual_price(*actual_price)?;
        }

        let mut targets = Vec::with_capacity(actuals.len());
        for &(competitor, actual_price) in actuals {
            let latest = self.latest_by_key(sku, time_key, competitor).await?;
            if latest.is_resolved() {
                return Err(AppError::AlreadyResolved(format!(
                    "observation '{}' already has an actual price",
                    latest.observation_id
                )));
            }
            targets.push((latest.observation_id, actual_price));
        }

        let mut records = Vec::with_capacity(targets.len());
        for (observation_id, actual_price) in targets {
            records.push(self.update_actual(&observation_id, actual_price).await?);
        }
        Ok(records)
    }

    /// Fetch one record by identity
    pub async fn get_record(&self, observation_id: &str) -> AppResult<PredictionRecord> {
        self.call_store("get", || self.store.get(observation_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("observation '{}'", observation_id)))
    }

    /// All records, newest `time_key` first, then newest `created_at`
    pub async fn list_records(&self) -> AppResult<Vec<PredictionRecord>> {
        self.call_store("list_ordered", || self.store.list_ordered()).await
    }

    /// Check that the record store answers
    pub async fn health(&self) -> AppResult<()> {
        self.store.health_check().await.map_err(AppError::from)
    }

    fn predict(&self, sku: &str, time_key: TimeKey, competitor: Competitor) -> AppResult<f64> {
        let model = self.registry.model(competitor);
        let features = self
            .resolver
            .resolve(sku, time_key, competitor, model.required_features())?;
        Ok(self.registry.infer(competitor, &features)?)
    }

    async fn latest_by_key(
        &self,
        sku: &str,
        time_key: TimeKey,
        competitor: Competitor,
    ) -> AppResult<PredictionRecord> {
        self.call_store("find_latest_by_key", || {
            self.store.find_latest_by_key(sku, time_key, competitor)
        })
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "no prediction for sku '{}' and time_key {} for {}",
                sku, time_key, competitor
            ))
        })
    }

    async fn insert_generated(
        &self,
        sku: &str,
        time_key: TimeKey,
        competitor: Competitor,
        predicted_price: f64,
    ) -> AppResult<PredictionRecord> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let record = PredictionRecord::new(
                generate_observation_id(sku, time_key, competitor),
                sku.to_string(),
                time_key,
                competitor,
                predicted_price,
            );
            match self.insert_record(&record).await {
                Err(AppError::DuplicateObservation(id)) => {
                    warn!("Generated observation id {} collided (attempt {})", id, attempt);
                }
                other => return other,
            }
        }

        Err(AppError::Message(format!(
            "could not allocate a unique observation id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    async fn audit_created(&self, record: &PredictionRecord) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_prediction_created(record).await {
                warn!("Failed to audit prediction {}: {}", record.observation_id, e);
            }
        }
    }

    /// Insert with retry. When an earlier attempt failed as unavailable, a
    /// duplicate may be our own committed write; the stored row is returned
    /// if it matches the record.
    async fn insert_record(&self, record: &PredictionRecord) -> AppResult<PredictionRecord> {
        let mut attempts = 0;
        let result = self
            .call_store("insert", || {
                attempts += 1;
                self.store.insert(record)
            })
            .await;

        match result {
            Err(AppError::DuplicateObservation(id)) if attempts > 1 => {
                let stored = self
                    .call_store("get", || self.store.get(&record.observation_id))
                    .await?;
                match stored {
                    Some(stored) if stored.is_same_forecast(record) => {
                        info!(
                            "Insert of {} had committed before the store failed",
                            stored.observation_id
                        );
                        Ok(stored)
                    }
                    _ => Err(AppError::DuplicateObservation(id)),
                }
            }
            other => other,
        }
    }

    /// Run a store call, retrying only `StoreError::Unavailable`
    async fn call_store<T, F, Fut>(&self, operation: &str, mut call: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Err(StoreError::Unavailable(msg)) if attempt < self.retry.attempts => {
                    warn!(
                        "Store unavailable during {} (attempt {}/{}): {}",
                        operation, attempt, self.retry.attempts, msg
                    );
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                    attempt += 1;
                }
                result => return result.map_err(AppError::from),
            }
        }
    }
}

/// `<sku>-<time_key>-<competitor>-<12 hex>`; uniqueness is enforced by the store
pub fn generate_observation_id(sku: &str, time_key: TimeKey, competitor: Competitor) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}-{}", sku, time_key, competitor, &suffix[..12])
}

fn validate_sku(sku: &str) -> AppResult<&str> {
    let sku = sku.trim();
    if sku.is_empty() {
        return Err(AppError::InvalidValue("sku must not be empty".to_string()));
    }
    Ok(sku)
}

fn validate_observation_id(id: &str) -> AppResult<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::InvalidValue("observation_id must not be empty".to_string()));
    }
    Ok(id)
}

fn validate_actual_price(actual_price: f64) -> AppResult<()> {
    if !actual_price.is_finite() || actual_price < 0.0 {
        return Err(AppError::InvalidValue(format!(
            "actual_price must be a finite, non-negative number, got {}",
            actual_price
        )));
    }
    Ok(())
}
