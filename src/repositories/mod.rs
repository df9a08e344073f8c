//! Record store for prediction records.
//!
//! `RecordStore` is the persistence contract the prediction service relies
//! on. Every write primitive is atomic per observation id within the backing
//! store, so concurrent workers never need in-process locking.

pub mod memory_repository;
pub mod prediction_repository;

pub use memory_repository::MemoryRecordStore;
pub use prediction_repository::PredictionRepository;

use crate::error::StoreResult;
use crate::models::{Competitor, PredictionRecord, TimeKey};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Durable keyed storage for prediction records.
///
/// Implementations must be thread-safe (`Send + Sync`) and must make `insert`
/// and `resolve_actual` atomic with respect to concurrent calls for the same id.
pub trait RecordStore: Send + Sync {
    /// Insert if absent; an existing id yields `StoreError::Duplicate`.
    fn insert(
        &self,
        record: &PredictionRecord,
    ) -> impl Future<Output = StoreResult<PredictionRecord>> + Send;

    /// Point lookup by observation id.
    fn get(
        &self,
        observation_id: &str,
    ) -> impl Future<Output = StoreResult<Option<PredictionRecord>>> + Send;

    /// Most recently created record for a natural key.
    fn find_latest_by_key(
        &self,
        sku: &str,
        time_key: TimeKey,
        competitor: Competitor,
    ) -> impl Future<Output = StoreResult<Option<PredictionRecord>>> + Send;

    /// Set the actual price of an unresolved record.
    ///
    /// Yields `StoreError::NotFound` for an unknown id and
    /// `StoreError::AlreadyResolved` when the price was already set. The stored
    /// `updated_at` is never earlier than `created_at`.
    fn resolve_actual(
        &self,
        observation_id: &str,
        actual_price: f64,
        updated_at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<PredictionRecord>> + Send;

    /// All records in `PredictionRecord::listing_order`.
    fn list_ordered(&self) -> impl Future<Output = StoreResult<Vec<PredictionRecord>>> + Send;

    /// Cheap liveness check.
    fn health_check(&self) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Store selected at start-up from `DATABASE_URL`
pub enum StoreBackend {
    Postgres(PredictionRepository),
    Memory(MemoryRecordStore),
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Postgres(_) => "postgres",
            StoreBackend::Memory(_) => "memory",
        }
    }
}

impl RecordStore for StoreBackend {
    async fn insert(&self, record: &PredictionRecord) -> StoreResult<PredictionRecord> {
        match self {
            StoreBackend::Postgres(store) => store.insert(record).await,
            StoreBackend::Memory(store) => store.insert(record).await,
        }
    }

    async fn get(&self, observation_id: &str) -> StoreResult<Option<PredictionRecord>> {
        match self {
            StoreBackend::Postgres(store) => store.get(observation_id).await,
            StoreBackend::Memory(store) => store.get(observation_id).await,
        }
    }

    async fn find_latest_by_key(
        &self,
        sku: &str,
        time_key: TimeKey,
        competitor: Competitor,
    ) -> StoreResult<Option<PredictionRecord>> {
        match self {
            StoreBackend::Postgres(store) => store.find_latest_by_key(sku, time_key, competitor).await,
            StoreBackend::Memory(store) => store.find_latest_by_key(sku, time_key, competitor).await,
        }
    }

    async fn resolve_actual(
        &self,
        observation_id: &str,
        actual_price: f64,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<PredictionRecord> {
        match self {
            StoreBackend::Postgres(store) => {
                store.resolve_actual(observation_id, actual_price, updated_at).await
            }
            StoreBackend::Memory(store) => {
                store.resolve_actual(observation_id, actual_price, updated_at).await
            }
        }
    }

    async fn list_ordered(&self) -> StoreResult<Vec<PredictionRecord>> {
        match self {
            StoreBackend::Postgres(store) => store.list_ordered().await,
            StoreBackend::Memory(store) => store.list_ordered().await,
        }
    }

    async fn health_check(&self) -> StoreResult<()> {
        match self {
            StoreBackend::Postgres(store) => store.health_check().await,
            StoreBackend::Memory(store) => store.health_check().await,
        }
    }
}
