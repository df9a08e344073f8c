use super::RecordStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{Competitor, PredictionRecord, TimeKey};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process record store for local runs and tests.
///
/// A single lock guards the map, which makes insert-if-absent and the
/// conditional actual-price update atomic within this process.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, PredictionRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &PredictionRecord) -> StoreResult<PredictionRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.observation_id) {
            return Err(StoreError::Duplicate(record.observation_id.clone()));
        }
        records.insert(record.observation_id.clone(), record.clone());
        Ok(record.clone())
    }

    async fn get(&self, observation_id: &str) -> StoreResult<Option<PredictionRecord>> {
        Ok(self.records.read().await.get(observation_id).cloned())
    }

    async fn find_latest_by_key(
        &self,
        sku: &str,
        time_key: TimeKey,
        competitor: Competitor,
    ) -> StoreResult<Option<PredictionRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.sku == sku && r.time_key == time_key && r.competitor == competitor)
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.observation_id.cmp(&b.observation_id))
            })
            .cloned())
    }

    async fn resolve_actual(
        &self,
        observation_id: &str,
        actual_price: f64,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<PredictionRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(observation_id)
            .ok_or_else(|| StoreError::NotFound(observation_id.to_string()))?;

        if record.actual_price.is_some() {
            return Err(StoreError::AlreadyResolved(observation_id.to_string()));
        }

        record.actual_price = Some(actual_price);
        record.updated_at = Some(updated_at.max(record.created_at));
        Ok(record.clone())
    }

    async fn list_ordered(&self) -> StoreResult<Vec<PredictionRecord>> {
        let mut records: Vec<PredictionRecord> =
            self.records.read().await.values().cloned().collect();
        records.sort_by(PredictionRecord::listing_order);
        Ok(records)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
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
            99.5,
        )
    }

    #[tokio::test]
    async fn test_insert_if_absent() {
        let store = MemoryRecordStore::new();
        store.insert(&record("obs-1", 20250520)).await.unwrap();

        let err = store.insert(&record("obs-1", 20250521)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ref id) if id == "obs-1"));
        assert_eq!(store.len().await, 1);

        let stored = store.get("obs-1").await.unwrap().unwrap();
        assert_eq!(stored.time_key.as_i32(), 20250520);
    }

    #[tokio::test]
    async fn test_resolve_once() {
        let store = MemoryRecordStore::new();
        store.insert(&record("obs-1", 20250520)).await.unwrap();

        let resolved = store.resolve_actual("obs-1", 126.0, Utc::now()).await.unwrap();
        assert_eq!(resolved.actual_price, Some(126.0));
        assert_eq!(resolved.predicted_price, 99.5);

        let err = store.resolve_actual("obs-1", 127.0, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyResolved(_)));
        assert_eq!(store.get("obs-1").await.unwrap().unwrap().actual_price, Some(126.0));
    }

    #[tokio::test]
    async fn test_resolve_unknown_creates_nothing() {
        let store = MemoryRecordStore::new();
        let err = store.resolve_actual("missing", 1.0, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_updated_at_clamped_to_created_at() {
        let store = MemoryRecordStore::new();
        let inserted = store.insert(&record("obs-1", 20250520)).await.unwrap();
        let skewed = inserted.created_at - Duration::seconds(30);

        let resolved = store.resolve_actual("obs-1", 1.0, skewed).await.unwrap();
        assert_eq!(resolved.updated_at, Some(inserted.created_at));
    }

    #[tokio::test]
    async fn test_latest_by_key() {
        let store = MemoryRecordStore::new();
        let mut first = record("obs-1", 20250520);
        let mut second = record("obs-2", 20250520);
        first.created_at = Utc::now() - Duration::seconds(5);
        second.created_at = Utc::now();
        store.insert(&second).await.unwrap();
        store.insert(&first).await.unwrap();

        let key = TimeKey::from_i64(20250520).unwrap();
        let latest = store.find_latest_by_key("4443", key, Competitor::A).await.unwrap().unwrap();
        assert_eq!(latest.observation_id, "obs-2");
        assert!(store
            .find_latest_by_key("4443", key, Competitor::B)
            .await
            .unwrap()
            .is_none());
    }
}
