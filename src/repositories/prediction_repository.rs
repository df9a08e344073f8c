use super::RecordStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{Competitor, PredictionRecord, PredictionRow, TimeKey};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const COLUMNS: &str = "observation_id, sku, time_key, competitor, predicted_price, \
                       actual_price, created_at, updated_at";

/// PostgreSQL-backed record store over the `prediction_prices` table
#[derive(Debug, Clone)]
pub struct PredictionRepository {
    pool: PgPool,
}

impl PredictionRepository {
    /// Create a new PredictionRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode(row: PredictionRow) -> StoreResult<PredictionRecord> {
        PredictionRecord::try_from(row).map_err(StoreError::Corrupt)
    }

    fn decode_opt(row: Option<PredictionRow>) -> StoreResult<Option<PredictionRecord>> {
        row.map(Self::decode).transpose()
    }
}

impl RecordStore for PredictionRepository {
    async fn insert(&self, record: &PredictionRecord) -> StoreResult<PredictionRecord> {
        // ON CONFLICT keeps the existing row; an empty RETURNING means the id was taken
        let sql = format!(
            r#"
            INSERT INTO prediction_prices
                (observation_id, sku, time_key, competitor, predicted_price, actual_price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NULL, $6, NULL)
            ON CONFLICT (observation_id) DO NOTHING
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, PredictionRow>(&sql)
            .bind(&record.observation_id)
            .bind(&record.sku)
            .bind(record.time_key.as_i32())
            .bind(record.competitor.as_str())
            .bind(record.predicted_price)
            .bind(record.created_at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::decode(row),
            None => Err(StoreError::Duplicate(record.observation_id.clone())),
        }
    }

    async fn get(&self, observation_id: &str) -> StoreResult<Option<PredictionRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM prediction_prices WHERE observation_id = $1");

        let row = sqlx::query_as::<_, PredictionRow>(&sql)
            .bind(observation_id)
            .fetch_optional(&self.pool)
            .await?;

        Self::decode_opt(row)
    }

    async fn find_latest_by_key(
        &self,
        sku: &str,
        time_key: TimeKey,
        competitor: Competitor,
    ) -> StoreResult<Option<PredictionRecord>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM prediction_prices
            WHERE sku = $1 AND time_key = $2 AND competitor = $3
            ORDER BY created_at DESC, observation_id DESC
            LIMIT 1
            "#
        );

        let row = sqlx::query_as::<_, PredictionRow>(&sql)
            .bind(sku)
            .bind(time_key.as_i32())
            .bind(competitor.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Self::decode_opt(row)
    }

    async fn resolve_actual(
        &self,
        observation_id: &str,
        actual_price: f64,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<PredictionRecord> {
        // Conditional write: only the first update of an unresolved row matches
        let sql = format!(
            r#"
            UPDATE prediction_prices
            SET actual_price = $2,
                updated_at = GREATEST($3, created_at)
            WHERE observation_id = $1 AND actual_price IS NULL
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, PredictionRow>(&sql)
            .bind(observation_id)
            .bind(actual_price)
            .bind(updated_at)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Self::decode(row);
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM prediction_prices WHERE observation_id = $1)",
        )
        .bind(observation_id)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            Err(StoreError::AlreadyResolved(observation_id.to_string()))
        } else {
            Err(StoreError::NotFound(observation_id.to_string()))
        }
    }

    async fn list_ordered(&self) -> StoreResult<Vec<PredictionRecord>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM prediction_prices
            ORDER BY time_key DESC, created_at DESC, observation_id DESC
            "#
        );

        sqlx::query_as::<_, PredictionRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
