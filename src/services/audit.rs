use crate::error::{AppError, AppResult};
use crate::models::PredictionRecord;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "prediction_created", "actual_recorded"
    pub observation_id: String,
    pub details: serde_json::Value,
}

/// Append-only JSON-lines trail of every prediction and actual price
pub struct AuditTrailService {
    log_file: PathBuf,
    file_handle: Mutex<std::fs::File>,
}

impl AuditTrailService {
    /// Create a new audit trail service
    pub fn new(log_directory: &Path) -> AppResult<Self> {
        // Ensure directory exists
        std::fs::create_dir_all(log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        // Create log file with date
        let date = chrono::Utc::now().format("%Y-%m-%d");
        let log_file = log_directory.join(format!("audit_{}.log", date));

        // Open file in append mode
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))?;

        info!("Audit trail initialized: {:?}", log_file);

        Ok(Self {
            log_file,
            file_handle: Mutex::new(file),
        })
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Log an audit entry
    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        let json = serde_json::to_string(&entry)?;

        let mut file = self.file_handle.lock().await;
        writeln!(file, "{}", json)?;
        file.flush()?;

        Ok(())
    }

    /// Log a newly persisted forecast
    pub async fn log_prediction_created(&self, record: &PredictionRecord) -> AppResult<()> {
        let entry = AuditLogEntry {
            timestamp: record.created_at.timestamp(),
            event_type: "prediction_created".to_string(),
            observation_id: record.observation_id.clone(),
            details: serde_json::json!({
                "sku": record.sku,
                "time_key": record.time_key,
                "competitor": record.competitor,
                "predicted_price": record.predicted_price,
            }),
        };

        self.log(entry).await
    }

    /// Log an actual price closing the loop on a forecast
    pub async fn log_actual_recorded(&self, record: &PredictionRecord) -> AppResult<()> {
        let entry = AuditLogEntry {
            timestamp: record
                .updated_at
                .unwrap_or_else(chrono::Utc::now)
                .timestamp(),
            event_type: "actual_recorded".to_string(),
            observation_id: record.observation_id.clone(),
            details: serde_json::json!({
                "predicted_price": record.predicted_price,
                "actual_price": record.actual_price,
                "absolute_error": record.absolute_error(),
            }),
        };

        self.log(entry).await
    }
}
