use crate::database::DatabaseError;
use crate::features::FeatureError;
use crate::registry::ModelError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// The forecast date could not be normalized to a `YYYYMMDD` key
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Competitor outside the closed set served by the registry
    #[error("Unknown competitor: {0}")]
    UnknownCompetitor(String),

    /// The sku has no feature history at all
    #[error("Unknown sku: {0}")]
    UnknownSku(String),

    /// A record with this observation id already exists
    #[error("Duplicate observation: {0}")]
    DuplicateObservation(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Validation errors on numeric or identifier input
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The actual price of this record was already recorded
    #[error("Already resolved: {0}")]
    AlreadyResolved(String),

    /// Transient persistence failure
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model artifact or inference errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Feature table errors
    #[error("Feature error: {0}")]
    Features(#[from] FeatureError),

    /// Database setup errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Non-transient store failures
    #[error("Store error: {0}")]
    Store(StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Only transient store failures may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidDate(_) => "invalid_date",
            AppError::UnknownCompetitor(_) => "unknown_competitor",
            AppError::UnknownSku(_) => "unknown_sku",
            AppError::DuplicateObservation(_) => "duplicate_observation",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidValue(_) => "invalid_value",
            AppError::AlreadyResolved(_) => "already_resolved",
            AppError::StoreUnavailable(_) => "store_unavailable",
            _ => "internal",
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::InvalidDate(_) | AppError::UnknownCompetitor(_) | AppError::InvalidValue(_) => 400,
            AppError::UnknownSku(_) | AppError::NotFound(_) => 404,
            AppError::DuplicateObservation(_) | AppError::AlreadyResolved(_) => 409,
            AppError::StoreUnavailable(_) => 503,
            _ => 500,
        }
    }
}

/// Record store error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// Insert collided with an existing observation id
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Conditional update found the actual price already set
    #[error("Record already resolved: {0}")]
    AlreadyResolved(String),

    /// Connection, pool or I/O failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// A stored row failed domain decoding
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(id) => AppError::DuplicateObservation(id),
            StoreError::NotFound(id) => AppError::NotFound(format!("observation '{}'", id)),
            StoreError::AlreadyResolved(id) => {
                AppError::AlreadyResolved(format!("observation '{}' already has an actual price", id))
            }
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
            other => AppError::Store(other),
        }
    }
}

impl From<SqlxError> for StoreError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => StoreError::NotFound("Record not found".to_string()),
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::WorkerCrashed => {
                StoreError::Unavailable(err.to_string())
            }
            SqlxError::Io(_) | SqlxError::Tls(_) => StoreError::Unavailable(err.to_string()),
            SqlxError::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                match code.as_deref() {
                    // Unique violation
                    Some("23505") => StoreError::Duplicate(db_err.message().to_string()),
                    // Connection exceptions and operator shutdowns
                    Some(c) if c.starts_with("08") || c.starts_with("57P") => {
                        StoreError::Unavailable(db_err.message().to_string())
                    }
                    _ => StoreError::Query(err),
                }
            }
            _ => StoreError::Query(err),
        }
    }
}
