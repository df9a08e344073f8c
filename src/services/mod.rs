pub mod audit;
pub mod prediction_service;

pub use audit::{AuditLogEntry, AuditTrailService};
pub use prediction_service::{generate_observation_id, ForecastRequest, PredictionService};
