//! Domain models for the price forecast backend.
//!
//! `PredictionRecord` is the only persisted entity; the remaining types
//! normalize the request fields that identify it.

pub mod competitor;
pub mod prediction;
pub mod time_key;

// Re-export all models for convenient access
pub use competitor::Competitor;
pub use prediction::{PredictionRecord, PredictionRow};
pub use time_key::{TimeKey, TimeKeyInput};
