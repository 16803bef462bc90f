// Typed errors with thiserror. Surface meaningful messages to JS.

use thiserror::Error;

/// Engine error types. Dropped samples and clicks on inert calibration
/// targets are normal-path no-ops, not errors; only tracker initialization
/// failure is user-facing.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Gaze tracker failed to initialize: {0}")]
    TrackerInit(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
