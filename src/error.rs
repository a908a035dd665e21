use std::time::Duration;
use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Failure of a single perception capability. Never escapes the gateway.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    #[error("Capability unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to decode input: {0}")]
    Decode(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to decode asset: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Analysis worker failed: {0}")]
    Worker(String),
    #[error("Aggregation failed: {0}")]
    Aggregation(#[from] AggregationError),
}

impl From<tokio::task::JoinError> for AnalysisError {
    fn from(err: tokio::task::JoinError) -> Self {
        AnalysisError::Worker(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error("{field} is not a finite number: {value}")]
    NonFinite { field: &'static str, value: f32 },
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f32 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("{field} is not a finite number: {value}")]
    NonFinite { field: &'static str, value: f32 },
}
