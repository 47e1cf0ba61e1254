//! Error types for the screening core

use thiserror::Error;

/// Errors that can occur while screening landmark frames
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("Failed to parse frame records: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Landmark set has {len} points, at least {required} required")]
    IncompleteLandmarkSet { len: usize, required: usize },

    #[error("Landmark {index} has a non-finite coordinate")]
    NonFiniteLandmark { index: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid frame record: {0}")]
    InvalidRecord(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
