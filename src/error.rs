//! Error types for Synheart Markers
//!
//! Degenerate inputs (zero variance, zero range, empty windows) never surface
//! here; they resolve to documented fallback values inside the engines. These
//! errors are reserved for broken caller contracts.

use thiserror::Error;

/// Errors that can occur during marker computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Insufficient samples: {0}")]
    InsufficientSamples(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
