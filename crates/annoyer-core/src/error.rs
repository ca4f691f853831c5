//! Core error types for annoyer-core.
//!
//! Every error in this crate is recoverable from the point of view of a
//! running session: the alarm loop logs and substitutes a safe value rather
//! than stopping. The types still exist so callers at the boundaries (CLI,
//! config editing, tests) can tell what went wrong.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Core error type for annoyer-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Event ordering errors
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// History file errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Rate estimation errors
    #[error("Rate error: {0}")]
    Rate(#[from] RateError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Threshold outside the open interval (0, 1).
    #[error("Invalid threshold {value}: must lie strictly between 0 and 1")]
    InvalidThreshold { value: f64 },

    /// Negative or non-finite duration.
    #[error("Invalid duration {value}s: must be finite and non-negative")]
    InvalidDuration { value: f64 },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Event history errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistoryError {
    /// An appended timestamp precedes the last recorded event.
    #[error("Event at {attempted} precedes the last recorded event at {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },
}

/// History file errors. Always recovered by falling back to an empty history.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The file exists but could not be read.
    #[error("Failed to read history from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The contents do not match the history schema.
    #[error("Malformed history in {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// The file could not be written.
    #[error("Failed to write history to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The data directory could not be resolved or created.
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Rate estimation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateError {
    /// The fitted rate is non-positive or non-finite.
    #[error("Degenerate rate {rate} fitted from mean gap {mean_gap_secs}s")]
    Degenerate { rate: f64, mean_gap_secs: f64 },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        let key = match &err {
            ValidationError::InvalidThreshold { .. } => "alarm.threshold".to_string(),
            ValidationError::InvalidDuration { .. } => "alarm.default_duration_secs".to_string(),
            ValidationError::InvalidValue { field, .. } => field.clone(),
        };
        ConfigError::InvalidValue {
            key,
            message: err.to_string(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
