//! Error types for Quake Risk.
//!
//! Every error carries a stable numeric code and a category so callers
//! (an HTTP layer, a dashboard backend) can map failures without parsing
//! message strings. Most pipeline stages never surface these: per-source and
//! per-record failures degrade locally and only show up in logs and coverage
//! counters. The unified type exists for the operations that *can* fail
//! outright, such as configuration loading.
//!
//! ```json
//! {
//!   "code": 21,
//!   "category": "source",
//!   "message": "source usgs timed out after 10s",
//!   "recoverable": true,
//!   "context": { "source": "usgs" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for Quake Risk operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors.
    Config,
    /// Upstream feed fetch errors.
    Source,
    /// Payload parsing and record normalization errors.
    Record,
    /// Scoring and model errors.
    Model,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Source => write!(f, "source"),
            ErrorCategory::Record => write!(f, "record"),
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for Quake Risk.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration value for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    // Source errors (20-29)
    #[error("source {source_name} unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("source {source_name} timed out after {seconds}s")]
    SourceTimeout { source_name: String, seconds: u64 },

    // Record errors (30-39)
    #[error("malformed record: {0}")]
    RecordMalformed(String),

    #[error("payload parse failed for {source_name}: {message}")]
    PayloadParse {
        source_name: String,
        message: String,
    },

    // Model errors (40-49)
    #[error("insufficient data: {have} events (min {need})")]
    InsufficientData { have: usize, need: usize },

    #[error("model error: {0}")]
    Model(String),

    #[error("numerical instability detected: {0}")]
    NumericalInstability(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Source errors
    /// - 30-39: Record errors
    /// - 40-49: Model errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig { .. } => 11,
            Error::SourceUnavailable { .. } => 20,
            Error::SourceTimeout { .. } => 21,
            Error::RecordMalformed(_) => 30,
            Error::PayloadParse { .. } => 31,
            Error::InsufficientData { .. } => 40,
            Error::Model(_) => 41,
            Error::NumericalInstability(_) => 42,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => ErrorCategory::Config,
            Error::SourceUnavailable { .. } | Error::SourceTimeout { .. } => ErrorCategory::Source,
            Error::RecordMalformed(_) | Error::PayloadParse { .. } => ErrorCategory::Record,
            Error::InsufficientData { .. } | Error::Model(_) | Error::NumericalInstability(_) => {
                ErrorCategory::Model
            }
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::InvalidConfig { .. } => true,

            // Upstream feeds come and go; the next poll may succeed.
            Error::SourceUnavailable { .. } => true,
            Error::SourceTimeout { .. } => true,

            // Re-fetching the same payload yields the same bad record.
            Error::RecordMalformed(_) => false,
            Error::PayloadParse { .. } => false,

            Error::InsufficientData { .. } => true,
            Error::Model(_) => true,
            Error::NumericalInstability(_) => false,

            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig { .. } => "Invalid Configuration",
            Error::SourceUnavailable { .. } => "Source Unavailable",
            Error::SourceTimeout { .. } => "Source Timeout",
            Error::RecordMalformed(_) => "Malformed Record",
            Error::PayloadParse { .. } => "Payload Parse Error",
            Error::InsufficientData { .. } => "Insufficient Data",
            Error::Model(_) => "Model Error",
            Error::NumericalInstability(_) => "Numerical Instability",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g., source name, field).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::InvalidConfig { field, .. } => {
                context.insert("field".to_string(), serde_json::json!(field));
            }
            Error::SourceUnavailable { source_name, .. }
            | Error::PayloadParse { source_name, .. } => {
                context.insert("source".to_string(), serde_json::json!(source_name));
            }
            Error::SourceTimeout {
                source_name,
                seconds,
            } => {
                context.insert("source".to_string(), serde_json::json!(source_name));
                context.insert("timeout_seconds".to_string(), serde_json::json!(seconds));
            }
            Error::InsufficientData { have, need } => {
                context.insert("have".to_string(), serde_json::json!(have));
                context.insert("need".to_string(), serde_json::json!(need));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}
