//! Structured event definitions for logging.
//!
//! Events follow a consistent schema for machine-parseable JSONL output.
//! All events include correlation IDs (run_id, host_id) and stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Concurrent source fetches.
    Fetch,
    /// Raw record to canonical event.
    Normalize,
    /// Cross-source duplicate collapse.
    Dedup,
    /// Seismic feature scoring.
    Score,
    /// Ensemble prediction.
    Predict,
    /// Model training.
    Train,
    /// Stress pattern classification.
    Stress,
    /// Risk aggregation.
    Risk,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Fetch => "fetch",
            Stage::Normalize => "normalize",
            Stage::Dedup => "dedup",
            Stage::Score => "score",
            Stage::Predict => "predict",
            Stage::Train => "train",
            Stage::Stress => "stress",
            Stage::Risk => "risk",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Service lifecycle
    pub const SERVICE_STARTED: &str = "service.started";
    pub const ANALYSIS_FINISHED: &str = "analysis.finished";

    // Fetch stage
    pub const FETCH_STARTED: &str = "fetch.started";
    pub const FETCH_SOURCE_OK: &str = "fetch.source_ok";
    pub const FETCH_SOURCE_FAILED: &str = "fetch.source_failed";
    pub const FETCH_FINISHED: &str = "fetch.finished";

    // Normalize / dedup
    pub const NORMALIZE_DROPPED: &str = "normalize.dropped";
    pub const DEDUP_FINISHED: &str = "dedup.finished";

    // Predict / train
    pub const PREDICT_NO_DATA: &str = "predict.no_data";
    pub const PREDICT_FINISHED: &str = "predict.finished";
    pub const PREDICT_MODEL_FAILED: &str = "predict.model_failed";
    pub const TRAIN_SKIPPED: &str = "train.skipped";
    pub const TRAIN_FAILED: &str = "train.failed";
    pub const TRAIN_FINISHED: &str = "train.finished";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
}

/// A structured log event for JSONL output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    /// Event name (e.g., "fetch.started", "dedup.finished").
    pub event: String,
    pub run_id: String,
    pub stage: Stage,
    pub host_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(
        level: Level,
        event: impl Into<String>,
        run_id: impl Into<String>,
        host_id: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: run_id.into(),
            stage,
            host_id: host_id.into(),
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    /// Add a field to the event.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Correlation IDs shared by every event a service instance emits.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }

    /// Fresh context with a generated run id.
    pub fn generate() -> Self {
        Self::new(super::generate_run_id(), super::get_host_id())
    }

    pub fn event(
        &self,
        level: Level,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        LogEvent::new(level, event, &self.run_id, &self.host_id, stage, message)
    }

    pub fn info(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Info, event, stage, message)
    }

    pub fn debug(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Debug, event, stage, message)
    }

    pub fn warn(&self, event: impl Into<String>, stage: Stage, message: impl Into<String>) -> LogEvent {
        self.event(Level::Warn, event, stage, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(
            Level::Info,
            event_names::DEDUP_FINISHED,
            "run-12345",
            "host-abc",
            Stage::Dedup,
            "Deduplicated events",
        )
        .with_field("kept", 12);

        let json = event.to_jsonl();
        assert!(json.contains(r#""event":"dedup.finished""#));
        assert!(json.contains(r#""level":"info""#));
        assert!(json.contains(r#""stage":"dedup""#));
        assert!(json.contains(r#""kept":12"#));
    }

    #[test]
    fn test_log_context() {
        let ctx = LogContext::new("run-abc", "host-xyz");
        let event = ctx.warn(event_names::FETCH_SOURCE_FAILED, Stage::Fetch, "usgs timed out");
        assert_eq!(event.run_id, "run-abc");
        assert_eq!(event.host_id, "host-xyz");
        assert_eq!(event.level, Level::Warn);
        assert_eq!(event.stage, Stage::Fetch);
    }

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [Stage::Init, Stage::Fetch, Stage::Train, Stage::Risk] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }
}
