//! Logging configuration.
//!
//! Read from `QR_LOG` (level, falling back to the bare level directive in
//! `RUST_LOG`) and `QR_LOG_FORMAT`. The embedding service may override both.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crates whose debug output drowns the pipeline's own events.
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "reqwest"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log {setting}: {value:?}")]
pub struct LogSettingError {
    pub setting: &'static str,
    pub value: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per event on stderr.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = LogSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "jsonl" | "json" => Ok(Self::Jsonl),
            _ => Err(LogSettingError {
                setting: "format",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Jsonl => write!(f, "jsonl"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl std::str::FromStr for LogLevel {
    type Err = LogSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "off" => Ok(Self::Off),
            _ => Err(LogSettingError {
                setting: "level",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
            Self::Off => write!(f, "off"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Timestamps in human output.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Environment settings, then explicit overrides.
    pub fn from_env(level: Option<LogLevel>, format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), level, format)
    }

    /// Same as [`LogConfig::from_env`] over an arbitrary variable source.
    /// Unparseable values are ignored.
    pub fn from_lookup<F>(lookup: F, level: Option<LogLevel>, format: Option<LogFormat>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_level = match lookup("QR_LOG") {
            Some(value) => value.parse().ok(),
            None => lookup("RUST_LOG").as_deref().and_then(bare_level),
        };
        let env_format = lookup("QR_LOG_FORMAT").and_then(|v| v.parse().ok());

        let defaults = Self::default();
        Self {
            level: level.or(env_level).unwrap_or(defaults.level),
            format: format.or(env_format).unwrap_or(defaults.format),
            timestamps: defaults.timestamps,
        }
    }

    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub fn filter_directive(&self) -> String {
        let mut directive = self.level.to_string();
        for name in QUIET_DEPENDENCIES {
            directive.push_str(&format!(",{name}=warn"));
        }
        directive
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}

/// First directive in a `RUST_LOG` string that names a level alone
/// (`"debug,hyper=warn"` gives `Debug`).
fn bare_level(directives: &str) -> Option<LogLevel> {
    directives
        .split(',')
        .filter(|d| !d.contains('='))
        .find_map(|d| d.parse().ok())
}
