//! Top-level configuration document.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::PipelineConfig;
use crate::regions::{default_region_boxes, RegionBox, RegionalBaseline};
use crate::resolve::{resolve_config, ConfigPaths};
use crate::snapshot::ConfigSnapshot;
use crate::sources::{default_sources, SourceDescriptor};
use crate::validate::{validate_config, ValidationError};

/// Errors from loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse {format}: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ConfigError {
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::Io { .. } => 10,
            ConfigError::Parse { .. } => 12,
            ConfigError::Validation(_) => 11,
        }
    }
}

impl From<ConfigError> for qr_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation(ValidationError::InvalidValue { field, message }) => {
                qr_common::Error::InvalidConfig { field, message }
            }
            other => qr_common::Error::Config(other.to_string()),
        }
    }
}

/// Everything the pipeline reads from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuakeConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub regional_baseline: RegionalBaseline,
    #[serde(default = "default_region_boxes")]
    pub regions: Vec<RegionBox>,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceDescriptor>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

impl Default for QuakeConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            regional_baseline: RegionalBaseline::default(),
            regions: default_region_boxes(),
            sources: default_sources(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl QuakeConfig {
    /// Load from a file, choosing the parser by extension (`.toml` or JSON).
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            format: "JSON",
            message: e.to_string(),
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            format: "TOML",
            message: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_config(self)
    }

    /// Region name for a point, `"global"` when no box matches.
    pub fn region_for(&self, lat: f64, lon: f64) -> &str {
        crate::regions::detect_region(&self.regions, lat, lon)
    }
}

/// A resolved, validated configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: QuakeConfig,
    pub paths: ConfigPaths,
    pub snapshot: ConfigSnapshot,
}

impl LoadedConfig {
    /// Resolve, parse, and validate. Falls back to built-in defaults when no
    /// file is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let paths = resolve_config(explicit);
        let (config, raw) = match &paths.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                let config = if path.extension().is_some_and(|ext| ext == "toml") {
                    QuakeConfig::from_toml_str(&raw)?
                } else {
                    QuakeConfig::from_json_str(&raw)?
                };
                (config, Some(raw))
            }
            None => (QuakeConfig::default(), None),
        };
        config.validate()?;
        let snapshot = ConfigSnapshot::new(&config, &paths, raw.as_deref());
        Ok(Self {
            config,
            paths,
            snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let cfg = QuakeConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, QuakeConfig::default());
    }

    #[test]
    fn toml_overrides_pipeline() {
        let cfg = QuakeConfig::from_toml_str(
            r#"
            [pipeline]
            window_cap = 50

            [pipeline.dedup]
            max_time_gap_secs = 600.0
            max_distance_km = 5.0
            max_magnitude_delta = 0.3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.pipeline.window_cap, 50);
        assert_eq!(cfg.pipeline.dedup.max_distance_km, 5.0);
        assert_eq!(cfg.pipeline.days, 30);
    }

    #[test]
    fn bad_json_is_parse_error() {
        let err = QuakeConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "JSON", .. }));
        assert_eq!(err.code(), 12);
    }

    #[test]
    fn converts_into_unified_error() {
        let err = ConfigError::Validation(ValidationError::InvalidValue {
            field: "pipeline.window_cap".into(),
            message: "must be positive".into(),
        });
        let unified: qr_common::Error = err.into();
        assert_eq!(unified.code(), 11);
    }
}
