//! Quake Risk configuration loading and validation.
//!
//! This crate provides:
//! - Typed structs for the regional baseline table, region boxes, the
//!   source registry, and pipeline thresholds
//! - Config resolution (explicit path → env → XDG → /etc → defaults)
//! - Semantic validation
//! - Config snapshots for diagnostics

pub mod config;
pub mod pipeline;
pub mod regions;
pub mod resolve;
pub mod snapshot;
pub mod sources;
pub mod validate;

pub use config::{ConfigError, LoadedConfig, QuakeConfig};
pub use pipeline::{DedupThresholds, PipelineConfig};
pub use regions::{BaselineZone, RegionBox, RegionalBaseline};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use sources::{PayloadFormat, SourceDescriptor};
pub use validate::{ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
