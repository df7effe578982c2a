//! Configuration validation errors and semantic validation.

use qr_common::geo::{is_valid_latitude, is_valid_longitude};
use thiserror::Error;

use crate::config::QuakeConfig;
use crate::pipeline::PipelineConfig;
use crate::regions::{RegionBox, RegionalBaseline};
use crate::sources::SourceDescriptor;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::SemanticError(_) => 13,
            ValidationError::InvalidValue { .. } => 11,
            ValidationError::VersionMismatch { .. } => 14,
        }
    }
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// Validate a full configuration semantically.
pub fn validate_config(config: &QuakeConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    validate_baseline(&config.regional_baseline)?;
    for (i, region) in config.regions.iter().enumerate() {
        validate_region_box(i, region)?;
    }

    let mut seen = std::collections::HashSet::new();
    for (i, source) in config.sources.iter().enumerate() {
        validate_source(i, source)?;
        if !seen.insert(source.name.as_str()) {
            return Err(ValidationError::SemanticError(format!(
                "duplicate source name {:?}",
                source.name
            )));
        }
    }

    validate_pipeline(&config.pipeline)
}

fn validate_baseline(baseline: &RegionalBaseline) -> ValidationResult<()> {
    if !(baseline.falloff_km > 0.0 && baseline.falloff_km.is_finite()) {
        return Err(invalid(
            "regional_baseline.falloff_km",
            format!("Must be positive, got {}", baseline.falloff_km),
        ));
    }
    for (i, zone) in baseline.zones.iter().enumerate() {
        if !(0.0..=1.0).contains(&zone.risk) {
            return Err(invalid(
                format!("regional_baseline.zones[{}].risk", i),
                format!("Must be in [0, 1], got {}", zone.risk),
            ));
        }
        if !is_valid_latitude(zone.lat) || !is_valid_longitude(zone.lon) {
            return Err(invalid(
                format!("regional_baseline.zones[{}]", i),
                format!("Coordinates out of range: ({}, {})", zone.lat, zone.lon),
            ));
        }
    }
    Ok(())
}

fn validate_region_box(i: usize, region: &RegionBox) -> ValidationResult<()> {
    let field = format!("regions[{}]", i);
    if region.name.trim().is_empty() {
        return Err(invalid(field, "Name must not be empty"));
    }
    let corners_ok = is_valid_latitude(region.min_lat)
        && is_valid_latitude(region.max_lat)
        && is_valid_longitude(region.min_lon)
        && is_valid_longitude(region.max_lon);
    if !corners_ok {
        return Err(invalid(field, "Coordinates out of range"));
    }
    if region.min_lat > region.max_lat || region.min_lon > region.max_lon {
        return Err(invalid(field, "min must not exceed max"));
    }
    Ok(())
}

fn validate_source(i: usize, source: &SourceDescriptor) -> ValidationResult<()> {
    if source.name.trim().is_empty() {
        return Err(invalid(format!("sources[{}].name", i), "Must not be empty"));
    }
    if source.url.trim().is_empty() {
        return Err(invalid(format!("sources[{}].url", i), "Must not be empty"));
    }
    if source.timeout_secs == 0 {
        return Err(invalid(
            format!("sources[{}].timeout_secs", i),
            "Must be > 0",
        ));
    }
    if !(source.radius_multiplier > 0.0 && source.radius_multiplier.is_finite()) {
        return Err(invalid(
            format!("sources[{}].radius_multiplier", i),
            format!("Must be positive, got {}", source.radius_multiplier),
        ));
    }
    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> ValidationResult<()> {
    let dedup = &pipeline.dedup;
    let thresholds = [
        ("pipeline.dedup.max_time_gap_secs", dedup.max_time_gap_secs),
        ("pipeline.dedup.max_distance_km", dedup.max_distance_km),
        ("pipeline.dedup.max_magnitude_delta", dedup.max_magnitude_delta),
        ("pipeline.default_radius_km", pipeline.default_radius_km),
    ];
    for (field, value) in thresholds {
        if !(value > 0.0 && value.is_finite()) {
            return Err(invalid(field, format!("Must be positive, got {}", value)));
        }
    }
    if pipeline.window_cap == 0 {
        return Err(invalid("pipeline.window_cap", "Must be > 0"));
    }
    if pipeline.days == 0 {
        return Err(invalid("pipeline.days", "Must be > 0"));
    }
    if !pipeline.min_magnitude.is_finite() {
        return Err(invalid("pipeline.min_magnitude", "Must be finite"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&QuakeConfig::default()).is_ok());
    }

    #[test]
    fn inverted_box_rejected() {
        let mut cfg = QuakeConfig::default();
        cfg.regions[0].min_lat = 50.0;
        let err = validate_config(&cfg).unwrap_err();
        assert_eq!(err.code(), 11);
        assert!(err.to_string().contains("regions[0]"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut cfg = QuakeConfig::default();
        cfg.sources[1].timeout_secs = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn duplicate_source_names_rejected() {
        let mut cfg = QuakeConfig::default();
        let dup = cfg.sources[0].clone();
        cfg.sources.push(dup);
        assert!(matches!(
            validate_config(&cfg),
            Err(ValidationError::SemanticError(_))
        ));
    }
}
