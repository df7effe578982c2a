//! Pipeline thresholds.

use serde::{Deserialize, Serialize};

/// Pairwise duplicate criteria. All three must hold (strict `<`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupThresholds {
    pub max_time_gap_secs: f64,
    pub max_distance_km: f64,
    pub max_magnitude_delta: f64,
}

impl Default for DedupThresholds {
    fn default() -> Self {
        Self {
            max_time_gap_secs: 1800.0,
            max_distance_km: 10.0,
            max_magnitude_delta: 0.5,
        }
    }
}

/// Fusion and query defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dedup: DedupThresholds,
    /// Maximum events kept after deduplication, most recent first.
    pub window_cap: usize,
    /// Look-back window for feed queries.
    pub days: u32,
    pub min_magnitude: f64,
    pub default_radius_km: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedup: DedupThresholds::default(),
            window_cap: 300,
            days: 30,
            min_magnitude: 2.5,
            default_radius_km: 500.0,
        }
    }
}
