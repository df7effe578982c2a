//! Stress pattern classification.
//!
//! Extracts indicators from a fused event set (magnitude and depth trends,
//! inter-event intervals, cumulative energy growth, spatial spread and
//! migration) and classifies them into a [`StressPattern`]. The classifier
//! is a pure function of the indicators; a missing indicator reads as 0.

use chrono::{DateTime, Utc};
use qr_common::EarthquakeEvent;
use serde::{Deserialize, Serialize};

/// Classified stress pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressPattern {
    /// Rising magnitudes with temporal clustering.
    EscalatingSequence,
    /// Strong clustering in a small area.
    TightClustering,
    /// Cumulative energy growing quickly.
    RapidEnergyRelease,
    DecreasingActivity,
    DistributedActivity,
    NormalBackground,
    /// No events to analyze.
    InsufficientData,
}

impl std::fmt::Display for StressPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EscalatingSequence => write!(f, "escalating_sequence"),
            Self::TightClustering => write!(f, "tight_clustering"),
            Self::RapidEnergyRelease => write!(f, "rapid_energy_release"),
            Self::DecreasingActivity => write!(f, "decreasing_activity"),
            Self::DistributedActivity => write!(f, "distributed_activity"),
            Self::NormalBackground => write!(f, "normal_background"),
            Self::InsufficientData => write!(f, "insufficient_data"),
        }
    }
}

/// Indicators extracted from an event set. Each is present only when enough
/// events exist to compute it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressIndicators {
    /// Slope of magnitude vs index, chronological.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude_trend: Option<f64>,
    /// Population std of consecutive magnitude differences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude_acceleration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_trend: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_variance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_interval_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_variance: Option<f64>,
    /// `1 / (1 + mean_interval_hours / 24)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clustering_coefficient: Option<f64>,
    /// Slope of `ln(cumulative energy + 1)` vs index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_accumulation_rate: Option<f64>,
    /// (lat, lon)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_centroid: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_spread: Option<f64>,
    /// Recent-half centroid minus older-half centroid, (dlat, dlon).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_vector: Option<(f64, f64)>,
}

impl StressIndicators {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn trend(&self) -> f64 {
        self.magnitude_trend.unwrap_or(0.0)
    }

    fn clustering(&self) -> f64 {
        self.clustering_coefficient.unwrap_or(0.0)
    }

    fn energy_rate(&self) -> f64 {
        self.energy_accumulation_rate.unwrap_or(0.0)
    }

    fn spread(&self) -> f64 {
        self.spatial_spread.unwrap_or(0.0)
    }
}

/// Output of [`analyze_stress`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressAnalysis {
    pub pattern: StressPattern,
    pub indicators: StressIndicators,
    pub event_count: usize,
    pub analyzed_at: DateTime<Utc>,
}

/// Classify indicators. First matching rule wins.
pub fn classify(indicators: &StressIndicators) -> StressPattern {
    let trend = indicators.trend();
    let clustering = indicators.clustering();
    let spread = indicators.spread();

    if trend > 0.1 && clustering > 0.3 {
        StressPattern::EscalatingSequence
    } else if clustering > 0.5 && spread < 0.1 {
        StressPattern::TightClustering
    } else if indicators.energy_rate() > 2.0 {
        StressPattern::RapidEnergyRelease
    } else if trend < -0.1 {
        StressPattern::DecreasingActivity
    } else if spread > 0.3 {
        StressPattern::DistributedActivity
    } else {
        StressPattern::NormalBackground
    }
}

/// Extract indicators and classify.
///
/// `events` is the fused set, most recent first; trends are computed
/// chronologically.
pub fn analyze_stress(events: &[EarthquakeEvent], now: DateTime<Utc>) -> StressAnalysis {
    if events.is_empty() {
        return StressAnalysis {
            pattern: StressPattern::InsufficientData,
            indicators: StressIndicators::default(),
            event_count: 0,
            analyzed_at: now,
        };
    }

    let indicators = extract_indicators(events);
    StressAnalysis {
        pattern: classify(&indicators),
        indicators,
        event_count: events.len(),
        analyzed_at: now,
    }
}

fn extract_indicators(events: &[EarthquakeEvent]) -> StressIndicators {
    let n = events.len();
    let mut ordered: Vec<&EarthquakeEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.occurred_at);

    let magnitudes: Vec<f64> = ordered.iter().map(|e| e.magnitude).collect();
    let depths: Vec<f64> = ordered.iter().map(|e| e.depth_km).collect();
    let mut ind = StressIndicators::default();

    if n >= 3 {
        ind.magnitude_trend = qr_math::index_slope(&magnitudes).ok();
        ind.magnitude_acceleration = qr_math::population_std(&qr_math::diffs(&magnitudes));
        ind.depth_trend = qr_math::index_slope(&depths).ok();
        ind.depth_variance = qr_math::population_variance(&depths);
    }

    let intervals: Vec<f64> = ordered
        .windows(2)
        .map(|w| (w[1].occurred_at - w[0].occurred_at).num_milliseconds() as f64 / 3_600_000.0)
        .collect();
    if let Some(mean) = qr_math::mean(&intervals) {
        ind.average_interval_hours = Some(mean);
        ind.interval_variance = qr_math::population_variance(&intervals);
        ind.clustering_coefficient = Some(1.0 / (1.0 + mean / 24.0));
    }

    if n >= 5 {
        let energies: Vec<f64> = ordered.iter().map(|e| e.energy_joules()).collect();
        let log_cumulative: Vec<f64> = qr_math::cumulative_sum(&energies)
            .iter()
            .map(|c| (c + 1.0).ln())
            .collect();
        ind.energy_accumulation_rate = qr_math::index_slope(&log_cumulative)
            .ok()
            .filter(|r| r.is_finite());
    }

    if n >= 3 {
        let lats: Vec<f64> = events.iter().map(|e| e.latitude).collect();
        let lons: Vec<f64> = events.iter().map(|e| e.longitude).collect();
        if let (Some(lat_c), Some(lon_c), Some(lat_v), Some(lon_v)) = (
            qr_math::mean(&lats),
            qr_math::mean(&lons),
            qr_math::population_variance(&lats),
            qr_math::population_variance(&lons),
        ) {
            ind.spatial_centroid = Some((lat_c, lon_c));
            ind.spatial_spread = Some((lat_v + lon_v).sqrt());
        }

        if n >= 5 {
            let half = n / 2;
            if let (Some(rl), Some(rn), Some(ol), Some(on)) = (
                qr_math::mean(&lats[..half]),
                qr_math::mean(&lons[..half]),
                qr_math::mean(&lats[half..]),
                qr_math::mean(&lons[half..]),
            ) {
                ind.migration_vector = Some((rl - ol, rn - on));
            }
        }
    }

    ind
}

/// Coarse stress level for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StressLevel {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for StressLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// Stress level and its score in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressScore {
    pub level: StressLevel,
    pub score: f64,
}

impl StressLevel {
    /// Map an analysis to a level and adjusted score.
    pub fn from_analysis(analysis: &StressAnalysis) -> StressScore {
        let base = match analysis.pattern {
            StressPattern::EscalatingSequence => 85.0,
            StressPattern::TightClustering => 80.0,
            StressPattern::RapidEnergyRelease => 95.0,
            StressPattern::DecreasingActivity => 25.0,
            StressPattern::DistributedActivity => 50.0,
            StressPattern::NormalBackground => 15.0,
            StressPattern::InsufficientData => 0.0,
        };

        let ind = &analysis.indicators;
        let mut adjustment: f64 = 0.0;
        if !ind.is_empty() {
            let trend = ind.trend();
            if trend > 0.1 {
                adjustment += 10.0;
            } else if trend < -0.1 {
                adjustment -= 10.0;
            }
            if ind.clustering() > 0.5 {
                adjustment += 15.0;
            }
            if ind.energy_rate() > 2.0 {
                adjustment += 20.0;
            }
            let spread = ind.spread();
            if spread < 0.1 {
                adjustment += 5.0;
            } else if spread > 0.3 {
                adjustment -= 5.0;
            }
        }

        let score = (base + adjustment).clamp(0.0, 100.0);
        let level = if score >= 80.0 {
            Self::Critical
        } else if score >= 60.0 {
            Self::High
        } else if score >= 40.0 {
            Self::Medium
        } else if score >= 20.0 {
            Self::Low
        } else if score == 0.0 {
            Self::Unknown
        } else {
            Self::Low
        };
        StressScore { level, score }
    }
}
