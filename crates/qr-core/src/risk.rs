//! Risk aggregation.
//!
//! Folds recent activity, the ensemble prediction, the stress pattern, and
//! the regional baseline into one weighted score with a label and display
//! colour. Also derives recommendations, the dynamic meter, and the weekly
//! trend.

use chrono::{DateTime, Utc};
use qr_common::{EarthquakeEvent, GeoPoint};
use qr_config::RegionalBaseline;
use serde::{Deserialize, Serialize};

use crate::ensemble::Prediction;
use crate::scoring::{is_within, ActivityTrend, WindowCounts, WEEK};
use crate::stress::{StressAnalysis, StressPattern};

/// Component weights for the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub activity: f64,
    pub ml: f64,
    pub stress: f64,
    pub regional: f64,
}

pub const RISK_WEIGHTS: RiskWeights = RiskWeights {
    activity: 0.3,
    ml: 0.4,
    stress: 0.2,
    regional: 0.1,
};

/// Horizon of an assessment, days.
pub const TIME_HORIZON_DAYS: u32 = 7;

/// Overall risk label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskCategory {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::VeryHigh
        } else if score >= 0.6 {
            Self::High
        } else if score >= 0.4 {
            Self::Moderate
        } else if score >= 0.2 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    /// Display colour.
    pub fn color(&self) -> &'static str {
        match self {
            Self::VeryHigh => "#FF0000",
            Self::High => "#FF6600",
            Self::Moderate => "#FFA500",
            Self::Low => "#FFFF00",
            Self::VeryLow => "#00FF00",
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VeryLow => write!(f, "very_low"),
            Self::Low => write!(f, "low"),
            Self::Moderate => write!(f, "moderate"),
            Self::High => write!(f, "high"),
            Self::VeryHigh => write!(f, "very_high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskComponents {
    pub recent_activity: f64,
    pub ml_prediction: f64,
    pub stress_pattern: f64,
    pub regional_baseline: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk_score: f64,
    pub risk_level: RiskCategory,
    pub risk_color: String,
    pub risk_components: RiskComponents,
    pub confidence_level: f64,
    pub time_horizon_days: u32,
}

/// Risk contribution of a stress pattern.
pub fn stress_risk(pattern: StressPattern) -> f64 {
    match pattern {
        StressPattern::EscalatingSequence => 0.8,
        StressPattern::TightClustering => 0.7,
        StressPattern::RapidEnergyRelease => 0.9,
        StressPattern::DistributedActivity => 0.4,
        StressPattern::DecreasingActivity => 0.2,
        StressPattern::NormalBackground | StressPattern::InsufficientData => 0.3,
    }
}

/// Combine activity, prediction, stress, and regional risk.
pub fn assess_risk(
    events: &[EarthquakeEvent],
    prediction: &Prediction,
    stress: &StressAnalysis,
    baseline: &RegionalBaseline,
    location: &GeoPoint,
    now: DateTime<Utc>,
) -> RiskAssessment {
    let counts = WindowCounts::tally(events, now);
    let activity = (0.2 * counts.recent_24h as f64 + 0.05 * counts.recent_7d as f64).min(0.9);

    let (ml, confidence) = match prediction.result() {
        Some(r) => ((r.probability_24h / 20.0).clamp(0.0, 1.0), r.confidence_score),
        None => (0.3, 0.5),
    };
    let stress_part = stress_risk(stress.pattern);
    let regional = baseline.risk_at(location.latitude, location.longitude);

    let overall = RISK_WEIGHTS.activity * activity
        + RISK_WEIGHTS.ml * ml
        + RISK_WEIGHTS.stress * stress_part
        + RISK_WEIGHTS.regional * regional;
    let level = RiskCategory::from_score(overall);

    RiskAssessment {
        overall_risk_score: overall,
        risk_level: level,
        risk_color: level.color().to_string(),
        risk_components: RiskComponents {
            recent_activity: activity,
            ml_prediction: ml,
            stress_pattern: stress_part,
            regional_baseline: regional,
        },
        confidence_level: confidence,
        time_horizon_days: TIME_HORIZON_DAYS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    EmergencyPreparedness,
    Monitoring,
    Alert,
    LocalizedRisk,
    Anomaly,
    Preparation,
    Education,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,
}

impl Recommendation {
    fn new(priority: Priority, kind: RecommendationKind, title: &str, description: &str) -> Self {
        Self {
            priority,
            kind,
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// Ordered recommendations for an analysis.
pub fn recommendations(
    prediction: &Prediction,
    stress: &StressAnalysis,
    risk: &RiskAssessment,
) -> Vec<Recommendation> {
    use RecommendationKind as K;

    let mut out = Vec::new();
    if matches!(risk.risk_level, RiskCategory::VeryHigh | RiskCategory::High) {
        out.push(Recommendation::new(
            Priority::Critical,
            K::EmergencyPreparedness,
            "Enhanced Emergency Preparedness",
            "Review and update emergency kits, evacuation plans, and communication protocols.",
        ));
        out.push(Recommendation::new(
            Priority::High,
            K::Monitoring,
            "Increased Monitoring",
            "Monitor seismic activity closely. Consider temporary relocation if possible.",
        ));
    }

    match stress.pattern {
        StressPattern::EscalatingSequence => out.push(Recommendation::new(
            Priority::High,
            K::Alert,
            "Escalating Sequence Detected",
            "Seismic activity shows an escalating pattern. Avoid non-essential travel to affected areas.",
        )),
        StressPattern::TightClustering => out.push(Recommendation::new(
            Priority::Medium,
            K::LocalizedRisk,
            "Localized Seismic Cluster",
            "Earthquake activity is concentrated in a small area. Monitor local geological conditions.",
        )),
        _ => {}
    }

    if prediction.result().is_some_and(|r| r.anomaly_detected) {
        out.push(Recommendation::new(
            Priority::High,
            K::Anomaly,
            "Seismic Anomaly Detected",
            "Models detected unusual seismic patterns. Increased vigilance recommended.",
        ));
    }

    out.push(Recommendation::new(
        Priority::Medium,
        K::Preparation,
        "Structural Assessment",
        "Ensure buildings meet seismic safety standards. Secure heavy objects.",
    ));
    out.push(Recommendation::new(
        Priority::Low,
        K::Education,
        "Emergency Training",
        "Practice drop, cover, and hold on drills. Learn earthquake safety procedures.",
    ));
    out
}

/// Colour band of the dynamic meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterBand {
    Green,
    Orange,
    Red,
}

impl MeterBand {
    pub fn from_value(value: f64) -> Self {
        if value > 70.0 {
            Self::Red
        } else if value > 40.0 {
            Self::Orange
        } else {
            Self::Green
        }
    }
}

/// Live meter value in [0, 95], one decimal. `None` without data.
pub fn dynamic_meter_value(
    events: &[EarthquakeEvent],
    prediction: &Prediction,
    now: DateTime<Utc>,
) -> Option<f64> {
    let result = prediction.result()?;
    let recent: Vec<f64> = events.iter().take(5).map(|e| e.magnitude).collect();
    let mean_magnitude = qr_math::mean(&recent)?;

    let n24 = WindowCounts::tally(events, now).recent_24h;
    let activity = 1.0 + 0.1 * n24 as f64;
    let magnitude = (mean_magnitude / 4.0).min(1.5);
    let value = (result.probability_24h * activity * magnitude).min(95.0);
    Some((value * 10.0).round() / 10.0)
}

/// Last week against the week before.
pub fn weekly_trend(events: &[EarthquakeEvent], now: DateTime<Utc>) -> ActivityTrend {
    if events.len() < 10 {
        return ActivityTrend::Stable;
    }
    let recent = events.iter().filter(|e| is_within(e, now, WEEK)).count() as f64;
    let older = events
        .iter()
        .filter(|e| {
            let age = (now - e.occurred_at).num_milliseconds();
            age > WEEK && age < 2 * WEEK
        })
        .count() as f64;

    if recent > 1.2 * older {
        ActivityTrend::Increasing
    } else if recent < 0.8 * older {
        ActivityTrend::Decreasing
    } else {
        ActivityTrend::Stable
    }
}
