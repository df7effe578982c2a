//! Seismic feature scoring.
//!
//! [`SeismicScorer::score`] turns a fused event set into a
//! [`SeismicScoreBundle`]: six bounded scientific scores, a base 24-hour
//! probability, a predicted magnitude, data quality, an activity trend, and a
//! statistical anomaly flag. Scoring never fails; every component has a
//! documented fallback for small or degenerate input.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use qr_common::GeoPoint;
//! use qr_config::RegionalBaseline;
//! use qr_core::scoring::SeismicScorer;
//!
//! let scorer = SeismicScorer::new(RegionalBaseline::default());
//! let bundle = scorer.score(&[], &GeoPoint::new(35.0, 139.0), Utc::now());
//! assert_eq!(bundle.data_quality, 0.0);
//! assert_eq!(bundle.predicted_magnitude, 3.0);
//! ```

pub mod seismic;

use chrono::{DateTime, Utc};
use qr_common::{EarthquakeEvent, GeoPoint};
use qr_config::RegionalBaseline;
use serde::{Deserialize, Serialize};

/// Window lengths in milliseconds.
pub const DAY: i64 = 86_400_000;
pub const WEEK: i64 = 7 * DAY;
pub const MONTH: i64 = 30 * DAY;

/// Whether `event` is strictly younger than `window_ms` at `now`.
///
/// Future-stamped events have negative age and count as recent.
pub fn is_within(event: &EarthquakeEvent, now: DateTime<Utc>, window_ms: i64) -> bool {
    (now - event.occurred_at).num_milliseconds() < window_ms
}

/// Finite events only, most recent first. The sort is stable.
pub fn scorable_events(events: &[EarthquakeEvent]) -> Vec<EarthquakeEvent> {
    let mut out: Vec<EarthquakeEvent> = events.iter().filter(|e| e.is_scorable()).cloned().collect();
    out.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    out
}

/// Event counts in the trailing 24 h / 7 d / 30 d windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounts {
    pub recent_24h: usize,
    pub recent_7d: usize,
    pub recent_30d: usize,
}

impl WindowCounts {
    pub fn tally(events: &[EarthquakeEvent], now: DateTime<Utc>) -> Self {
        let mut counts = Self::default();
        for e in events {
            let age = (now - e.occurred_at).num_milliseconds();
            if age < DAY {
                counts.recent_24h += 1;
            }
            if age < WEEK {
                counts.recent_7d += 1;
            }
            if age < MONTH {
                counts.recent_30d += 1;
            }
        }
        counts
    }
}

/// Short-term activity trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTrend {
    RapidlyIncreasing,
    Increasing,
    ModeratelyIncreasing,
    Stable,
    Decreasing,
}

impl std::fmt::Display for ActivityTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityTrend::RapidlyIncreasing => write!(f, "rapidly_increasing"),
            ActivityTrend::Increasing => write!(f, "increasing"),
            ActivityTrend::ModeratelyIncreasing => write!(f, "moderately_increasing"),
            ActivityTrend::Stable => write!(f, "stable"),
            ActivityTrend::Decreasing => write!(f, "decreasing"),
        }
    }
}

/// The six scientific scores, as reported alongside a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeismicFactors {
    pub gutenberg_richter_b_value: f64,
    pub temporal_clustering: f64,
    pub spatial_clustering: f64,
    pub tectonic_stress_index: f64,
    pub energy_release_pattern: f64,
    pub foreshock_pattern: f64,
}

/// Output of one scoring pass. Recomputed on every prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicScoreBundle {
    /// Gutenberg-Richter b-value, [0.1, 2.0].
    pub gr_score: f64,
    /// [0.1, 1.0]
    pub temporal_score: f64,
    /// [0.1, 1.0]
    pub spatial_score: f64,
    /// [0.1, 1.0]
    pub stress_index: f64,
    /// [0.1, 1.0]
    pub energy_pattern: f64,
    /// [0.1, 1.0]
    pub foreshock_score: f64,
    /// Percent, [0.01, 15.0].
    pub base_probability: f64,
    /// [2.0, min(max_recent + 1, 8.0)], or 3.0 with no events.
    pub predicted_magnitude: f64,
    /// [0, 1]
    pub data_quality: f64,
    pub activity_trend: ActivityTrend,
    pub anomaly_detected: bool,
    #[serde(flatten)]
    pub counts: WindowCounts,
    /// Events that survived the finiteness filter.
    pub event_count: usize,
}

impl SeismicScoreBundle {
    pub fn factors(&self) -> SeismicFactors {
        SeismicFactors {
            gutenberg_richter_b_value: self.gr_score,
            temporal_clustering: self.temporal_score,
            spatial_clustering: self.spatial_score,
            tectonic_stress_index: self.stress_index,
            energy_release_pattern: self.energy_pattern,
            foreshock_pattern: self.foreshock_score,
        }
    }
}

/// Computes [`SeismicScoreBundle`]s against a regional baseline.
#[derive(Debug, Clone, Default)]
pub struct SeismicScorer {
    baseline: RegionalBaseline,
}

impl SeismicScorer {
    pub fn new(baseline: RegionalBaseline) -> Self {
        Self { baseline }
    }

    pub fn baseline(&self) -> &RegionalBaseline {
        &self.baseline
    }

    /// Score an event set for a query location at `now`.
    pub fn score(
        &self,
        events: &[EarthquakeEvent],
        location: &GeoPoint,
        now: DateTime<Utc>,
    ) -> SeismicScoreBundle {
        let events = scorable_events(events);
        self.score_prepared(&events, location, now)
    }

    /// Score events already filtered and ordered by [`scorable_events`].
    pub fn score_prepared(
        &self,
        events: &[EarthquakeEvent],
        location: &GeoPoint,
        now: DateTime<Utc>,
    ) -> SeismicScoreBundle {
        let counts = WindowCounts::tally(events, now);
        let magnitudes: Vec<f64> = events.iter().map(|e| e.magnitude).collect();
        let times: Vec<DateTime<Utc>> = events.iter().map(|e| e.occurred_at).collect();

        let gr_score = seismic::gutenberg_richter_b(&magnitudes);
        let temporal_score = seismic::temporal_clustering(&times);
        let spatial_score = seismic::spatial_clustering(events, location);
        let stress_index = seismic::tectonic_stress_index(events, location, &self.baseline, now);
        let energy_pattern = seismic::energy_release_pattern(events);
        let foreshock_score = seismic::foreshock_pattern(events);
        let base_probability =
            seismic::base_probability(&counts, gr_score, temporal_score, spatial_score);

        SeismicScoreBundle {
            gr_score,
            temporal_score,
            spatial_score,
            stress_index,
            energy_pattern,
            foreshock_score,
            base_probability,
            predicted_magnitude: seismic::predicted_magnitude(events, gr_score),
            data_quality: seismic::data_quality(events),
            activity_trend: seismic::activity_trend(&counts),
            anomaly_detected: seismic::statistical_anomaly(events, temporal_score, spatial_score),
            counts,
            event_count: events.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    fn quake(mag: f64, age: Duration) -> EarthquakeEvent {
        EarthquakeEvent::new(mag, 35.0, 139.0, 10.0, now() - age, "t")
    }

    #[test]
    fn window_boundaries_are_strict() {
        let events = vec![
            quake(3.0, Duration::hours(24)),
            quake(3.0, Duration::hours(24) - Duration::milliseconds(1)),
            quake(3.0, Duration::days(7)),
            quake(3.0, Duration::days(29)),
            quake(3.0, Duration::hours(-2)),
        ];
        let c = WindowCounts::tally(&events, now());
        assert_eq!(c.recent_24h, 2);
        assert_eq!(c.recent_7d, 3);
        assert_eq!(c.recent_30d, 5);
    }

    #[test]
    fn scorable_events_filters_and_orders() {
        let mut bad = quake(3.0, Duration::hours(1));
        bad.depth_km = f64::NAN;
        let a = quake(3.1, Duration::hours(5));
        let b = quake(3.2, Duration::hours(2));
        let out = scorable_events(&[a.clone(), bad, b.clone()]);
        assert_eq!(out, vec![b, a]);
    }

    #[test]
    fn empty_set_bundle() {
        let bundle = SeismicScorer::default().score(&[], &GeoPoint::new(0.0, 0.0), now());
        assert_eq!(bundle.gr_score, 1.0);
        assert_eq!(bundle.temporal_score, 0.1);
        assert_eq!(bundle.spatial_score, 0.1);
        assert_eq!(bundle.energy_pattern, 0.5);
        assert_eq!(bundle.foreshock_score, 0.1);
        assert_eq!(bundle.base_probability, 0.01);
        assert_eq!(bundle.predicted_magnitude, 3.0);
        assert_eq!(bundle.data_quality, 0.0);
        assert_eq!(bundle.activity_trend, ActivityTrend::Stable);
        assert!(!bundle.anomaly_detected);
        assert_eq!(bundle.event_count, 0);
    }

    #[test]
    fn bundle_serializes_counts_flat() {
        let bundle = SeismicScorer::default().score(
            &[quake(3.0, Duration::hours(1))],
            &GeoPoint::new(35.0, 139.0),
            now(),
        );
        let v = serde_json::to_value(&bundle).unwrap();
        assert_eq!(v["recent_24h"], 1);
        assert_eq!(v["activity_trend"], "rapidly_increasing");
    }
}
