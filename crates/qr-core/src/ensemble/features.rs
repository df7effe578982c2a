//! Per-event feature rows for the learned models.

use chrono::{DateTime, Utc};
use qr_common::EarthquakeEvent;
use qr_config::RegionalBaseline;

use crate::scoring::{is_within, DAY, WEEK};

pub const FEATURE_COUNT: usize = 12;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "magnitude",
    "distance_km",
    "hours_since",
    "depth_km",
    "nearby_count_24h",
    "nearby_count_7d",
    "regional_risk",
    "log_energy",
    "shallow",
    "depth_normalized",
    "magnitude_delta",
    "rolling_mean_magnitude",
];

/// Depth below which an event counts as shallow.
const SHALLOW_DEPTH_KM: f64 = 35.0;

/// Build one row per event.
///
/// `events` must be ordered most recent first with `distance_km` already
/// set for the query location. Row `i` describes `events[i]`.
pub fn build_feature_matrix(
    events: &[EarthquakeEvent],
    baseline: &RegionalBaseline,
    now: DateTime<Utc>,
) -> Vec<Vec<f64>> {
    let n = events.len();
    events
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let count_24h = events[..(i + 5).min(n)]
                .iter()
                .filter(|o| is_within(o, now, DAY))
                .count();
            let count_7d = events[..(i + 10).min(n)]
                .iter()
                .filter(|o| is_within(o, now, WEEK))
                .count();
            let delta = if i > 0 {
                e.magnitude - events[i - 1].magnitude
            } else {
                0.0
            };
            let window = &events[i.saturating_sub(5)..=i];
            let rolling_mean = window.iter().map(|o| o.magnitude).sum::<f64>() / window.len() as f64;

            vec![
                e.magnitude,
                e.distance_km,
                e.hours_before(now),
                e.depth_km,
                count_24h as f64,
                count_7d as f64,
                baseline.risk_at(e.latitude, e.longitude),
                1.5 * e.magnitude + 4.8,
                if e.depth_km < SHALLOW_DEPTH_KM { 1.0 } else { 0.0 },
                (e.depth_km / 100.0).min(1.0),
                delta,
                rolling_mean,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn rows_follow_event_order() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let events: Vec<EarthquakeEvent> = (0..8)
            .map(|i| {
                EarthquakeEvent::new(
                    3.0 + 0.1 * i as f64,
                    35.7,
                    139.7,
                    20.0 + 10.0 * i as f64,
                    now - Duration::hours(6 * i),
                    "t",
                )
            })
            .collect();
        let rows = build_feature_matrix(&events, &RegionalBaseline::default(), now);
        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(|r| r.len() == FEATURE_COUNT));

        let first = &rows[0];
        assert_eq!(first[0], 3.0);
        assert_eq!(first[2], 0.0);
        // events[0..5]: ages 0, 6, 12, 18, 24 h; the 24 h one is excluded.
        assert_eq!(first[4], 4.0);
        assert_eq!(first[5], 8.0);
        assert!((first[6] - 0.9).abs() < 1e-9);
        assert_eq!(first[8], 1.0);
        assert_eq!(first[10], 0.0);

        let last = &rows[7];
        assert!((last[10] - 0.1).abs() < 1e-9);
        assert_eq!(last[8], 0.0);
        assert_eq!(last[9], 0.9);
        // Mean of magnitudes at indices 2..=7.
        assert!((last[11] - 3.45).abs() < 1e-9);
    }
}
