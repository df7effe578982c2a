//! Cross-source duplicate collapse.
//!
//! Agencies report the same rupture with slightly different origin times,
//! epicentres, and magnitudes. Two records describe one physical event when
//! all three differences fall strictly under the configured thresholds. The
//! first-seen record wins verbatim; nothing is merged.

use qr_common::EarthquakeEvent;
use qr_config::DedupThresholds;
use serde::{Deserialize, Serialize};

/// Counts from one deduplication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupStats {
    pub input: usize,
    pub kept: usize,
    pub dropped: usize,
}

/// Pairwise duplicate collapse.
///
/// O(n²) and order-dependent: each candidate is compared against accepted
/// events in insertion order and discarded on the first match.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator {
    thresholds: DedupThresholds,
}

impl Deduplicator {
    pub fn new(thresholds: DedupThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DedupThresholds {
        &self.thresholds
    }

    /// Whether `a` and `b` describe the same physical event.
    pub fn is_duplicate(&self, a: &EarthquakeEvent, b: &EarthquakeEvent) -> bool {
        let gap_secs = (a.occurred_at - b.occurred_at).num_milliseconds().abs() as f64 / 1000.0;
        if gap_secs >= self.thresholds.max_time_gap_secs {
            return false;
        }
        if (a.magnitude - b.magnitude).abs() >= self.thresholds.max_magnitude_delta {
            return false;
        }
        // NaN distance compares false and keeps both records.
        a.location().distance_km(&b.location()) < self.thresholds.max_distance_km
    }

    /// Keep one representative per physical event, preserving input order.
    pub fn deduplicate(&self, events: Vec<EarthquakeEvent>) -> (Vec<EarthquakeEvent>, DedupStats) {
        let input = events.len();
        let mut kept: Vec<EarthquakeEvent> = Vec::with_capacity(input);
        for candidate in events {
            if !kept.iter().any(|accepted| self.is_duplicate(&candidate, accepted)) {
                kept.push(candidate);
            }
        }
        let stats = DedupStats {
            input,
            kept: kept.len(),
            dropped: input - kept.len(),
        };
        (kept, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn event(mag: f64, lat: f64, lon: f64, minutes: i64, source: &str) -> EarthquakeEvent {
        let t0 = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        EarthquakeEvent::new(mag, lat, lon, 10.0, t0 + Duration::minutes(minutes), "test")
            .with_source(source)
    }

    #[test]
    fn empty_input() {
        let (out, stats) = Deduplicator::default().deduplicate(Vec::new());
        assert!(out.is_empty());
        assert_eq!(stats, DedupStats::default());
    }

    #[test]
    fn cross_source_duplicate_keeps_first_seen() {
        let usgs = event(4.5, 35.0, 139.0, 0, "usgs");
        let emsc = event(4.6, 35.02, 139.01, 3, "emsc");
        let (out, stats) = Deduplicator::default().deduplicate(vec![usgs.clone(), emsc]);
        assert_eq!(out, vec![usgs]);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn each_threshold_alone_separates() {
        let d = Deduplicator::default();
        let base = event(4.0, 35.0, 139.0, 0, "a");
        // 30 minutes is exactly the gap limit.
        assert!(!d.is_duplicate(&base, &event(4.0, 35.0, 139.0, 30, "b")));
        assert!(!d.is_duplicate(&base, &event(4.5, 35.0, 139.0, 0, "b")));
        // ~11 km north.
        assert!(!d.is_duplicate(&base, &event(4.0, 35.1, 139.0, 0, "b")));
        assert!(d.is_duplicate(&base, &event(4.4, 35.05, 139.0, 29, "b")));
    }

    #[test]
    fn matches_first_accepted_not_nearest() {
        // c is close to b but b was dropped as a duplicate of a; c is compared
        // to accepted events only and survives on magnitude.
        let a = event(3.0, 35.0, 139.0, 0, "a");
        let b = event(3.4, 35.0, 139.0, 1, "b");
        let c = event(3.8, 35.0, 139.0, 2, "c");
        let (out, _) = Deduplicator::default().deduplicate(vec![a.clone(), b, c.clone()]);
        assert_eq!(out, vec![a, c]);
    }

    #[test]
    fn custom_thresholds() {
        let d = Deduplicator::new(DedupThresholds {
            max_time_gap_secs: 60.0,
            max_distance_km: 1.0,
            max_magnitude_delta: 0.1,
        });
        let a = event(4.0, 35.0, 139.0, 0, "a");
        let b = event(4.05, 35.001, 139.0, 0, "b");
        let c = event(4.0, 35.0, 139.0, 2, "c");
        let (out, stats) = d.deduplicate(vec![a, b, c]);
        assert_eq!(out.len(), 2);
        assert_eq!(stats.kept, 2);
    }
}
