//! Property-based tests for deduplication, scoring bounds, and risk labels.
//!
//! Ensures that:
//! - Deduplication is idempotent and never merges clearly distinct events
//! - Score bundles stay inside their documented ranges for any input
//! - Prediction outputs stay bounded
//! - Risk labels never decrease as probability or magnitude grows

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use qr_common::{EarthquakeEvent, GeoPoint};
use qr_config::RegionalBaseline;
use qr_core::ensemble::{risk_level, EnsemblePredictor};
use qr_core::scoring::SeismicScorer;
use qr_core::Deduplicator;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap()
}

fn origin() -> GeoPoint {
    GeoPoint::new(35.0, 139.0)
}

fn event_strategy() -> impl Strategy<Value = EarthquakeEvent> {
    (
        2.0f64..7.5,
        34.5f64..35.5,
        138.5f64..139.5,
        0.0f64..80.0,
        0i64..(40 * 24 * 60),
    )
        .prop_map(|(mag, lat, lon, depth, minutes_ago)| {
            EarthquakeEvent::new(mag, lat, lon, depth, now() - Duration::minutes(minutes_ago), "prop")
        })
}

/// Wider ranges, including magnitudes outside the physical range and
/// future timestamps.
fn rough_event_strategy() -> impl Strategy<Value = EarthquakeEvent> {
    (
        -1.0f64..12.0,
        -89.0f64..89.0,
        -179.0f64..179.0,
        -5.0f64..700.0,
        -(24 * 60i64)..(400 * 24 * 60),
    )
        .prop_map(|(mag, lat, lon, depth, minutes_ago)| {
            EarthquakeEvent::new(mag, lat, lon, depth, now() - Duration::minutes(minutes_ago), "prop")
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn dedup_is_idempotent(events in prop::collection::vec(event_strategy(), 0..40)) {
        let dedup = Deduplicator::default();
        let (once, stats) = dedup.deduplicate(events.clone());
        let (twice, again) = dedup.deduplicate(once.clone());
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(again.dropped, 0);
        prop_assert_eq!(stats.kept + stats.dropped, events.len());
    }

    #[test]
    fn dedup_keeps_events_far_apart_in_time(
        first in event_strategy(),
        gap_secs in 1800i64..200_000,
    ) {
        let mut second = first.clone();
        second.occurred_at = first.occurred_at - Duration::seconds(gap_secs);
        let (kept, _) = Deduplicator::default().deduplicate(vec![first, second]);
        prop_assert_eq!(kept.len(), 2);
    }

    #[test]
    fn dedup_keeps_events_far_apart_in_space(
        first in event_strategy(),
        dlat in 0.1f64..2.0,
    ) {
        // 0.1° of latitude is about 11 km.
        let mut second = first.clone();
        second.latitude += dlat;
        let (kept, _) = Deduplicator::default().deduplicate(vec![first, second]);
        prop_assert_eq!(kept.len(), 2);
    }

    #[test]
    fn dedup_keeps_events_of_different_size(
        first in event_strategy(),
        delta in 0.5f64..3.0,
    ) {
        let mut second = first.clone();
        second.magnitude += delta;
        let (kept, _) = Deduplicator::default().deduplicate(vec![first, second]);
        prop_assert_eq!(kept.len(), 2);
    }

    #[test]
    fn score_bundle_stays_in_range(events in prop::collection::vec(rough_event_strategy(), 0..60)) {
        let bundle = SeismicScorer::default().score(&events, &origin(), now());

        prop_assert!((0.1..=2.0).contains(&bundle.gr_score));
        for score in [
            bundle.temporal_score,
            bundle.spatial_score,
            bundle.stress_index,
            bundle.energy_pattern,
            bundle.foreshock_score,
        ] {
            prop_assert!((0.1..=1.0).contains(&score), "score {} out of range", score);
        }
        prop_assert!((0.01..=15.0).contains(&bundle.base_probability));
        prop_assert!((0.0..=1.0).contains(&bundle.data_quality));
        prop_assert!(bundle.predicted_magnitude >= 2.0);
        prop_assert!(bundle.predicted_magnitude <= 8.0);
        prop_assert_eq!(bundle.event_count, events.len());
    }

    #[test]
    fn untrained_prediction_is_bounded(events in prop::collection::vec(rough_event_strategy(), 1..40)) {
        let predictor = EnsemblePredictor::new(RegionalBaseline::default());
        let prediction = predictor.predict_at(&events, &origin(), now());
        let result = prediction.result().expect("non-empty input is scored");

        prop_assert!((0.01..=20.0).contains(&result.probability_24h));
        prop_assert!((2.0..=8.0).contains(&result.predicted_magnitude));
        prop_assert!((0.001..=0.999).contains(&result.confidence_score));
        prop_assert_eq!(result.data_verification.total_data_points, events.len());
    }

    #[test]
    fn risk_level_is_monotone(
        p in 0.01f64..20.0,
        dp in 0.0f64..10.0,
        m in 2.0f64..8.0,
        dm in 0.0f64..3.0,
        stress in 0.1f64..1.0,
        anomaly in any::<bool>(),
    ) {
        let base = risk_level(p, m, stress, anomaly);
        prop_assert!(risk_level((p + dp).min(20.0), m, stress, anomaly) >= base);
        prop_assert!(risk_level(p, (m + dm).min(8.0), stress, anomaly) >= base);
    }
}
