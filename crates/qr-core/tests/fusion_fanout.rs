//! Fan-out behaviour with in-process fetchers: slow and failing sources must
//! not keep the others' events out of the fused set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use qr_common::GeoPoint;
use qr_config::{PayloadFormat, QuakeConfig, SourceDescriptor};
use qr_core::ensemble::ModelStatus;
use qr_core::fusion::{CoverageQuality, FetchRequest, Fetcher, SourceError};
use qr_core::{QuakeService, TrainingOutcome};
use serde_json::json;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()
}

fn tokyo() -> GeoPoint {
    GeoPoint::new(35.6762, 139.6503)
}

enum Behaviour {
    Payload(String),
    Fail,
    Hang,
}

struct ScriptedFetcher {
    script: HashMap<String, Behaviour>,
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, source: &SourceDescriptor, _: &FetchRequest) -> Result<String, SourceError> {
        match self.script.get(&source.name) {
            Some(Behaviour::Payload(body)) => Ok(body.clone()),
            Some(Behaviour::Hang) => {
                tokio::time::sleep(StdDuration::from_secs(3600)).await;
                Ok(String::new())
            }
            Some(Behaviour::Fail) | None => Err(SourceError::Http {
                source_name: source.name.clone(),
                status: 503,
            }),
        }
    }
}

/// GeoJSON with one feature per (magnitude, hours_ago, lat offset).
fn geojson(events: &[(f64, i64, f64)]) -> String {
    let features: Vec<_> = events
        .iter()
        .map(|&(mag, hours_ago, dlat)| {
            json!({
                "type": "Feature",
                "properties": {
                    "mag": mag,
                    "place": "near Tokyo",
                    "time": (now() - Duration::hours(hours_ago)).timestamp_millis(),
                },
                "geometry": {"type": "Point", "coordinates": [139.65, 35.68 + dlat, 20.0]}
            })
        })
        .collect();
    json!({"type": "FeatureCollection", "features": features}).to_string()
}

fn config(sources: &[(&str, PayloadFormat)]) -> QuakeConfig {
    let mut config = QuakeConfig::default();
    config.sources = sources
        .iter()
        .map(|(name, format)| SourceDescriptor::new(name, "mock://{lat},{lon}", *format, 2))
        .collect();
    config
}

fn service(sources: &[(&str, PayloadFormat)], script: Vec<(&str, Behaviour)>) -> QuakeService {
    let fetcher = ScriptedFetcher {
        script: script.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    };
    QuakeService::new(config(sources), Arc::new(fetcher))
}

#[tokio::test(start_paused = true)]
async fn slow_and_failing_sources_are_excluded() {
    let svc = service(
        &[
            ("primary", PayloadFormat::Geojson),
            ("slow", PayloadFormat::Geojson),
            ("broken", PayloadFormat::Geojson),
        ],
        vec![
            ("primary", Behaviour::Payload(geojson(&[(4.1, 1, 0.0), (3.2, 30, 0.5)]))),
            ("slow", Behaviour::Hang),
            ("broken", Behaviour::Fail),
        ],
    );

    let (events, coverage) = svc
        .get_comprehensive_earthquake_data_at(&tokyo(), 500.0, now())
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(coverage.sources_attempted.len(), 3);
    assert_eq!(coverage.sources_succeeded, vec!["primary".to_string()]);
    let failed: Vec<&str> = coverage.sources_failed.iter().map(|f| f.source.as_str()).collect();
    assert_eq!(failed, vec!["slow", "broken"]);
    assert!(coverage.sources_failed[0].reason.contains("timed out"));
    assert_eq!(coverage.data_quality, CoverageQuality::Basic);
    assert_eq!(coverage.completeness_pct, 10.0);
}

#[tokio::test(start_paused = true)]
async fn unparseable_payload_counts_as_failure() {
    let svc = service(
        &[("good", PayloadFormat::Geojson), ("garbled", PayloadFormat::Rss)],
        vec![
            ("good", Behaviour::Payload(geojson(&[(3.5, 2, 0.0)]))),
            ("garbled", Behaviour::Payload("<rss><channel><item></channel>".to_string())),
        ],
    );
    let (events, coverage) = svc
        .get_comprehensive_earthquake_data_at(&tokyo(), 500.0, now())
        .await;
    assert_eq!(events.len(), 1);
    assert_eq!(coverage.sources_failed.len(), 1);
    assert_eq!(coverage.sources_failed[0].source, "garbled");
}

#[tokio::test(start_paused = true)]
async fn cross_source_duplicates_keep_first_source() {
    let shared = geojson(&[(4.0, 3, 0.0)]);
    let nearly = geojson(&[(4.2, 3, 0.01)]);
    let svc = service(
        &[("usgs", PayloadFormat::Geojson), ("emsc", PayloadFormat::Geojson)],
        vec![("usgs", Behaviour::Payload(shared)), ("emsc", Behaviour::Payload(nearly))],
    );
    let (events, coverage) = svc
        .get_comprehensive_earthquake_data_at(&tokyo(), 500.0, now())
        .await;
    assert_eq!(events.len(), 1);
    assert_eq!(events.events()[0].source, "usgs");
    assert_eq!(coverage.dedup.dropped, 1);
    assert_eq!(coverage.data_quality, CoverageQuality::Medium);
}

#[tokio::test(start_paused = true)]
async fn distance_filter_uses_source_radius() {
    // 5 degrees of latitude is about 556 km.
    let svc = service(
        &[("usgs", PayloadFormat::Geojson)],
        vec![("usgs", Behaviour::Payload(geojson(&[(4.0, 1, 0.0), (4.5, 2, 5.0)])))],
    );
    let (events, coverage) = svc
        .get_comprehensive_earthquake_data_at(&tokyo(), 500.0, now())
        .await;
    assert_eq!(events.len(), 1);
    assert_eq!(coverage.normalized, 2);
    assert_eq!(coverage.in_radius, 1);
    assert!(events.events()[0].distance_km < 5.0);
}

#[tokio::test(start_paused = true)]
async fn every_source_failing_yields_no_data_sentinel() {
    let svc = service(
        &[("a", PayloadFormat::Geojson), ("b", PayloadFormat::Rss)],
        vec![("a", Behaviour::Fail), ("b", Behaviour::Hang)],
    );
    let analysis = svc.comprehensive_analysis_at(&tokyo(), 500.0, now()).await;
    assert_eq!(analysis.event_count, 0);
    assert!(analysis.prediction.is_no_data());
    assert_eq!(analysis.prediction.model_status(), ModelStatus::NoEarthquakeData);
    assert_eq!(analysis.dynamic_meter, None);
    assert!(analysis.training.is_none());
    assert_eq!(analysis.risk.risk_components.ml_prediction, 0.3);
}

#[tokio::test(start_paused = true)]
async fn comprehensive_analysis_trains_on_older_events() {
    let rows: Vec<(f64, i64, f64)> = (0..20)
        .map(|i| (2.8 + (i % 6) as f64 * 0.3, 6 * i as i64 + 1, (i % 4) as f64 * 0.1))
        .collect();
    let svc = service(
        &[("usgs", PayloadFormat::Geojson)],
        vec![("usgs", Behaviour::Payload(geojson(&rows)))],
    );

    let analysis = svc.comprehensive_analysis_at(&tokyo(), 500.0, now()).await;
    assert_eq!(analysis.event_count, 20);
    assert_eq!(analysis.region, "japan");
    assert!(matches!(
        analysis.training,
        Some(TrainingOutcome::Trained { rows: 15, .. })
    ));
    assert_eq!(analysis.prediction.model_status(), ModelStatus::AdvancedEnsemble);
    assert!(analysis.dynamic_meter.is_some());
    assert_eq!(analysis.recommendations.last().map(|r| r.title.as_str()), Some("Emergency Training"));
    assert!(svc.predictor().is_trained());
}
