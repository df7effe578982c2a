//! Criterion benchmarks for the scoring and prediction hotpaths.
//!
//! Benchmarks `SeismicScorer::score`, `Deduplicator::deduplicate`, untrained
//! and trained `EnsemblePredictor::predict_at`, and `analyze_stress` over
//! synthetic event sets of increasing size.

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qr_common::{EarthquakeEvent, GeoPoint};
use qr_config::RegionalBaseline;
use qr_core::ensemble::EnsemblePredictor;
use qr_core::scoring::SeismicScorer;
use qr_core::stress::analyze_stress;
use qr_core::Deduplicator;

// ── Helpers ──────────────────────────────────────────────────────────

const SIZES: [usize; 4] = [10, 100, 500, 1000];

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

fn origin() -> GeoPoint {
    GeoPoint::new(35.68, 139.69)
}

/// Deterministic spread of events over 30 days and about 2° around the origin.
fn synthetic_events(n: usize) -> Vec<EarthquakeEvent> {
    (0..n)
        .map(|i| {
            let f = i as f64;
            EarthquakeEvent::new(
                2.5 + (f * 0.37) % 3.5,
                35.68 + ((f * 0.13) % 2.0) - 1.0,
                139.69 + ((f * 0.29) % 2.0) - 1.0,
                5.0 + (f * 3.1) % 60.0,
                now() - Duration::minutes((i as i64 * 43) % (30 * 24 * 60)),
                "bench",
            )
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("seismic_score");
    let scorer = SeismicScorer::new(RegionalBaseline::default());

    for n in SIZES {
        let events = synthetic_events(n);
        group.bench_with_input(BenchmarkId::new("score", n), &events, |b, ev| {
            b.iter(|| {
                let bundle = scorer.score(black_box(ev), &origin(), now());
                black_box(bundle.base_probability);
            })
        });
    }

    group.finish();
}

fn bench_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup");
    let dedup = Deduplicator::default();

    for n in SIZES {
        let events = synthetic_events(n);
        group.bench_with_input(BenchmarkId::new("deduplicate", n), &events, |b, ev| {
            b.iter(|| {
                let (kept, _) = dedup.deduplicate(black_box(ev.clone()));
                black_box(kept.len());
            })
        });
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    group.sample_size(20);

    let untrained = EnsemblePredictor::new(RegionalBaseline::default());
    let trained = EnsemblePredictor::new(RegionalBaseline::default());
    trained.train_at(&synthetic_events(200), &origin(), now());

    for n in [10, 100, 1000] {
        let events = synthetic_events(n);
        group.bench_with_input(BenchmarkId::new("untrained", n), &events, |b, ev| {
            b.iter(|| black_box(untrained.predict_at(black_box(ev), &origin(), now())))
        });
        group.bench_with_input(BenchmarkId::new("trained", n), &events, |b, ev| {
            b.iter(|| black_box(trained.predict_at(black_box(ev), &origin(), now())))
        });
    }

    group.finish();
}

fn bench_stress(c: &mut Criterion) {
    let mut group = c.benchmark_group("stress");

    for n in SIZES {
        let events = synthetic_events(n);
        group.bench_with_input(BenchmarkId::new("analyze", n), &events, |b, ev| {
            b.iter(|| black_box(analyze_stress(black_box(ev), now()).pattern))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_score, bench_dedup, bench_predict, bench_stress);
criterion_main!(benches);
