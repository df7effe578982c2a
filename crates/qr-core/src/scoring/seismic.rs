//! Individual seismological scores.
//!
//! Each function is total: small inputs and numeric failures map to a fixed
//! fallback value, never an error. Inputs are assumed pre-filtered to
//! finite values and ordered most recent first unless a function says
//! otherwise.

use chrono::{DateTime, Utc};
use qr_common::{EarthquakeEvent, GeoPoint};
use qr_config::RegionalBaseline;
use qr_math::{
    clamp_or_floor, coefficient_of_variation, cumulative_sum, index_slope, linear_slope, mean,
    polyfit, population_std,
};

use super::{ActivityTrend, WindowCounts};

/// Magnitude bin width for the frequency-magnitude fit.
pub const GR_BIN_WIDTH: f64 = 0.1;

/// Bin walk limit; a magnitude range wider than 20 units is not physical.
pub const MAX_GR_BINS: usize = 200;

/// Fallback b-value.
pub const DEFAULT_B_VALUE: f64 = 1.0;

/// Gutenberg-Richter b-value from the cumulative frequency-magnitude curve.
///
/// ```text
/// log10 N(M ≥ m) = a − b·m
/// ```
///
/// Needs at least 10 magnitudes and 3 non-empty bins; returns
/// [`DEFAULT_B_VALUE`] otherwise. Clamped to [0.1, 2.0].
pub fn gutenberg_richter_b(magnitudes: &[f64]) -> f64 {
    if magnitudes.len() < 10 {
        return DEFAULT_B_VALUE;
    }
    let (min, max) = magnitudes
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &m| (lo.min(m), hi.max(m)));
    let span = (max + GR_BIN_WIDTH - min) / GR_BIN_WIDTH;
    if !span.is_finite() || span <= 0.0 {
        return DEFAULT_B_VALUE;
    }
    let bin_count = (span.ceil() as usize).min(MAX_GR_BINS);
    if bin_count < 3 {
        return DEFAULT_B_VALUE;
    }

    let mut bins = Vec::with_capacity(bin_count);
    let mut log_counts = Vec::with_capacity(bin_count);
    for i in 0..bin_count {
        let bin = min + i as f64 * GR_BIN_WIDTH;
        let count = magnitudes.iter().filter(|&&m| m >= bin).count();
        if count == 0 {
            break;
        }
        bins.push(bin);
        log_counts.push((count as f64).log10());
    }
    if bins.len() < 3 {
        return DEFAULT_B_VALUE;
    }

    match linear_slope(&bins, &log_counts) {
        Ok(slope) => clamp_or_floor(-slope, 0.1, 2.0),
        Err(_) => DEFAULT_B_VALUE,
    }
}

/// Temporal clustering from the irregularity of inter-event gaps.
///
/// Score = clamp(cv / 2, 0.1, 1.0) where cv is the coefficient of variation
/// of the gaps in hours. Simultaneous events (mean gap 0) score 0.5.
pub fn temporal_clustering(times: &[DateTime<Utc>]) -> f64 {
    if times.len() < 3 {
        return 0.1;
    }
    let mut sorted = times.to_vec();
    sorted.sort();
    let gaps: Vec<f64> = sorted
        .windows(2)
        .map(|w| ((w[1] - w[0]).num_milliseconds() as f64 / 3_600_000.0).abs())
        .collect();
    match mean(&gaps) {
        None => 0.1,
        Some(m) if m == 0.0 => 0.5,
        Some(_) => match coefficient_of_variation(&gaps) {
            Some(cv) => clamp_or_floor(cv / 2.0, 0.1, 1.0),
            None => 0.5,
        },
    }
}

/// Spatial clustering around the query location.
///
/// Low dispersion of epicentral distances means tight clustering:
/// score = clamp(1 − cv / 3, 0.1, 1.0).
pub fn spatial_clustering(events: &[EarthquakeEvent], origin: &GeoPoint) -> f64 {
    if events.len() < 3 {
        return 0.1;
    }
    let distances: Vec<f64> = events
        .iter()
        .map(|e| origin.distance_km(&e.location()))
        .filter(|d| d.is_finite())
        .collect();
    if distances.len() < 3 {
        return 0.1;
    }
    match mean(&distances) {
        Some(m) if m == 0.0 => 0.5,
        Some(_) => match coefficient_of_variation(&distances) {
            Some(cv) => clamp_or_floor(1.0 - cv / 3.0, 0.1, 1.0),
            None => 0.5,
        },
        None => 0.1,
    }
}

/// Tectonic stress index: regional baseline blended with last-week energy
/// release and hypocentre depth.
pub fn tectonic_stress_index(
    events: &[EarthquakeEvent],
    origin: &GeoPoint,
    baseline: &RegionalBaseline,
    now: DateTime<Utc>,
) -> f64 {
    let regional = baseline.risk_at(origin.latitude, origin.longitude);
    let week: Vec<&EarthquakeEvent> = events
        .iter()
        .filter(|e| super::is_within(e, now, super::WEEK))
        .collect();
    if week.is_empty() {
        return clamp_or_floor(regional, 0.1, 1.0);
    }

    let total_energy: f64 = week.iter().map(|e| e.energy_joules()).sum();
    let energy_factor = ((total_energy + 1.0).log10() / 20.0).min(1.0);
    let depths: Vec<f64> = week.iter().map(|e| e.depth_km).collect();
    let depth_factor = mean(&depths).map_or(0.5, |d| (1.0 - d / 100.0).max(0.5));

    clamp_or_floor(
        0.4 * regional + 0.3 * energy_factor + 0.3 * depth_factor,
        0.1,
        1.0,
    )
}

/// Curvature of cumulative energy release.
///
/// Fits `ln(cumsum(E) + 1)` against event index (oldest first) with a
/// quadratic; positive curvature means accelerating release.
pub fn energy_release_pattern(events: &[EarthquakeEvent]) -> f64 {
    if events.len() < 5 {
        return 0.5;
    }
    let mut chronological: Vec<&EarthquakeEvent> = events.iter().collect();
    chronological.sort_by_key(|e| e.occurred_at);
    let energies: Vec<f64> = chronological.iter().map(|e| e.energy_joules()).collect();
    let log_cumulative: Vec<f64> = cumulative_sum(&energies)
        .into_iter()
        .map(|c| (c + 1.0).ln())
        .collect();
    let x: Vec<f64> = (0..log_cumulative.len()).map(|i| i as f64).collect();

    match polyfit(&x, &log_cumulative, 2) {
        Ok(coeffs) => clamp_or_floor(0.5 + 10.0 * coeffs[0], 0.1, 1.0),
        Err(_) => 0.5,
    }
}

/// Rising magnitudes across the 10 most recent events.
pub fn foreshock_pattern(events: &[EarthquakeEvent]) -> f64 {
    if events.len() < 5 {
        return 0.1;
    }
    let mut recent: Vec<f64> = events.iter().take(10).map(|e| e.magnitude).collect();
    recent.reverse();
    match index_slope(&recent) {
        Ok(slope) if slope > 0.0 => clamp_or_floor(2.0 * slope, 0.1, 1.0),
        _ => 0.1,
    }
}

/// 24-hour probability (percent) from rate, stress, and clustering factors.
pub fn base_probability(counts: &WindowCounts, gr: f64, temporal: f64, spatial: f64) -> f64 {
    let base_rate = counts.recent_30d as f64 / 30.0;
    let recent_multiplier = if counts.recent_7d > 0 && base_rate > 0.0 {
        ((counts.recent_7d as f64 / 7.0) / base_rate).min(5.0)
    } else {
        1.0
    };
    let daily_factor = (counts.recent_24h as f64 + 1.0).min(3.0);
    let stress_factor = (2.0 - gr).max(0.5);
    let clustering_factor = (temporal + spatial) / 2.0;

    let p = base_rate * recent_multiplier * daily_factor * stress_factor * clustering_factor * 100.0;
    clamp_or_floor(p, 0.01, 15.0)
}

/// Expected next magnitude from the 20 most recent events.
///
/// `mean + 0.5·std + max(0, (1 − b)·0.5)`, bounded to
/// `[2.0, min(max_recent + 1, 8.0)]`. When the upper bound falls below 2.0
/// the result is 2.0.
pub fn predicted_magnitude(events: &[EarthquakeEvent], gr: f64) -> f64 {
    let recent: Vec<f64> = events.iter().take(20).map(|e| e.magnitude).collect();
    let (Some(m), Some(s)) = (mean(&recent), population_std(&recent)) else {
        return 3.0;
    };
    let max_recent = recent.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let correction = ((1.0 - gr) * 0.5).max(0.0);
    let upper = (max_recent + 1.0).min(8.0);
    let predicted = m + 0.5 * s + correction;
    if predicted.is_nan() {
        return 2.0;
    }
    predicted.min(upper).max(2.0)
}

/// Completeness of the event set in [0, 1]: mean of quantity, time coverage,
/// and magnitude range terms.
pub fn data_quality(events: &[EarthquakeEvent]) -> f64 {
    if events.is_empty() {
        return 0.0;
    }
    let quantity = (events.len() as f64 / 50.0).min(1.0);

    let coverage = if events.len() > 1 {
        let (first, last) = events.iter().fold(
            (events[0].occurred_at, events[0].occurred_at),
            |(lo, hi), e| (lo.min(e.occurred_at), hi.max(e.occurred_at)),
        );
        let span_days = (last - first).num_milliseconds() as f64 / 86_400_000.0;
        (span_days / 30.0).min(1.0)
    } else {
        0.1
    };

    let (min_mag, max_mag) = events
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| {
            (lo.min(e.magnitude), hi.max(e.magnitude))
        });
    let completeness = ((max_mag - min_mag) / 3.0).min(1.0);

    clamp_or_floor((quantity + coverage + completeness) / 3.0, 0.0, 1.0)
}

/// Activity trend from window counts; first matching rule wins.
pub fn activity_trend(counts: &WindowCounts) -> ActivityTrend {
    let daily = counts.recent_24h as f64;
    let weekly = counts.recent_7d as f64 / 7.0;
    let monthly = counts.recent_30d as f64 / 30.0;

    if daily > weekly * 2.0 {
        ActivityTrend::RapidlyIncreasing
    } else if daily > weekly * 1.5 {
        ActivityTrend::Increasing
    } else if weekly > monthly * 1.5 {
        ActivityTrend::ModeratelyIncreasing
    } else if daily < weekly * 0.5 {
        ActivityTrend::Decreasing
    } else {
        ActivityTrend::Stable
    }
}

/// Statistical anomaly: joint tight clustering, or the five most recent
/// magnitudes running more than half a unit above the rest.
pub fn statistical_anomaly(events: &[EarthquakeEvent], temporal: f64, spatial: f64) -> bool {
    if temporal > 0.7 && spatial > 0.7 {
        return true;
    }
    if events.len() < 5 {
        return false;
    }
    let recent: Vec<f64> = events[..5].iter().map(|e| e.magnitude).collect();
    let rest: Vec<f64> = events[5..].iter().map(|e| e.magnitude).collect();
    match (mean(&recent), mean(&rest)) {
        (Some(r), Some(h)) => r > h + 0.5,
        _ => false,
    }
}
