//! Canonical earthquake event record.
//!
//! Every upstream payload (GeoJSON feature, RSS item, agency JSON) is
//! normalized into an [`EarthquakeEvent`] before it enters the pipeline.
//! Apart from `distance_km`, which is recomputed per query, the record is
//! treated as immutable once normalized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Default hypocentre depth when a source omits it.
pub const DEFAULT_DEPTH_KM: f64 = 10.0;

/// PAGER-style alert level reported by some agencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Green,
    Yellow,
    Orange,
    Red,
}

impl AlertLevel {
    /// Parse a source alert string. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "green" => Some(AlertLevel::Green),
            "yellow" => Some(AlertLevel::Yellow),
            "orange" => Some(AlertLevel::Orange),
            "red" => Some(AlertLevel::Red),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Green => write!(f, "green"),
            AlertLevel::Yellow => write!(f, "yellow"),
            AlertLevel::Orange => write!(f, "orange"),
            AlertLevel::Red => write!(f, "red"),
        }
    }
}

/// One earthquake as reported by one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarthquakeEvent {
    pub magnitude: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub occurred_at: DateTime<Utc>,
    pub place_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_level: Option<AlertLevel>,
    #[serde(default)]
    pub tsunami_flag: bool,
    /// Distance to the current query location; 0.0 until a query sets it.
    #[serde(default)]
    pub distance_km: f64,
    /// Feed that reported this record.
    #[serde(default)]
    pub source: String,
}

impl EarthquakeEvent {
    /// Minimal constructor; optional fields start empty.
    pub fn new(
        magnitude: f64,
        latitude: f64,
        longitude: f64,
        depth_km: f64,
        occurred_at: DateTime<Utc>,
        place_label: impl Into<String>,
    ) -> Self {
        Self {
            magnitude,
            latitude,
            longitude,
            depth_km,
            occurred_at,
            place_label: place_label.into(),
            source_url: None,
            alert_level: None,
            tsunami_flag: false,
            distance_km: 0.0,
            source: String::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_alert(mut self, alert: AlertLevel) -> Self {
        self.alert_level = Some(alert);
        self
    }

    pub fn with_tsunami(mut self, tsunami: bool) -> Self {
        self.tsunami_flag = tsunami;
        self
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Radiated seismic energy in joules, E = 10^(1.5 M + 4.8).
    pub fn energy_joules(&self) -> f64 {
        10f64.powf(1.5 * self.magnitude + 4.8)
    }

    /// Whether every numeric field is usable by the scorer.
    pub fn is_scorable(&self) -> bool {
        self.magnitude.is_finite() && self.depth_km.is_finite() && self.location().is_valid()
    }

    /// Recompute `distance_km` relative to a query location, rounded to 0.01 km.
    pub fn set_distance_from(&mut self, origin: &GeoPoint) {
        let d = origin.distance_km(&self.location());
        self.distance_km = (d * 100.0).round() / 100.0;
    }

    /// Age relative to `now` in fractional hours (negative for future stamps).
    pub fn hours_before(&self, now: DateTime<Utc>) -> f64 {
        (now - self.occurred_at).num_milliseconds() as f64 / 3_600_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> EarthquakeEvent {
        EarthquakeEvent::new(
            4.5,
            35.7,
            139.7,
            20.0,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            "near Tokyo",
        )
    }

    #[test]
    fn alert_level_parse() {
        assert_eq!(AlertLevel::parse("GREEN"), Some(AlertLevel::Green));
        assert_eq!(AlertLevel::parse(" red "), Some(AlertLevel::Red));
        assert_eq!(AlertLevel::parse("purple"), None);
        assert_eq!(AlertLevel::parse(""), None);
    }

    #[test]
    fn energy_grows_by_31_6_per_magnitude_unit() {
        let mut a = sample();
        let mut b = sample();
        a.magnitude = 4.0;
        b.magnitude = 5.0;
        let ratio = b.energy_joules() / a.energy_joules();
        assert!((ratio - 10f64.powf(1.5)).abs() < 1e-6);
    }

    #[test]
    fn set_distance_rounds_to_centimetre_of_km() {
        let mut e = sample();
        e.set_distance_from(&GeoPoint::new(35.0, 139.0));
        assert!(e.distance_km > 90.0 && e.distance_km < 110.0);
        assert_eq!((e.distance_km * 100.0).round() / 100.0, e.distance_km);
    }

    #[test]
    fn scorable_rejects_nan() {
        let mut e = sample();
        assert!(e.is_scorable());
        e.magnitude = f64::NAN;
        assert!(!e.is_scorable());
    }

    #[test]
    fn hours_before_now() {
        let e = sample();
        let now = e.occurred_at + chrono::Duration::minutes(90);
        assert!((e.hours_before(now) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn serde_skips_empty_optionals() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(!json.contains("source_url"));
        assert!(!json.contains("alert_level"));
        let back: EarthquakeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }
}
