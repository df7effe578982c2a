//! Raw feed record → canonical [`EarthquakeEvent`].
//!
//! Feeds disagree on almost everything: field names, time encodings, whether
//! coordinates are structured or buried in a description string. The
//! normalizer tries structured fields first and falls back to text patterns,
//! in a fixed order. A record that cannot produce a magnitude, a valid
//! coordinate pair, and an absolute timestamp is dropped with a typed reason.
//! "Now" is never substituted for a missing timestamp; callers that want that
//! behavior use [`normalize_with_fallback_time`] explicitly.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use qr_common::event::DEFAULT_DEPTH_KM;
use qr_common::geo::{is_valid_latitude, is_valid_longitude};
use qr_common::{AlertLevel, EarthquakeEvent};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One record as a parser produced it: a flat property map plus optional
/// GeoJSON geometry `[lon, lat, depth?]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: String,
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<f64>>,
}

impl RawRecord {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn with_coordinates(mut self, coords: Vec<f64>) -> Self {
        self.coordinates = Some(coords);
        self
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Why a record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeError {
    #[error("no magnitude field or pattern")]
    MissingMagnitude,
    #[error("magnitude found only outside [0, 10]")]
    MagnitudeOutOfRange,
    #[error("no coordinate pair")]
    MissingCoordinates,
    #[error("coordinates out of range")]
    CoordinatesOutOfRange,
    #[error("no timestamp")]
    MissingTime,
    #[error("unparseable timestamp")]
    InvalidTime,
    #[error("non-finite numeric value")]
    NonFiniteValue,
}

impl NormalizeError {
    pub fn code(&self) -> u32 {
        match self {
            NormalizeError::MissingMagnitude => 32,
            NormalizeError::MagnitudeOutOfRange => 33,
            NormalizeError::MissingCoordinates => 34,
            NormalizeError::CoordinatesOutOfRange => 35,
            NormalizeError::MissingTime => 36,
            NormalizeError::InvalidTime => 37,
            NormalizeError::NonFiniteValue => 38,
        }
    }
}

impl From<NormalizeError> for qr_common::Error {
    fn from(err: NormalizeError) -> Self {
        qr_common::Error::RecordMalformed(err.to_string())
    }
}

/// Per-batch normalization counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizeStats {
    pub input: usize,
    pub accepted: usize,
    pub dropped: BTreeMap<NormalizeError, usize>,
}

impl NormalizeStats {
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Normalize one record.
pub fn normalize(raw: &RawRecord) -> Result<EarthquakeEvent, NormalizeError> {
    let occurred_at = resolve_time(raw)?;
    build_event(raw, occurred_at)
}

/// Normalize one record, stamping `now` when no timestamp field exists.
///
/// A timestamp that exists but does not parse is still an error.
pub fn normalize_with_fallback_time(
    raw: &RawRecord,
    now: DateTime<Utc>,
) -> Result<EarthquakeEvent, NormalizeError> {
    let occurred_at = match resolve_time(raw) {
        Ok(t) => t,
        Err(NormalizeError::MissingTime) => now,
        Err(e) => return Err(e),
    };
    build_event(raw, occurred_at)
}

/// Normalize a batch. Drops are counted and logged, never propagated.
pub fn normalize_batch(records: &[RawRecord]) -> (Vec<EarthquakeEvent>, NormalizeStats) {
    let mut stats = NormalizeStats {
        input: records.len(),
        ..NormalizeStats::default()
    };
    let mut events = Vec::with_capacity(records.len());
    for raw in records {
        match normalize(raw) {
            Ok(event) => events.push(event),
            Err(reason) => *stats.dropped.entry(reason).or_insert(0) += 1,
        }
    }
    stats.accepted = events.len();
    if !stats.dropped.is_empty() {
        tracing::debug!(
            target: crate::logging::event_names::NORMALIZE_DROPPED,
            input = stats.input as u64,
            accepted = stats.accepted as u64,
            dropped = tracing::field::debug(&stats.dropped),
            "dropped malformed records"
        );
    }
    (events, stats)
}

fn build_event(raw: &RawRecord, occurred_at: DateTime<Utc>) -> Result<EarthquakeEvent, NormalizeError> {
    let magnitude = resolve_magnitude(raw)?;
    let (latitude, longitude) = resolve_coordinates(raw)?;
    let depth_km = resolve_depth(raw)?;

    let mut event = EarthquakeEvent::new(
        magnitude,
        latitude,
        longitude,
        depth_km,
        occurred_at,
        resolve_place(raw),
    )
    .with_source(raw.source.clone())
    .with_tsunami(resolve_tsunami(raw));

    if let Some(url) = raw.text("url").or_else(|| raw.text("link")) {
        event = event.with_url(url);
    }
    if let Some(alert) = raw.text("alert").and_then(AlertLevel::parse) {
        event = event.with_alert(alert);
    }
    Ok(event)
}

// ============================================================================
// Magnitude
// ============================================================================

const MAGNITUDE_KEYS: [&str; 2] = ["mag", "magnitude"];

fn magnitude_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)M\s*(\d+\.?\d*)",
            r"(?i)magnitude\s*(\d+\.?\d*)",
            r"(?i)mag\s*(\d+\.?\d*)",
            r"(?i)(\d+\.?\d*)\s*magnitude",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn resolve_magnitude(raw: &RawRecord) -> Result<f64, NormalizeError> {
    for key in MAGNITUDE_KEYS {
        if let Some(value) = raw.properties.get(key).and_then(numeric) {
            return if value.is_finite() {
                Ok(value)
            } else {
                Err(NormalizeError::NonFiniteValue)
            };
        }
    }

    let mut saw_out_of_range = false;
    for text in [raw.text("title"), raw.text("description")].into_iter().flatten() {
        for pattern in magnitude_patterns() {
            let Some(caps) = pattern.captures(text) else {
                continue;
            };
            let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
                continue;
            };
            if (0.0..=10.0).contains(&value) {
                return Ok(value);
            }
            saw_out_of_range = true;
        }
    }

    Err(if saw_out_of_range {
        NormalizeError::MagnitudeOutOfRange
    } else {
        NormalizeError::MissingMagnitude
    })
}

// ============================================================================
// Coordinates
// ============================================================================

enum CoordPattern {
    Signed(Regex),
    Hemisphere(Regex),
}

fn coordinate_patterns() -> &'static [CoordPattern] {
    static PATTERNS: OnceLock<Vec<CoordPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let mut out = Vec::new();
        if let Ok(re) = Regex::new(r"(?i)Lat:\s*(-?\d+\.?\d*)\s*,?\s*Lon:\s*(-?\d+\.?\d*)") {
            out.push(CoordPattern::Signed(re));
        }
        if let Ok(re) =
            Regex::new(r"(?i)(\d+\.?\d*)[°\s]*([NS])[,\s]*(\d+\.?\d*)[°\s]*([EW])")
        {
            out.push(CoordPattern::Hemisphere(re));
        }
        if let Ok(re) = Regex::new(r"(?i)lat[:\s]*(-?\d+\.?\d*)[,\s]*lon[:\s]*(-?\d+\.?\d*)") {
            out.push(CoordPattern::Signed(re));
        }
        if let Ok(re) = Regex::new(r"(-?\d+\.?\d+),\s*(-?\d+\.?\d+)") {
            out.push(CoordPattern::Signed(re));
        }
        out
    })
}

impl CoordPattern {
    fn extract(&self, text: &str) -> Option<(f64, f64)> {
        match self {
            CoordPattern::Signed(re) => {
                let caps = re.captures(text)?;
                let lat = caps.get(1)?.as_str().parse::<f64>().ok()?;
                let lon = caps.get(2)?.as_str().parse::<f64>().ok()?;
                Some((lat, lon))
            }
            CoordPattern::Hemisphere(re) => {
                let caps = re.captures(text)?;
                let mut lat = caps.get(1)?.as_str().parse::<f64>().ok()?;
                let mut lon = caps.get(3)?.as_str().parse::<f64>().ok()?;
                if caps.get(2)?.as_str().eq_ignore_ascii_case("S") {
                    lat = -lat;
                }
                if caps.get(4)?.as_str().eq_ignore_ascii_case("W") {
                    lon = -lon;
                }
                Some((lat, lon))
            }
        }
    }
}

fn valid_pair(lat: f64, lon: f64) -> bool {
    is_valid_latitude(lat) && is_valid_longitude(lon)
}

fn resolve_coordinates(raw: &RawRecord) -> Result<(f64, f64), NormalizeError> {
    let mut saw_out_of_range = false;
    let mut saw_non_finite = false;
    let mut check = |lat: f64, lon: f64| -> Option<(f64, f64)> {
        if valid_pair(lat, lon) {
            Some((lat, lon))
        } else {
            if lat.is_finite() && lon.is_finite() {
                saw_out_of_range = true;
            } else {
                saw_non_finite = true;
            }
            None
        }
    };

    if let Some(coords) = raw.coordinates.as_deref() {
        if let [lon, lat, ..] = coords {
            if let Some(pair) = check(*lat, *lon) {
                return Ok(pair);
            }
        }
    }

    let field = |keys: &[&str]| keys.iter().find_map(|k| raw.properties.get(*k).and_then(numeric));
    if let (Some(lat), Some(lon)) = (field(&["latitude", "lat"]), field(&["longitude", "lon"])) {
        if let Some(pair) = check(lat, lon) {
            return Ok(pair);
        }
    }

    for text in [raw.text("description"), raw.text("title")].into_iter().flatten() {
        for pattern in coordinate_patterns() {
            if let Some((lat, lon)) = pattern.extract(text) {
                if let Some(pair) = check(lat, lon) {
                    return Ok(pair);
                }
            }
        }
    }

    Err(if saw_out_of_range {
        NormalizeError::CoordinatesOutOfRange
    } else if saw_non_finite {
        NormalizeError::NonFiniteValue
    } else {
        NormalizeError::MissingCoordinates
    })
}

// ============================================================================
// Depth
// ============================================================================

fn depth_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)Depth:\s*(-?\d+\.?\d*)\s*km").ok())
        .as_ref()
}

fn resolve_depth(raw: &RawRecord) -> Result<f64, NormalizeError> {
    let depth = raw
        .coordinates
        .as_deref()
        .and_then(|c| c.get(2).copied())
        .or_else(|| raw.properties.get("depth").and_then(numeric))
        .or_else(|| {
            let text = raw.text("description")?;
            let caps = depth_pattern()?.captures(text)?;
            caps.get(1)?.as_str().parse::<f64>().ok()
        })
        .unwrap_or(DEFAULT_DEPTH_KM);
    if depth.is_finite() {
        Ok(depth)
    } else {
        Err(NormalizeError::NonFiniteValue)
    }
}

// ============================================================================
// Time
// ============================================================================

const TIME_KEYS: [&str; 4] = ["time", "pubDate", "published", "date"];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn resolve_time(raw: &RawRecord) -> Result<DateTime<Utc>, NormalizeError> {
    let mut present = false;
    for key in TIME_KEYS {
        let Some(value) = raw.properties.get(key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        present = true;
        if let Some(t) = parse_time_value(value) {
            return Ok(t);
        }
    }
    Err(if present {
        NormalizeError::InvalidTime
    } else {
        NormalizeError::MissingTime
    })
}

/// Parse a feed timestamp.
///
/// Order: epoch milliseconds, RFC 2822, RFC 3339, naive ISO 8601 as UTC.
pub fn parse_time_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let ms = n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))?;
            DateTime::from_timestamp_millis(ms)
        }
        Value::String(s) => parse_time_str(s),
        _ => None,
    }
}

fn parse_time_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis);
    }
    if let Ok(t) = DateTime::parse_from_rfc2822(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Misc fields
// ============================================================================

fn resolve_place(raw: &RawRecord) -> String {
    ["place", "title", "locality", "flynn_region"]
        .iter()
        .find_map(|k| raw.text(k))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Unknown location ({})", raw.source))
}

fn resolve_tsunami(raw: &RawRecord) -> bool {
    match raw.properties.get("tsunami") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "yes"),
        _ => false,
    }
}

/// Numeric value from a JSON number or a string with a leading number
/// (`"10.5"`, `"10 km"`).
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<f64>().ok().or_else(|| {
                let end = s
                    .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
                    .unwrap_or(s.len());
                s[..end].parse::<f64>().ok()
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn usgs_feature() -> RawRecord {
        RawRecord::new("usgs")
            .with("mag", 4.6)
            .with("place", "10 km SSW of Hualien City, Taiwan")
            .with("time", 1_767_225_600_000i64)
            .with("url", "https://earthquake.usgs.gov/earthquakes/eventpage/x")
            .with("alert", "green")
            .with("tsunami", 0)
            .with_coordinates(vec![121.55, 23.9, 15.2])
    }

    #[test]
    fn structured_geojson_feature() {
        let e = normalize(&usgs_feature()).unwrap();
        assert_eq!(e.magnitude, 4.6);
        assert_eq!(e.latitude, 23.9);
        assert_eq!(e.longitude, 121.55);
        assert_eq!(e.depth_km, 15.2);
        assert_eq!(e.occurred_at, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(e.alert_level, Some(AlertLevel::Green));
        assert!(!e.tsunami_flag);
        assert_eq!(e.source, "usgs");
    }

    #[test]
    fn emsc_rss_item_from_text() {
        let raw = RawRecord::new("emsc_rss")
            .with("title", "M 3.2 - CRETE, GREECE")
            .with("description", "Lat: 35.12, Lon: 25.40, Depth: 12 km")
            .with("pubDate", "Thu, 01 Jan 2026 03:04:05 +0000");
        let e = normalize(&raw).unwrap();
        assert_eq!(e.magnitude, 3.2);
        assert_eq!(e.latitude, 35.12);
        assert_eq!(e.longitude, 25.40);
        assert_eq!(e.depth_km, 12.0);
        assert_eq!(e.place_label, "M 3.2 - CRETE, GREECE");
        assert_eq!(e.occurred_at, Utc.with_ymd_and_hms(2026, 1, 1, 3, 4, 5).unwrap());
    }

    #[test]
    fn hemisphere_coordinates_are_signed() {
        let raw = RawRecord::new("ptwc")
            .with("title", "Magnitude 5.1 near coast")
            .with("description", "Location 33.5°S 72.1°W")
            .with("pubDate", "2026-01-01T00:00:00Z");
        let e = normalize(&raw).unwrap();
        assert_eq!(e.magnitude, 5.1);
        assert_eq!(e.latitude, -33.5);
        assert_eq!(e.longitude, -72.1);
        assert_eq!(e.depth_km, DEFAULT_DEPTH_KM);
    }

    #[test]
    fn out_of_range_text_magnitude_falls_through() {
        // "M 12" is out of range; the "4.4 magnitude" pattern resolves.
        let raw = RawRecord::new("x")
            .with("title", "M 12 quake, 4.4 magnitude")
            .with("latitude", 10.0)
            .with("longitude", 20.0)
            .with("time", "2026-01-01T00:00:00");
        assert_eq!(normalize(&raw).unwrap().magnitude, 4.4);
    }

    #[test]
    fn only_out_of_range_magnitude_is_typed() {
        let raw = RawRecord::new("x")
            .with("title", "M 42")
            .with("latitude", 10.0)
            .with("longitude", 20.0)
            .with("time", "2026-01-01T00:00:00");
        assert_eq!(normalize(&raw), Err(NormalizeError::MagnitudeOutOfRange));
    }

    #[test]
    fn explicit_magnitude_is_unclipped() {
        let raw = usgs_feature().with("mag", -0.4);
        assert_eq!(normalize(&raw).unwrap().magnitude, -0.4);
    }

    #[test]
    fn missing_time_drops_record() {
        let mut raw = usgs_feature();
        raw.properties.remove("time");
        assert_eq!(normalize(&raw), Err(NormalizeError::MissingTime));
    }

    #[test]
    fn invalid_time_is_distinct() {
        let raw = usgs_feature().with("time", "yesterday-ish");
        assert_eq!(normalize(&raw), Err(NormalizeError::InvalidTime));
    }

    #[test]
    fn fallback_time_only_covers_missing() {
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 2, 2, 2).unwrap();
        let mut raw = usgs_feature();
        raw.properties.remove("time");
        assert_eq!(normalize_with_fallback_time(&raw, now).unwrap().occurred_at, now);

        let bad = usgs_feature().with("time", "garbage");
        assert_eq!(
            normalize_with_fallback_time(&bad, now),
            Err(NormalizeError::InvalidTime)
        );
    }

    #[test]
    fn out_of_range_geometry_is_rejected() {
        let raw = usgs_feature().with_coordinates(vec![200.0, 95.0]);
        assert_eq!(normalize(&raw), Err(NormalizeError::CoordinatesOutOfRange));
    }

    #[test]
    fn time_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        for value in [
            json!(1_767_225_600_000i64),
            json!("1767225600000"),
            json!("Thu, 01 Jan 2026 00:00:00 GMT"),
            json!("2026-01-01T00:00:00Z"),
            json!("2026-01-01T01:00:00+01:00"),
            json!("2026-01-01T00:00:00.000"),
            json!("2026-01-01 00:00:00"),
        ] {
            assert_eq!(parse_time_value(&value), Some(expected), "{}", value);
        }
        assert_eq!(parse_time_value(&json!(true)), None);
    }

    #[test]
    fn place_falls_back_to_source() {
        let mut raw = usgs_feature();
        raw.properties.remove("place");
        assert_eq!(normalize(&raw).unwrap().place_label, "Unknown location (usgs)");
    }

    #[test]
    fn batch_counts_drop_reasons() {
        let mut no_time = usgs_feature();
        no_time.properties.remove("time");
        let records = vec![usgs_feature(), no_time.clone(), no_time, RawRecord::new("x")];
        let (events, stats) = normalize_batch(&records);
        assert_eq!(events.len(), 1);
        assert_eq!(stats.input, 4);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.dropped[&NormalizeError::MissingTime], 3);
        assert_eq!(stats.dropped_total(), 3);
    }
}
