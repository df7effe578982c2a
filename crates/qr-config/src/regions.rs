//! Regional seismic baseline and region bounding boxes.
//!
//! The baseline table drives three consumers: the tectonic stress index, the
//! regional-risk training feature, and the risk aggregator. All of them read
//! the same table through [`RegionalBaseline::risk_at`].

use qr_common::haversine_km;
use serde::{Deserialize, Serialize};

/// Risk floor returned far from every zone.
pub const BASELINE_FLOOR: f64 = 0.1;

/// One high-risk centre in the baseline table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineZone {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Peak risk at the centre, in [0, 1].
    pub risk: f64,
}

impl BaselineZone {
    fn new(name: &str, lat: f64, lon: f64, risk: f64) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lon,
            risk,
        }
    }
}

/// Baseline table with linear distance falloff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalBaseline {
    pub zones: Vec<BaselineZone>,
    #[serde(default = "default_falloff_km")]
    pub falloff_km: f64,
}

fn default_falloff_km() -> f64 {
    500.0
}

impl Default for RegionalBaseline {
    fn default() -> Self {
        Self {
            zones: vec![
                BaselineZone::new("Tokyo", 35.7, 139.7, 0.9),
                BaselineZone::new("San Francisco", 37.7, -122.4, 0.85),
                BaselineZone::new("Fukushima", 36.1, 140.1, 0.9),
                BaselineZone::new("Delhi", 28.6, 77.2, 0.7),
                BaselineZone::new("Istanbul", 41.0, 29.0, 0.8),
                BaselineZone::new("Jakarta", -6.2, 106.8, 0.75),
                BaselineZone::new("Mexico City", 19.4, -99.1, 0.8),
                BaselineZone::new("Santiago", -33.4, -70.6, 0.85),
            ],
            falloff_km: default_falloff_km(),
        }
    }
}

impl RegionalBaseline {
    /// Baseline risk at a point.
    ///
    /// Each zone within `falloff_km` contributes `risk · (1 − d / falloff)`;
    /// the maximum contribution wins, floored at [`BASELINE_FLOOR`].
    pub fn risk_at(&self, lat: f64, lon: f64) -> f64 {
        if !lat.is_finite() || !lon.is_finite() || self.falloff_km <= 0.0 {
            return BASELINE_FLOOR;
        }
        self.zones
            .iter()
            .filter_map(|z| {
                let d = haversine_km(lat, lon, z.lat, z.lon);
                (d < self.falloff_km).then(|| z.risk * (1.0 - d / self.falloff_km).max(0.0))
            })
            .fold(BASELINE_FLOOR, f64::max)
    }
}

/// Named latitude/longitude bounding box, inclusive on all edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBox {
    pub name: String,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl RegionBox {
    fn new(name: &str, lat: (f64, f64), lon: (f64, f64)) -> Self {
        Self {
            name: name.to_string(),
            min_lat: lat.0,
            max_lat: lat.1,
            min_lon: lon.0,
            max_lon: lon.1,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// Region name used when no box matches.
pub const GLOBAL_REGION: &str = "global";

/// Ordered built-in boxes. Order matters: overlapping boxes resolve to the
/// first match (a point in Taiwan is "japan" before "china").
pub fn default_region_boxes() -> Vec<RegionBox> {
    vec![
        RegionBox::new("india", (6.0, 38.0), (68.0, 98.0)),
        RegionBox::new("japan", (24.0, 46.0), (123.0, 146.0)),
        RegionBox::new("russia", (41.0, 82.0), (19.0, 180.0)),
        RegionBox::new("china", (18.0, 54.0), (73.0, 135.0)),
        RegionBox::new("indonesia", (-11.0, 21.0), (95.0, 141.0)),
        RegionBox::new("philippines", (5.0, 21.0), (116.0, 127.0)),
        RegionBox::new("australia", (-45.0, -9.0), (110.0, 160.0)),
        RegionBox::new("turkey", (35.0, 42.0), (26.0, 45.0)),
        RegionBox::new("italy", (35.0, 47.0), (6.0, 19.0)),
        RegionBox::new("greece", (34.0, 42.0), (19.0, 30.0)),
        RegionBox::new("iran", (25.0, 40.0), (44.0, 64.0)),
        RegionBox::new("california", (32.0, 42.0), (-125.0, -114.0)),
        RegionBox::new("chile", (-56.0, -17.0), (-76.0, -66.0)),
        RegionBox::new("peru", (-19.0, 0.0), (-82.0, -68.0)),
        RegionBox::new("colombia", (-5.0, 13.0), (-80.0, -66.0)),
        RegionBox::new("mexico", (14.0, 33.0), (-118.0, -86.0)),
        RegionBox::new("canada", (41.0, 84.0), (-141.0, -52.0)),
        RegionBox::new("norway", (55.0, 75.0), (-5.0, 35.0)),
        RegionBox::new("iceland", (63.0, 67.0), (-25.0, -13.0)),
        RegionBox::new("switzerland", (45.0, 48.0), (5.0, 11.0)),
    ]
}

/// First-match region lookup, falling back to [`GLOBAL_REGION`].
pub fn detect_region(boxes: &[RegionBox], lat: f64, lon: f64) -> &str {
    boxes
        .iter()
        .find(|b| b.contains(lat, lon))
        .map(|b| b.name.as_str())
        .unwrap_or(GLOBAL_REGION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_at_zone_centre_is_zone_risk() {
        let table = RegionalBaseline::default();
        assert!((table.risk_at(35.7, 139.7) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn risk_falls_off_linearly() {
        let table = RegionalBaseline {
            zones: vec![BaselineZone::new("x", 0.0, 0.0, 0.8)],
            falloff_km: 500.0,
        };
        let d = haversine_km(0.0, 0.0, 2.0, 0.0);
        let expected = 0.8 * (1.0 - d / 500.0);
        assert!((table.risk_at(2.0, 0.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn far_from_everything_is_floor() {
        let table = RegionalBaseline::default();
        assert_eq!(table.risk_at(-80.0, 0.0), BASELINE_FLOOR);
        assert_eq!(table.risk_at(f64::NAN, 0.0), BASELINE_FLOOR);
    }

    #[test]
    fn region_detection_is_first_match() {
        let boxes = default_region_boxes();
        assert_eq!(detect_region(&boxes, 28.6, 77.2), "india");
        assert_eq!(detect_region(&boxes, 35.7, 139.7), "japan");
        assert_eq!(detect_region(&boxes, 37.7, -122.4), "california");
        assert_eq!(detect_region(&boxes, -33.4, -70.6), "chile");
        // Istanbul sits inside the russia box, which is listed earlier.
        assert_eq!(detect_region(&boxes, 41.0, 29.0), "russia");
        assert_eq!(detect_region(&boxes, 0.0, -30.0), GLOBAL_REGION);
    }
}
