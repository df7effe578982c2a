//! Upstream feed registry.
//!
//! A [`SourceDescriptor`] is pure data: a URL template, a payload format, a
//! timeout, and the regions it serves. Adding an agency means adding an
//! entry here or in the config file, never a new code path.

use serde::{Deserialize, Serialize};

/// Wire format of a feed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// GeoJSON FeatureCollection (USGS, GEOFON, EMSC FDSN JSON).
    Geojson,
    /// RSS 2.0 channel (EMSC, PTWC).
    Rss,
    /// GeoNet quake API, GeoJSON with `magnitude`/`locality` properties.
    Geonet,
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadFormat::Geojson => write!(f, "geojson"),
            PayloadFormat::Rss => write!(f, "rss"),
            PayloadFormat::Geonet => write!(f, "geonet"),
        }
    }
}

/// One upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    /// URL template. Recognized placeholders: `{lat}`, `{lon}`,
    /// `{radius_km}`, `{radius_deg}`, `{start}`, `{end}`, `{min_magnitude}`.
    pub url: String,
    pub format: PayloadFormat,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Regions this source serves; empty means every query.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Scales the query radius for this source.
    #[serde(default = "default_radius_multiplier")]
    pub radius_multiplier: f64,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_radius_multiplier() -> f64 {
    1.0
}

impl SourceDescriptor {
    pub fn new(name: &str, url: &str, format: PayloadFormat, timeout_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            format,
            timeout_secs,
            regions: Vec::new(),
            radius_multiplier: default_radius_multiplier(),
        }
    }

    pub fn with_regions(mut self, regions: &[&str]) -> Self {
        self.regions = regions.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Whether this source participates in a query for `region`.
    pub fn serves(&self, region: &str) -> bool {
        self.regions.is_empty() || self.regions.iter().any(|r| r == region)
    }
}

const PACIFIC_REGIONS: &[&str] = &[
    "japan",
    "indonesia",
    "philippines",
    "australia",
    "chile",
    "peru",
    "mexico",
    "california",
];

/// Built-in feed catalogue.
pub fn default_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new(
            "usgs",
            "https://earthquake.usgs.gov/fdsnws/event/1/query?format=geojson\
             &latitude={lat}&longitude={lon}&maxradiuskm={radius_km}\
             &starttime={start}&endtime={end}&minmagnitude={min_magnitude}&orderby=time",
            PayloadFormat::Geojson,
            15,
        ),
        SourceDescriptor::new(
            "emsc",
            "https://www.seismicportal.eu/fdsnws/event/1/query?format=json\
             &lat={lat}&lon={lon}&maxradius={radius_deg}\
             &starttime={start}&endtime={end}&minmag={min_magnitude}",
            PayloadFormat::Geojson,
            12,
        ),
        SourceDescriptor::new(
            "geofon",
            "https://geofon.gfz-potsdam.de/eqinfo/list.php?fmt=geojson&nmax=200",
            PayloadFormat::Geojson,
            10,
        ),
        SourceDescriptor::new(
            "emsc_rss",
            "https://www.emsc-csem.org/service/rss/rss.php?typ=emsc",
            PayloadFormat::Rss,
            8,
        ),
        SourceDescriptor::new(
            "geonet",
            "https://api.geonet.org.nz/quake?MMI=3",
            PayloadFormat::Geonet,
            8,
        )
        .with_regions(PACIFIC_REGIONS),
        SourceDescriptor::new(
            "ptwc",
            "https://ptwc.weather.gov/feeds/ptwc_rss_pacific.xml",
            PayloadFormat::Rss,
            8,
        )
        .with_regions(&["japan", "indonesia", "philippines", "australia", "chile", "peru"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_sources_serve_everything() {
        let sources = default_sources();
        let usgs = sources.iter().find(|s| s.name == "usgs").unwrap();
        assert!(usgs.serves("global"));
        assert!(usgs.serves("india"));
    }

    #[test]
    fn regional_sources_are_filtered() {
        let sources = default_sources();
        let ptwc = sources.iter().find(|s| s.name == "ptwc").unwrap();
        assert!(ptwc.serves("japan"));
        assert!(!ptwc.serves("italy"));
        let geonet = sources.iter().find(|s| s.name == "geonet").unwrap();
        assert!(geonet.serves("australia"));
        assert!(!geonet.serves("global"));
    }

    #[test]
    fn format_serde_is_snake_case() {
        let json = serde_json::to_string(&PayloadFormat::Geonet).unwrap();
        assert_eq!(json, "\"geonet\"");
    }
}
