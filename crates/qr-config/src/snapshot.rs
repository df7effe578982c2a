//! Configuration snapshots for diagnostics.
//!
//! A snapshot records which configuration a service instance started with,
//! so a prediction can be traced back to the exact baseline table and source
//! list that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::QuakeConfig;
use crate::resolve::ConfigPaths;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path the config was loaded from.
    #[serde(default)]
    pub path: Option<String>,

    /// Source of the configuration.
    pub source: String,

    /// SHA-256 of the raw file content, or of the effective JSON for defaults.
    pub content_hash: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub baseline_zone_count: usize,
    pub region_count: usize,
    pub source_names: Vec<String>,
    pub window_cap: usize,
    pub days: u32,
}

impl ConfigSnapshot {
    /// Snapshot a loaded configuration. `raw` is the file content, if any.
    pub fn new(config: &QuakeConfig, paths: &ConfigPaths, raw: Option<&str>) -> Self {
        let content_hash = match raw {
            Some(content) => hash_content(content),
            None => hash_content(&config.to_json().unwrap_or_default()),
        };
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            path: paths.config.as_ref().map(|p| p.display().to_string()),
            source: paths.source.to_string(),
            content_hash,
            summary: ConfigSummary {
                baseline_zone_count: config.regional_baseline.zones.len(),
                region_count: config.regions.len(),
                source_names: config.sources.iter().map(|s| s.name.clone()).collect(),
                window_cap: config.pipeline.window_cap,
                days: config.pipeline.days,
            },
        }
    }

    /// Create a snapshot of the built-in defaults.
    pub fn defaults_only() -> Self {
        Self::new(&QuakeConfig::default(), &ConfigPaths::default(), None)
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this snapshot matches another (same config content).
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.content_hash == other.content_hash
    }

    /// Get a short identifier for this snapshot (first 12 chars of hash).
    pub fn short_id(&self) -> &str {
        &self.content_hash[..12.min(self.content_hash.len())]
    }
}

/// Hash content with SHA-256 and return hex string.
fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_snapshot() {
        let snapshot = ConfigSnapshot::defaults_only();
        assert_eq!(snapshot.schema_version, crate::CONFIG_SCHEMA_VERSION);
        assert!(snapshot.path.is_none());
        assert_eq!(snapshot.source, "builtin default");
        assert_eq!(snapshot.summary.window_cap, 300);
        assert!(snapshot.summary.source_names.contains(&"usgs".to_string()));
    }

    #[test]
    fn test_snapshot_short_id() {
        assert_eq!(ConfigSnapshot::defaults_only().short_id().len(), 12);
    }

    #[test]
    fn test_snapshot_matches() {
        assert!(ConfigSnapshot::defaults_only().matches(&ConfigSnapshot::defaults_only()));
    }

    #[test]
    fn test_hash_content() {
        let hash1 = hash_content("test");
        assert_eq!(hash1, hash_content("test"));
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let snapshot = ConfigSnapshot::defaults_only();
        let json = snapshot.to_json().unwrap();
        let restored = ConfigSnapshot::from_json(&json).unwrap();
        assert!(snapshot.matches(&restored));
    }
}
