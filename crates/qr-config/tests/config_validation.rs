//! Configuration loading, resolution, and validation against real files.

use qr_config::resolve::{resolve_config, ConfigSource, ENV_CONFIG_DIR, ENV_CONFIG_PATH};
use qr_config::{LoadedConfig, QuakeConfig, ValidationError};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let saved = keys.iter().map(|k| env::var(k).ok()).collect();
        for key in keys {
            env::remove_var(key);
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, saved) in self.keys.iter().zip(&self.saved) {
            match saved {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|p| p.into_inner());
    f()
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write config");
}

#[test]
fn explicit_path_wins_over_env() {
    with_env_lock(|| {
        let _env = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("explicit.json");
        let via_env = dir.path().join("env.json");
        write(&explicit, "{}");
        write(&via_env, "{}");
        env::set_var(ENV_CONFIG_PATH, &via_env);

        let paths = resolve_config(Some(&explicit));
        assert_eq!(paths.source, ConfigSource::ExplicitPath);
        assert_eq!(paths.config.as_deref(), Some(explicit.as_path()));
    });
}

#[test]
fn env_dir_probes_json_then_toml() {
    with_env_lock(|| {
        let _env = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("config.toml"), "[pipeline]\nwindow_cap = 42\n");
        env::set_var(ENV_CONFIG_DIR, dir.path());

        let loaded = LoadedConfig::load(None).expect("load from env dir");
        assert_eq!(loaded.paths.source, ConfigSource::Environment);
        assert_eq!(loaded.config.pipeline.window_cap, 42);
        assert_eq!(loaded.snapshot.summary.window_cap, 42);
        assert_eq!(loaded.snapshot.source, "environment variable");
    });
}

#[test]
fn json_round_trip_preserves_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let mut cfg = QuakeConfig::default();
    cfg.pipeline.min_magnitude = 3.0;
    cfg.regional_baseline.falloff_km = 400.0;
    write(&path, &cfg.to_json().unwrap());

    let back = QuakeConfig::from_file(&path).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn invalid_risk_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    write(
        &path,
        r#"{"regional_baseline": {"zones": [{"name": "x", "lat": 0.0, "lon": 0.0, "risk": 1.5}]}}"#,
    );
    let err = LoadedConfig::load(Some(&path)).unwrap_err();
    match err {
        qr_config::ConfigError::Validation(ValidationError::InvalidValue { field, .. }) => {
            assert_eq!(field, "regional_baseline.zones[0].risk");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_mismatch_rejected() {
    let cfg = QuakeConfig::from_json_str(r#"{"schema_version": "0.1.0"}"#).unwrap();
    assert!(matches!(
        cfg.validate(),
        Err(ValidationError::VersionMismatch { .. })
    ));
}

#[test]
fn zero_window_cap_rejected() {
    let cfg = QuakeConfig::from_toml_str("[pipeline]\nwindow_cap = 0\n").unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("window_cap"));
}

#[test]
fn missing_file_is_io_error() {
    let err = QuakeConfig::from_file(Path::new("/nonexistent/config.json")).unwrap_err();
    assert_eq!(err.code(), 10);
}
