//! Configuration resolution and path discovery.
//!
//! Resolution order: explicit path → environment variables → XDG paths →
//! system config → defaults.

use std::path::{Path, PathBuf};

/// Discovered configuration file path.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to the config file (or None if not found).
    pub config: Option<PathBuf>,

    /// Where the config was found (for diagnostics).
    pub source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided by the caller.
    ExplicitPath,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/quake-risk/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::ExplicitPath => write!(f, "explicit path"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "QUAKE_RISK_CONFIG";
pub const ENV_CONFIG_DIR: &str = "QUAKE_RISK_CONFIG_DIR";

/// Config file names probed inside a directory, in order.
const CONFIG_FILENAMES: [&str; 2] = ["config.json", "config.toml"];

/// Application name for XDG directories.
const APP_NAME: &str = "quake-risk";

/// Resolve the configuration path.
///
/// 1. Explicit path (if it exists)
/// 2. QUAKE_RISK_CONFIG
/// 3. QUAKE_RISK_CONFIG_DIR/config.{json,toml}
/// 4. XDG config directory (~/.config/quake-risk/)
/// 5. System config (/etc/quake-risk/)
/// 6. Built-in defaults (None)
pub fn resolve_config(explicit: Option<&Path>) -> ConfigPaths {
    if let Some(path) = explicit {
        if path.exists() {
            return found(path.to_path_buf(), ConfigSource::ExplicitPath);
        }
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return found(path, ConfigSource::Environment);
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        if let Some(path) = probe_dir(Path::new(&config_dir)) {
            return found(path, ConfigSource::Environment);
        }
    }

    if let Some(dir) = xdg_config_dir() {
        if let Some(path) = probe_dir(&dir) {
            return found(path, ConfigSource::XdgConfig);
        }
    }

    if let Some(path) = probe_dir(&system_config_dir()) {
        return found(path, ConfigSource::SystemConfig);
    }

    ConfigPaths::default()
}

fn found(path: PathBuf, source: ConfigSource) -> ConfigPaths {
    ConfigPaths {
        config: Some(path),
        source,
    }
}

fn probe_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Get the XDG config directory for quake-risk.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}
