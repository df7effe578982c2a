//! Structured logging for qr-core.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for dashboards and log shippers
//!
//! # Usage
//!
//! ```ignore
//! use qr_core::logging::{init_logging, LogConfig, LogContext, Stage, event_names};
//!
//! init_logging(&LogConfig::from_env(None, None));
//!
//! let ctx = LogContext::generate();
//! qr_core::log_event!(ctx, INFO, event_names::FETCH_STARTED, Stage::Fetch,
//!     "Fetching sources", sources = 4);
//! ```
//!
//! All log output goes to stderr. Events use their event name as the
//! tracing target, so `RUST_LOG=fetch=debug` narrows output to one stage.

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel, LogSettingError};
pub use events::{event_names, Level, LogContext, LogEvent, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem.
///
/// Call once at startup. A second call is a no-op: the global subscriber is
/// already set and `try_init` reports that without panicking.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init();
            } else {
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init();
            }
        }
        LogFormat::Jsonl => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(JsonlLayer::stderr())
                .try_init();
        }
    }
}

/// Initialize logging from the environment alone.
pub fn init_default_logging() {
    init_logging(&LogConfig::from_env(None, None));
}

/// Run identifier: `run-` plus 12 hex digits of a v4 UUID.
pub fn generate_run_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    format!("run-{id}")
}

/// Host identifier for correlating logs from several service instances.
///
/// First 8 characters of `/etc/machine-id`, else of a hash of `HOSTNAME`,
/// else random.
pub fn get_host_id() -> String {
    let machine_id = std::fs::read_to_string("/etc/machine-id")
        .ok()
        .map(|id| id.trim().to_string())
        .filter(|id| id.len() >= 8);
    let from_hostname = || {
        std::env::var("HOSTNAME").ok().map(|name| {
            use std::hash::{DefaultHasher, Hash, Hasher};
            let mut hasher = DefaultHasher::new();
            name.hash(&mut hasher);
            format!("{:016x}", hasher.finish())
        })
    };
    let mut id = machine_id
        .or_else(from_hostname)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
    id.truncate(8);
    format!("host-{id}")
}

/// Structured event logging with correlation context.
///
/// ```ignore
/// log_event!(ctx, WARN, event_names::FETCH_SOURCE_FAILED, Stage::Fetch,
///     "source failed", source = "usgs", error = tracing::field::display(&err));
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            stage = %$stage,
            message = $msg,
            $($key = $val,)*
        )
    };
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            stage = %$stage,
            message = $msg,
            $($key = $val,)*
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            target: $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            stage = %$stage,
            message = $msg,
            $($key = $val,)*
        )
    };
}
