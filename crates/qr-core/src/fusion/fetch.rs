//! Source fetching.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use qr_common::GeoPoint;
use qr_config::SourceDescriptor;
use thiserror::Error;

/// Kilometres per degree of great-circle arc.
const KM_PER_DEGREE: f64 = 111.195;

/// Query parameters shared by every source in one fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub location: GeoPoint,
    pub radius_km: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub min_magnitude: f64,
}

impl FetchRequest {
    /// Radius after the source's multiplier.
    pub fn radius_for(&self, source: &SourceDescriptor) -> f64 {
        self.radius_km * source.radius_multiplier
    }

    /// Expand a source's URL template.
    pub fn url_for(&self, source: &SourceDescriptor) -> String {
        let radius_km = self.radius_for(source);
        source
            .url
            .replace("{lat}", &format!("{:.4}", self.location.latitude))
            .replace("{lon}", &format!("{:.4}", self.location.longitude))
            .replace("{radius_km}", &format!("{radius_km:.0}"))
            .replace("{radius_deg}", &format!("{:.2}", radius_km / KM_PER_DEGREE))
            .replace("{start}", &self.start.to_rfc3339_opts(SecondsFormat::Secs, true))
            .replace("{end}", &self.end.to_rfc3339_opts(SecondsFormat::Secs, true))
            .replace("{min_magnitude}", &format!("{:.1}", self.min_magnitude))
    }
}

/// Why one source produced no payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("{source_name} timed out after {seconds}s")]
    Timeout { source_name: String, seconds: u64 },

    #[error("{source_name} returned HTTP {status}")]
    Http { source_name: String, status: u16 },

    #[error("{source_name} transport error: {message}")]
    Transport { source_name: String, message: String },
}

impl SourceError {
    pub fn source_name(&self) -> &str {
        match self {
            SourceError::Timeout { source_name, .. }
            | SourceError::Http { source_name, .. }
            | SourceError::Transport { source_name, .. } => source_name,
        }
    }
}

impl From<SourceError> for qr_common::Error {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Timeout {
                source_name,
                seconds,
            } => qr_common::Error::SourceTimeout {
                source_name,
                seconds,
            },
            other => qr_common::Error::SourceUnavailable {
                source_name: other.source_name().to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Retrieves one source's raw payload.
///
/// The fan-out applies its own per-source timeout around this call, so
/// implementations need not.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        request: &FetchRequest,
    ) -> Result<String, SourceError>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("quake-risk/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| SourceError::Transport {
                source_name: "client".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        request: &FetchRequest,
    ) -> Result<String, SourceError> {
        let url = request.url_for(source);
        let transport = |e: reqwest::Error| SourceError::Transport {
            source_name: source.name.clone(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(source.timeout_secs))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout {
                        source_name: source.name.clone(),
                        seconds: source.timeout_secs,
                    }
                } else {
                    transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                source_name: source.name.clone(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(transport)
    }
}
