//! Multi-source fusion.
//!
//! One query fans out to every source that serves the query's region. Each
//! source is fetched under its own timeout; a source that fails, times out,
//! or returns an unreadable payload is logged and excluded without affecting
//! the others. Surviving payloads are parsed, normalized, distance-filtered,
//! deduplicated across sources, ordered most recent first, and capped.
//!
//! Source order in the configuration is the priority order for
//! deduplication: the first-seen record of a duplicate group is kept.

pub mod fetch;
pub mod parse;

pub use fetch::{FetchRequest, Fetcher, HttpFetcher, SourceError};
pub use parse::{parser_for, GeoJsonParser, ParseError, Parser, RssParser};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use qr_common::{EarthquakeEvent, GeoPoint};
use qr_config::regions::detect_region;
use qr_config::{PipelineConfig, QuakeConfig, RegionBox, SourceDescriptor};
use serde::{Deserialize, Serialize};

use crate::dedup::{DedupStats, Deduplicator};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::normalize::{normalize_batch, NormalizeStats, RawRecord};

/// Deduplicated events, most recent first, size-capped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FusedEventSet {
    events: Vec<EarthquakeEvent>,
}

impl FusedEventSet {
    /// Order `events` most recent first (stable for ties) and cap.
    pub fn from_events(mut events: Vec<EarthquakeEvent>, cap: usize) -> Self {
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        events.truncate(cap);
        Self { events }
    }

    pub fn events(&self) -> &[EarthquakeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EarthquakeEvent> {
        self.events.iter()
    }

    pub fn into_vec(self) -> Vec<EarthquakeEvent> {
        self.events
    }
}

impl AsRef<[EarthquakeEvent]> for FusedEventSet {
    fn as_ref(&self) -> &[EarthquakeEvent] {
        &self.events
    }
}

/// Coverage label from the number of sources that answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageQuality {
    High,
    Medium,
    Basic,
}

impl CoverageQuality {
    pub fn from_succeeded(succeeded: usize) -> Self {
        match succeeded {
            n if n >= 3 => Self::High,
            2 => Self::Medium,
            _ => Self::Basic,
        }
    }
}

/// One excluded source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
}

/// What happened during one fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub region: String,
    pub sources_attempted: Vec<String>,
    pub sources_succeeded: Vec<String>,
    pub sources_failed: Vec<SourceFailure>,
    pub raw_records: usize,
    pub normalized: usize,
    /// Normalized events inside the per-source radius.
    pub in_radius: usize,
    pub kept: usize,
    pub normalize: NormalizeStats,
    pub dedup: DedupStats,
    pub data_quality: CoverageQuality,
    /// min(100, 5 × kept)
    pub completeness_pct: f64,
    pub elapsed_ms: f64,
}

/// Fan-out, normalization, and deduplication over configured sources.
pub struct FusionEngine {
    fetcher: Arc<dyn Fetcher>,
    sources: Vec<SourceDescriptor>,
    regions: Vec<RegionBox>,
    pipeline: PipelineConfig,
    dedup: Deduplicator,
}

impl std::fmt::Debug for FusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionEngine")
            .field("sources", &self.sources.len())
            .field("regions", &self.regions.len())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Per-source result of the fetch and parse steps.
struct SourceResult<'a> {
    source: &'a SourceDescriptor,
    outcome: Result<Vec<RawRecord>, String>,
}

impl FusionEngine {
    pub fn new(config: &QuakeConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            sources: config.sources.clone(),
            regions: config.regions.clone(),
            pipeline: config.pipeline.clone(),
            dedup: Deduplicator::new(config.pipeline.dedup),
        }
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn deduplicator(&self) -> &Deduplicator {
        &self.dedup
    }

    /// Region name for a location.
    pub fn region_for(&self, location: &GeoPoint) -> String {
        detect_region(&self.regions, location.latitude, location.longitude).to_string()
    }

    /// Sources that take part in a query for `region`, in priority order.
    pub fn sources_for(&self, region: &str) -> Vec<&SourceDescriptor> {
        self.sources.iter().filter(|s| s.serves(region)).collect()
    }

    /// Fetch, normalize, and fuse events around `location` as of `now`.
    pub async fn fuse_at(
        &self,
        ctx: &LogContext,
        location: &GeoPoint,
        radius_km: f64,
        now: DateTime<Utc>,
    ) -> (FusedEventSet, CoverageReport) {
        let started = Instant::now();
        let region = self.region_for(location);
        let selected = self.sources_for(&region);
        let request = FetchRequest {
            location: *location,
            radius_km,
            start: now - chrono::Duration::days(i64::from(self.pipeline.days)),
            end: now,
            min_magnitude: self.pipeline.min_magnitude,
        };

        log_event!(
            ctx,
            INFO,
            event_names::FETCH_STARTED,
            Stage::Fetch,
            "fetching sources",
            region = region.as_str(),
            sources = selected.len() as u64
        );

        let results = join_all(selected.iter().map(|s| self.fetch_one(s, &request))).await;

        let mut report = CoverageReport {
            region: region.clone(),
            sources_attempted: selected.iter().map(|s| s.name.clone()).collect(),
            sources_succeeded: Vec::new(),
            sources_failed: Vec::new(),
            raw_records: 0,
            normalized: 0,
            in_radius: 0,
            kept: 0,
            normalize: NormalizeStats::default(),
            dedup: DedupStats::default(),
            data_quality: CoverageQuality::Basic,
            completeness_pct: 0.0,
            elapsed_ms: 0.0,
        };

        let mut candidates = Vec::new();
        for SourceResult { source, outcome } in results {
            let records = match outcome {
                Ok(records) => records,
                Err(reason) => {
                    log_event!(
                        ctx,
                        WARN,
                        event_names::FETCH_SOURCE_FAILED,
                        Stage::Fetch,
                        "source excluded",
                        source = source.name.as_str(),
                        error = reason.as_str()
                    );
                    report.sources_failed.push(SourceFailure {
                        source: source.name.clone(),
                        reason,
                    });
                    continue;
                }
            };

            report.sources_succeeded.push(source.name.clone());
            report.raw_records += records.len();
            let (events, stats) = normalize_batch(&records);
            report.normalized += stats.accepted;
            merge_stats(&mut report.normalize, &stats);

            let max_distance = request.radius_for(source);
            let before = candidates.len();
            candidates.extend(events.into_iter().filter_map(|mut e| {
                e.set_distance_from(location);
                (e.distance_km <= max_distance).then_some(e)
            }));
            log_event!(
                ctx,
                DEBUG,
                event_names::FETCH_SOURCE_OK,
                Stage::Fetch,
                "source fetched",
                source = source.name.as_str(),
                records = records.len() as u64,
                in_radius = (candidates.len() - before) as u64
            );
        }
        report.in_radius = candidates.len();

        let (unique, dedup_stats) = self.dedup.deduplicate(candidates);
        log_event!(
            ctx,
            DEBUG,
            event_names::DEDUP_FINISHED,
            Stage::Dedup,
            "deduplicated",
            input = dedup_stats.input as u64,
            kept = dedup_stats.kept as u64
        );

        let fused = FusedEventSet::from_events(unique, self.pipeline.window_cap);
        report.dedup = dedup_stats;
        report.kept = fused.len();
        report.data_quality = CoverageQuality::from_succeeded(report.sources_succeeded.len());
        report.completeness_pct = (5.0 * report.kept as f64).min(100.0);
        report.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        log_event!(
            ctx,
            INFO,
            event_names::FETCH_FINISHED,
            Stage::Fetch,
            "fusion finished",
            succeeded = report.sources_succeeded.len() as u64,
            failed = report.sources_failed.len() as u64,
            kept = report.kept as u64
        );
        (fused, report)
    }

    async fn fetch_one<'a>(
        &self,
        source: &'a SourceDescriptor,
        request: &FetchRequest,
    ) -> SourceResult<'a> {
        let limit = Duration::from_secs(source.timeout_secs);
        let fetched = match tokio::time::timeout(limit, self.fetcher.fetch(source, request)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout {
                source_name: source.name.clone(),
                seconds: source.timeout_secs,
            }),
        };

        let outcome = fetched
            .map_err(|e| e.to_string())
            .and_then(|payload| {
                parser_for(source.format)
                    .parse(&payload, &source.name)
                    .map_err(|e| e.to_string())
            });
        SourceResult { source, outcome }
    }
}

fn merge_stats(total: &mut NormalizeStats, part: &NormalizeStats) {
    total.input += part.input;
    total.accepted += part.accepted;
    for (reason, count) in &part.dropped {
        *total.dropped.entry(*reason).or_insert(0) += count;
    }
}
