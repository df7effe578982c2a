//! Quake Risk core library.
//!
//! This library provides the fusion and scoring pipeline:
//! - Concurrent multi-source fetching and payload parsing
//! - Record normalization and cross-source deduplication
//! - Seismic feature scoring and the ensemble predictor
//! - Stress pattern classification and risk aggregation
//! - Structured logging with run correlation
//!
//! [`service::QuakeService`] ties the stages together.

pub mod dedup;
pub mod ensemble;
pub mod fusion;
pub mod logging;
pub mod normalize;
pub mod risk;
pub mod scoring;
pub mod service;
pub mod stress;

pub use dedup::{DedupStats, Deduplicator};
pub use ensemble::{EnsemblePredictor, ModelStatus, Prediction, PredictionResult, RiskLevel, TrainingOutcome};
pub use fusion::{CoverageReport, FetchRequest, Fetcher, FusedEventSet, HttpFetcher, SourceError};
pub use normalize::{normalize, NormalizeError, RawRecord};
pub use risk::{RiskAssessment, RiskCategory};
pub use scoring::{SeismicScoreBundle, SeismicScorer};
pub use service::{ComprehensiveAnalysis, QuakeService};
pub use stress::{StressAnalysis, StressLevel, StressPattern};
