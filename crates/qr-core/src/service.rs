//! Service context.
//!
//! [`QuakeService`] owns the configuration, the fusion engine, and the
//! ensemble predictor. Construct it once and share it via `Arc`; every
//! operation takes `&self`. Each operation has an `_at(now)` variant for
//! deterministic evaluation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use qr_common::GeoPoint;
use qr_config::QuakeConfig;
use serde::{Deserialize, Serialize};

use crate::ensemble::{EnsemblePredictor, ModelSuite, Prediction, PredictionResult, TrainingOutcome};
use crate::fusion::{CoverageReport, Fetcher, FusedEventSet, FusionEngine, HttpFetcher, SourceError};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::risk::{self, MeterBand, Recommendation, RiskAssessment};
use crate::scoring::ActivityTrend;
use crate::stress::{self, StressAnalysis, StressLevel, StressScore};

/// Most recent events left out of training.
const TRAINING_HOLDOUT: usize = 5;

/// Training runs only above this many fused events.
const TRAINING_THRESHOLD: usize = 10;

/// Everything one analysis produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveAnalysis {
    pub location: GeoPoint,
    pub region: String,
    pub event_count: usize,
    pub prediction: Prediction,
    pub stress: StressAnalysis,
    pub stress_level: StressScore,
    pub risk: RiskAssessment,
    pub recommendations: Vec<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_meter: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meter_band: Option<MeterBand>,
    pub weekly_trend: ActivityTrend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainingOutcome>,
    pub coverage: CoverageReport,
    pub analyzed_at: DateTime<Utc>,
}

pub struct QuakeService {
    config: QuakeConfig,
    fusion: FusionEngine,
    predictor: EnsemblePredictor,
    ctx: LogContext,
}

impl std::fmt::Debug for QuakeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuakeService")
            .field("run_id", &self.ctx.run_id)
            .field("fusion", &self.fusion)
            .field("trained", &self.predictor.is_trained())
            .finish()
    }
}

impl QuakeService {
    pub fn new(config: QuakeConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_suite(config, fetcher, ModelSuite::default())
    }

    /// Use custom model factories.
    pub fn with_suite(config: QuakeConfig, fetcher: Arc<dyn Fetcher>, suite: ModelSuite) -> Self {
        let ctx = LogContext::generate();
        let fusion = FusionEngine::new(&config, fetcher);
        let predictor = EnsemblePredictor::with_suite(config.regional_baseline.clone(), suite);
        log_event!(
            ctx,
            INFO,
            event_names::SERVICE_STARTED,
            Stage::Init,
            "service ready",
            sources = config.sources.len() as u64,
            regions = config.regions.len() as u64
        );
        Self {
            config,
            fusion,
            predictor,
            ctx,
        }
    }

    /// Service backed by live HTTP sources.
    pub fn with_http(config: QuakeConfig) -> Result<Self, SourceError> {
        Ok(Self::new(config, Arc::new(HttpFetcher::new()?)))
    }

    pub fn config(&self) -> &QuakeConfig {
        &self.config
    }

    pub fn log_context(&self) -> &LogContext {
        &self.ctx
    }

    pub fn predictor(&self) -> &EnsemblePredictor {
        &self.predictor
    }

    pub fn fusion(&self) -> &FusionEngine {
        &self.fusion
    }

    pub async fn get_comprehensive_earthquake_data(
        &self,
        location: &GeoPoint,
        radius_km: f64,
    ) -> (FusedEventSet, CoverageReport) {
        self.get_comprehensive_earthquake_data_at(location, radius_km, Utc::now())
            .await
    }

    pub async fn get_comprehensive_earthquake_data_at(
        &self,
        location: &GeoPoint,
        radius_km: f64,
        now: DateTime<Utc>,
    ) -> (FusedEventSet, CoverageReport) {
        self.fusion.fuse_at(&self.ctx, location, radius_km, now).await
    }

    pub fn predict(&self, events: &FusedEventSet, location: &GeoPoint) -> Prediction {
        self.predict_at(events, location, Utc::now())
    }

    pub fn predict_at(&self, events: &FusedEventSet, location: &GeoPoint, now: DateTime<Utc>) -> Prediction {
        self.predictor.predict_at(events.events(), location, now)
    }

    pub fn analyze_stress(&self, events: &FusedEventSet, location: &GeoPoint) -> StressAnalysis {
        self.analyze_stress_at(events, location, Utc::now())
    }

    pub fn analyze_stress_at(
        &self,
        events: &FusedEventSet,
        _location: &GeoPoint,
        now: DateTime<Utc>,
    ) -> StressAnalysis {
        stress::analyze_stress(events.events(), now)
    }

    pub fn assess_risk(
        &self,
        events: &FusedEventSet,
        prediction: &Prediction,
        stress: &StressAnalysis,
        location: &GeoPoint,
    ) -> RiskAssessment {
        self.assess_risk_at(events, prediction, stress, location, Utc::now())
    }

    pub fn assess_risk_at(
        &self,
        events: &FusedEventSet,
        prediction: &Prediction,
        stress: &StressAnalysis,
        location: &GeoPoint,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        risk::assess_risk(
            events.events(),
            prediction,
            stress,
            &self.config.regional_baseline,
            location,
            now,
        )
    }

    /// Train on a fused set. Safe to call with too little data.
    pub fn train(&self, events: &FusedEventSet, location: &GeoPoint) -> TrainingOutcome {
        self.train_at(events, location, Utc::now())
    }

    pub fn train_at(&self, events: &FusedEventSet, location: &GeoPoint, now: DateTime<Utc>) -> TrainingOutcome {
        self.train_on(events.events(), location, now)
    }

    fn train_on(
        &self,
        events: &[qr_common::EarthquakeEvent],
        location: &GeoPoint,
        now: DateTime<Utc>,
    ) -> TrainingOutcome {
        let outcome = self.predictor.train_at(events, location, now);
        match &outcome {
            TrainingOutcome::Skipped { usable, required } => log_event!(
                self.ctx,
                DEBUG,
                event_names::TRAIN_SKIPPED,
                Stage::Train,
                "not enough events to train",
                usable = *usable as u64,
                required = *required as u64
            ),
            TrainingOutcome::Failed { reason } => log_event!(
                self.ctx,
                WARN,
                event_names::TRAIN_FAILED,
                Stage::Train,
                "training failed, keeping previous models",
                error = reason.as_str()
            ),
            TrainingOutcome::Trained { rows, .. } => log_event!(
                self.ctx,
                INFO,
                event_names::TRAIN_FINISHED,
                Stage::Train,
                "models trained",
                rows = *rows as u64
            ),
        }
        outcome
    }

    /// Baseline-only estimate; never used as an implicit fallback.
    pub fn regional_estimate(&self, location: &GeoPoint) -> PredictionResult {
        self.regional_estimate_at(location, Utc::now())
    }

    pub fn regional_estimate_at(&self, location: &GeoPoint, now: DateTime<Utc>) -> PredictionResult {
        self.predictor.regional_estimate_at(location, now)
    }

    /// Fetch, train, predict, and assess in one call.
    pub async fn comprehensive_analysis(&self, location: &GeoPoint, radius_km: f64) -> ComprehensiveAnalysis {
        self.comprehensive_analysis_at(location, radius_km, Utc::now())
            .await
    }

    pub async fn comprehensive_analysis_at(
        &self,
        location: &GeoPoint,
        radius_km: f64,
        now: DateTime<Utc>,
    ) -> ComprehensiveAnalysis {
        let (events, coverage) = self
            .get_comprehensive_earthquake_data_at(location, radius_km, now)
            .await;

        let training = (events.len() > TRAINING_THRESHOLD)
            .then(|| self.train_on(&events.events()[TRAINING_HOLDOUT..], location, now));

        let prediction = self.predict_at(&events, location, now);
        let stress = self.analyze_stress_at(&events, location, now);
        let stress_level = StressLevel::from_analysis(&stress);
        let risk = self.assess_risk_at(&events, &prediction, &stress, location, now);
        let recommendations = risk::recommendations(&prediction, &stress, &risk);
        let dynamic_meter = risk::dynamic_meter_value(events.events(), &prediction, now);
        let weekly_trend = risk::weekly_trend(events.events(), now);

        log_event!(
            self.ctx,
            INFO,
            event_names::ANALYSIS_FINISHED,
            Stage::Risk,
            "analysis finished",
            region = coverage.region.as_str(),
            events = events.len() as u64,
            status = tracing::field::display(prediction.model_status()),
            risk = tracing::field::display(risk.risk_level)
        );

        ComprehensiveAnalysis {
            location: *location,
            region: coverage.region.clone(),
            event_count: events.len(),
            prediction,
            stress,
            stress_level,
            risk,
            recommendations,
            dynamic_meter,
            meter_band: dynamic_meter.map(MeterBand::from_value),
            weekly_trend,
            training,
            coverage,
            analyzed_at: now,
        }
    }
}
