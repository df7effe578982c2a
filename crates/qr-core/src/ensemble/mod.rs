//! Ensemble predictor.
//!
//! Combines the seismological score bundle with learned models into a
//! 24-hour probability, predicted magnitude, confidence, and risk level.
//!
//! # States
//!
//! - **Untrained**: the scorer's estimate is reported as-is with status
//!   `seismological_statistical`.
//! - **Trained**: the random forest and boosted regressor vote on magnitude
//!   (weights 0.4 / 0.4, renormalised over whichever succeeded), the
//!   isolation forest sets the anomaly flag, and the result is blended 60/40
//!   with the scorer's magnitude.
//!
//! An empty event set never produces numbers; it yields
//! [`Prediction::NoEventData`].
//!
//! # Concurrency
//!
//! The trained state sits behind `RwLock<Arc<TrainedModelState>>`. Readers
//! clone the `Arc` under a short read lock; training builds a complete state
//! off-lock and swaps it in under the write lock. Poisoned locks are
//! recovered.

pub mod features;
pub mod forest;
pub mod isolation;
pub mod model;
pub mod tree;

pub use features::{build_feature_matrix, FEATURE_COUNT, FEATURE_NAMES};
pub use forest::{BoostingConfig, ForestConfig, GradientBoostedRegressor, RandomForestRegressor};
pub use isolation::{IsolationConfig, IsolationForest};
pub use model::{
    AnomalyDetector, FittedModels, MagnitudeRegressor, ModelError, ModelSuite, ModelWeights,
    TrainedModelState, MODEL_WEIGHTS,
};
pub use tree::{RegressionTree, TreeParams};

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use qr_common::{EarthquakeEvent, GeoPoint};
use qr_config::RegionalBaseline;
use qr_math::StandardScaler;
use serde::{Deserialize, Serialize};

use crate::logging::event_names;
use crate::scoring::{scorable_events, ActivityTrend, SeismicFactors, SeismicScoreBundle, SeismicScorer};

/// Minimum usable events for training.
pub const MIN_TRAINING_EVENTS: usize = 10;

pub const NO_DATA_MESSAGE: &str =
    "No recent earthquake activity detected in this area. Cannot make predictions without data.";

/// Where a prediction's numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    SeismologicalStatistical,
    AdvancedEnsemble,
    RegionalStatistical,
    NoEarthquakeData,
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStatus::SeismologicalStatistical => write!(f, "seismological_statistical"),
            ModelStatus::AdvancedEnsemble => write!(f, "advanced_ensemble"),
            ModelStatus::RegionalStatistical => write!(f, "regional_statistical"),
            ModelStatus::NoEarthquakeData => write!(f, "no_earthquake_data"),
        }
    }
}

/// Qualitative risk label, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    #[serde(rename = "Low-Moderate")]
    LowModerate,
    Moderate,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::LowModerate => write!(f, "Low-Moderate"),
            RiskLevel::Moderate => write!(f, "Moderate"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

/// Provenance and volume figures attached to a prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataVerification {
    pub total_data_points: usize,
    pub recent_24h_events: usize,
    pub recent_7d_events: usize,
    pub models_used: Vec<String>,
    /// Regressors that contributed to the magnitude vote.
    pub ensemble_models: usize,
    pub data_quality_score: f64,
    pub elapsed_ms: f64,
}

/// Live meter reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicMeter {
    pub current_value: f64,
    pub trend: ActivityTrend,
    pub last_updated: DateTime<Utc>,
}

/// A numeric prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Percent, [0.01, 20].
    pub probability_24h: f64,
    /// [2.0, 8.0]
    pub predicted_magnitude: f64,
    /// [0.001, 0.999]
    pub confidence_score: f64,
    pub risk_level: RiskLevel,
    pub model_status: ModelStatus,
    pub anomaly_detected: bool,
    pub seismological_factors: SeismicFactors,
    pub data_verification: DataVerification,
    pub dynamic_meter: DynamicMeter,
}

/// Returned instead of numbers when there are no events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoDataReport {
    pub message: String,
    pub model_status: ModelStatus,
    pub data_verification: DataVerification,
}

impl NoDataReport {
    pub fn new() -> Self {
        Self {
            message: NO_DATA_MESSAGE.to_string(),
            model_status: ModelStatus::NoEarthquakeData,
            data_verification: DataVerification::default(),
        }
    }
}

impl Default for NoDataReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of [`EnsemblePredictor::predict_at`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prediction {
    NoEventData(NoDataReport),
    Scored(PredictionResult),
}

impl Prediction {
    pub fn result(&self) -> Option<&PredictionResult> {
        match self {
            Prediction::Scored(r) => Some(r),
            Prediction::NoEventData(_) => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Prediction::NoEventData(_))
    }

    pub fn model_status(&self) -> ModelStatus {
        match self {
            Prediction::Scored(r) => r.model_status,
            Prediction::NoEventData(r) => r.model_status,
        }
    }
}

/// Outcome of [`EnsemblePredictor::train_at`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrainingOutcome {
    /// Too few usable events; the previous state is untouched.
    Skipped { usable: usize, required: usize },
    /// A model failed to fit; the previous state is untouched.
    Failed { reason: String },
    Trained { rows: usize, trained_at: DateTime<Utc> },
}

/// Confidence in [0.001, 0.999].
///
/// `models_used` counts regressors and the detector that produced output.
pub fn confidence(models_used: usize, data_quality: f64, n: usize, n7: usize) -> f64 {
    let c = 0.3 * (models_used as f64 / 3.0).min(1.0)
        + 0.25 * data_quality
        + 0.25 * (n as f64 / 30.0).min(1.0)
        + 0.2 * (n7 as f64 / 10.0).min(1.0);
    qr_math::clamp_or_floor(c, 0.001, 0.999)
}

/// Risk label from probability, magnitude, stress, and anomaly.
///
/// Monotone non-decreasing in both probability and magnitude.
pub fn risk_level(probability: f64, magnitude: f64, stress: f64, anomaly: bool) -> RiskLevel {
    let score = 0.4 * (probability / 20.0)
        + 0.3 * ((magnitude - 2.0) / 6.0).clamp(0.0, 1.0)
        + 0.2 * stress
        + 0.1 * if anomaly { 0.2 } else { 0.0 };

    if score >= 0.8 || magnitude >= 7.0 {
        RiskLevel::Critical
    } else if score >= 0.6 || magnitude >= 6.0 {
        RiskLevel::High
    } else if score >= 0.4 || magnitude >= 5.0 {
        RiskLevel::Moderate
    } else if score >= 0.2 || magnitude >= 4.0 {
        RiskLevel::LowModerate
    } else {
        RiskLevel::Low
    }
}

fn magnitude_factor(magnitude: f64) -> f64 {
    if magnitude >= 6.0 {
        2.0
    } else if magnitude >= 5.0 {
        1.5
    } else if magnitude >= 4.0 {
        1.2
    } else {
        1.0
    }
}

/// Learned-model output for one prediction.
#[derive(Debug, Default)]
struct ModelVote {
    magnitude: Option<f64>,
    anomaly: Option<bool>,
    regressors: usize,
    names: Vec<String>,
}

/// Seismological scoring plus trained models.
#[derive(Debug)]
pub struct EnsemblePredictor {
    scorer: SeismicScorer,
    suite: ModelSuite,
    state: RwLock<Arc<TrainedModelState>>,
}

impl EnsemblePredictor {
    pub fn new(baseline: RegionalBaseline) -> Self {
        Self::with_suite(baseline, ModelSuite::default())
    }

    /// Use custom model factories.
    pub fn with_suite(baseline: RegionalBaseline, suite: ModelSuite) -> Self {
        Self {
            scorer: SeismicScorer::new(baseline),
            suite,
            state: RwLock::new(Arc::new(TrainedModelState::untrained())),
        }
    }

    pub fn scorer(&self) -> &SeismicScorer {
        &self.scorer
    }

    /// Consistent view of the trained state.
    pub fn snapshot(&self) -> Arc<TrainedModelState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_trained(&self) -> bool {
        self.snapshot().is_trained()
    }

    fn install(&self, state: TrainedModelState) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(state);
    }

    /// Scorable events, most recent first, with distances to `location`.
    fn prepare(events: &[EarthquakeEvent], location: &GeoPoint) -> Vec<EarthquakeEvent> {
        let mut events = scorable_events(events);
        for e in &mut events {
            e.set_distance_from(location);
        }
        events
    }

    /// Predict for `location` as of `now`.
    pub fn predict_at(
        &self,
        events: &[EarthquakeEvent],
        location: &GeoPoint,
        now: DateTime<Utc>,
    ) -> Prediction {
        let started = Instant::now();
        let events = Self::prepare(events, location);
        if events.is_empty() {
            tracing::debug!(target: event_names::PREDICT_NO_DATA, "no events to score");
            return Prediction::NoEventData(NoDataReport::new());
        }

        let bundle = self.scorer.score_prepared(&events, location, now);
        let state = self.snapshot();

        let (magnitude, probability, anomaly, status, vote) = match state.models() {
            None => (
                bundle.predicted_magnitude,
                bundle.base_probability,
                bundle.anomaly_detected,
                ModelStatus::SeismologicalStatistical,
                ModelVote::default(),
            ),
            Some(models) => {
                let vote = self.vote(models, &events, now);
                let ml_magnitude = vote.magnitude.unwrap_or_else(|| {
                    let recent: Vec<f64> = events.iter().take(5).map(|e| e.magnitude).collect();
                    qr_math::mean(&recent).unwrap_or(bundle.predicted_magnitude)
                });
                let magnitude = qr_math::clamp_or_floor(
                    0.6 * ml_magnitude + 0.4 * bundle.predicted_magnitude,
                    2.0,
                    8.0,
                );
                let anomaly = vote.anomaly.unwrap_or(bundle.anomaly_detected);
                let probability = ensemble_probability(&bundle, magnitude, anomaly);
                (magnitude, probability, anomaly, ModelStatus::AdvancedEnsemble, vote)
            }
        };

        let models_used = vote.names.len();
        let result = PredictionResult {
            probability_24h: probability,
            predicted_magnitude: magnitude,
            confidence_score: confidence(
                models_used,
                bundle.data_quality,
                bundle.event_count,
                bundle.counts.recent_7d,
            ),
            risk_level: risk_level(probability, magnitude, bundle.stress_index, anomaly),
            model_status: status,
            anomaly_detected: anomaly,
            seismological_factors: bundle.factors(),
            data_verification: DataVerification {
                total_data_points: bundle.event_count,
                recent_24h_events: bundle.counts.recent_24h,
                recent_7d_events: bundle.counts.recent_7d,
                models_used: vote.names,
                ensemble_models: vote.regressors,
                data_quality_score: bundle.data_quality,
                elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            },
            dynamic_meter: DynamicMeter {
                current_value: probability,
                trend: bundle.activity_trend,
                last_updated: now,
            },
        };
        tracing::debug!(
            target: event_names::PREDICT_FINISHED,
            status = %result.model_status,
            probability = result.probability_24h,
            magnitude = result.predicted_magnitude,
            "prediction finished"
        );
        Prediction::Scored(result)
    }

    fn vote(&self, models: &FittedModels, events: &[EarthquakeEvent], now: DateTime<Utc>) -> ModelVote {
        let mut vote = ModelVote::default();
        let rows = build_feature_matrix(events, self.scorer.baseline(), now);
        let Some(latest) = rows.first() else {
            return vote;
        };
        if latest.len() != models.scaler.width() {
            tracing::warn!(
                target: event_names::PREDICT_MODEL_FAILED,
                expected = models.scaler.width() as u64,
                actual = latest.len() as u64,
                "feature width does not match trained scaler"
            );
            return vote;
        }
        let row = models.scaler.transform_row(latest);

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (model, weight) in [
            (&models.regression, MODEL_WEIGHTS.regression),
            (&models.boosted, MODEL_WEIGHTS.boosted),
        ] {
            match model.predict(&row) {
                Ok(m) => {
                    weighted += weight * m;
                    total_weight += weight;
                    vote.regressors += 1;
                    vote.names.push(model.name().to_string());
                }
                Err(err) => tracing::warn!(
                    target: event_names::PREDICT_MODEL_FAILED,
                    model = model.name(),
                    error = %err,
                    "regressor excluded"
                ),
            }
        }
        if total_weight > 0.0 {
            vote.magnitude = Some(weighted / total_weight);
        }

        match models.anomaly.is_anomaly(&row) {
            Ok(flag) => {
                vote.anomaly = Some(flag);
                vote.names.push(models.anomaly.name().to_string());
            }
            Err(err) => tracing::warn!(
                target: event_names::PREDICT_MODEL_FAILED,
                model = models.anomaly.name(),
                error = %err,
                "anomaly detector excluded"
            ),
        }
        vote
    }

    /// Fit fresh models on `events` and swap them in.
    ///
    /// Fewer than [`MIN_TRAINING_EVENTS`] usable events is a no-op. A fit
    /// failure leaves the previous state in place.
    pub fn train_at(
        &self,
        events: &[EarthquakeEvent],
        location: &GeoPoint,
        now: DateTime<Utc>,
    ) -> TrainingOutcome {
        let events = Self::prepare(events, location);
        if events.len() < MIN_TRAINING_EVENTS {
            return TrainingOutcome::Skipped {
                usable: events.len(),
                required: MIN_TRAINING_EVENTS,
            };
        }

        match self.fit_models(&events, now) {
            Ok(models) => {
                let rows = models.training_rows;
                self.install(TrainedModelState::trained(models));
                TrainingOutcome::Trained {
                    rows,
                    trained_at: now,
                }
            }
            Err(err) => TrainingOutcome::Failed {
                reason: err.to_string(),
            },
        }
    }

    fn fit_models(&self, events: &[EarthquakeEvent], now: DateTime<Utc>) -> Result<FittedModels, ModelError> {
        let features = build_feature_matrix(events, self.scorer.baseline(), now);
        let scaler = StandardScaler::fit(&features).ok_or(ModelError::EmptyTrainingSet)?;
        let scaled = scaler.transform(&features);
        let targets: Vec<f64> = events.iter().map(|e| e.magnitude).collect();

        let mut regression = (self.suite.regression)();
        regression.fit(&scaled, &targets)?;
        let mut boosted = (self.suite.boosted)();
        boosted.fit(&scaled, &targets)?;
        let mut anomaly = (self.suite.anomaly)();
        anomaly.fit(&scaled)?;

        Ok(FittedModels {
            scaler,
            regression,
            boosted,
            anomaly,
            trained_at: now,
            training_rows: scaled.len(),
        })
    }

    /// Baseline-only estimate for a location, independent of any events.
    pub fn regional_estimate_at(&self, location: &GeoPoint, now: DateTime<Utc>) -> PredictionResult {
        regional_estimate(self.scorer.baseline(), location, now)
    }
}

/// Probability after magnitude, anomaly, stress, energy, and foreshock
/// adjustments, in [0.01, 20].
fn ensemble_probability(bundle: &SeismicScoreBundle, magnitude: f64, anomaly: bool) -> f64 {
    let anomaly_factor = if anomaly { 1.8 } else { 1.0 };
    let p = bundle.base_probability
        * magnitude_factor(magnitude)
        * anomaly_factor
        * (1.0 + 0.5 * bundle.stress_index)
        * (0.8 + 0.4 * bundle.energy_pattern)
        * (1.0 + 0.3 * bundle.foreshock_score);
    qr_math::clamp_or_floor(p, 0.01, 20.0)
}

/// Fixed estimate bands keyed on regional baseline risk.
pub fn regional_estimate(
    baseline: &RegionalBaseline,
    location: &GeoPoint,
    now: DateTime<Utc>,
) -> PredictionResult {
    let r = baseline.risk_at(location.latitude, location.longitude);
    let (probability, magnitude, confidence, level) = if r > 0.8 {
        (2.5, 4.2, 0.3, RiskLevel::Moderate)
    } else if r > 0.6 {
        (1.8, 3.8, 0.25, RiskLevel::LowModerate)
    } else if r > 0.3 {
        (0.8, 3.2, 0.2, RiskLevel::Low)
    } else {
        (0.3, 2.8, 0.15, RiskLevel::Low)
    };

    PredictionResult {
        probability_24h: probability,
        predicted_magnitude: magnitude,
        confidence_score: confidence,
        risk_level: level,
        model_status: ModelStatus::RegionalStatistical,
        anomaly_detected: false,
        seismological_factors: SeismicFactors {
            gutenberg_richter_b_value: 1.0,
            temporal_clustering: 0.1,
            spatial_clustering: 0.1,
            tectonic_stress_index: r,
            energy_release_pattern: 0.5,
            foreshock_pattern: 0.1,
        },
        data_verification: DataVerification {
            data_quality_score: 0.3,
            ..DataVerification::default()
        },
        dynamic_meter: DynamicMeter {
            current_value: probability,
            trend: ActivityTrend::Stable,
            last_updated: now,
        },
    }
}
