//! Model traits, errors, and the swappable trained state.

use std::fmt;

use chrono::{DateTime, Utc};
use qr_math::StandardScaler;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::forest::{GradientBoostedRegressor, RandomForestRegressor};
use super::isolation::IsolationForest;

/// Errors from fitting or evaluating a model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model is not fitted")]
    NotFitted,

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}

impl ModelError {
    pub fn code(&self) -> u32 {
        match self {
            ModelError::EmptyTrainingSet => 43,
            ModelError::DimensionMismatch { .. } => 44,
            ModelError::NotFitted => 45,
            ModelError::NonFinite(_) => 46,
        }
    }
}

impl From<ModelError> for qr_common::Error {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NonFinite(_) => qr_common::Error::NumericalInstability(err.to_string()),
            other => qr_common::Error::Model(other.to_string()),
        }
    }
}

/// Shared input checks for `fit` implementations.
pub(crate) fn check_training_rows(x: &[Vec<f64>], y: Option<&[f64]>) -> Result<usize, ModelError> {
    let width = x.first().map(Vec::len).ok_or(ModelError::EmptyTrainingSet)?;
    if width == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    for row in x {
        if row.len() != width {
            return Err(ModelError::DimensionMismatch {
                expected: width,
                actual: row.len(),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite("features"));
        }
    }
    if let Some(y) = y {
        if y.len() != x.len() {
            return Err(ModelError::DimensionMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite("targets"));
        }
    }
    Ok(width)
}

pub(crate) fn check_row(row: &[f64], width: usize) -> Result<(), ModelError> {
    if row.len() != width {
        return Err(ModelError::DimensionMismatch {
            expected: width,
            actual: row.len(),
        });
    }
    if row.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite("input row"));
    }
    Ok(())
}

/// A model that predicts magnitude from one scaled feature row.
pub trait MagnitudeRegressor: Send + Sync {
    fn name(&self) -> &str;

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError>;

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError>;

    fn is_fitted(&self) -> bool;
}

/// An unsupervised detector over scaled feature rows.
pub trait AnomalyDetector: Send + Sync {
    fn name(&self) -> &str;

    fn fit(&mut self, x: &[Vec<f64>]) -> Result<(), ModelError>;

    /// Anomaly score, higher is more anomalous.
    fn score(&self, row: &[f64]) -> Result<f64, ModelError>;

    fn is_anomaly(&self, row: &[f64]) -> Result<bool, ModelError>;

    fn is_fitted(&self) -> bool;
}

/// Fixed ensemble weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub regression: f64,
    pub boosted: f64,
    pub anomaly: f64,
}

pub const MODEL_WEIGHTS: ModelWeights = ModelWeights {
    regression: 0.4,
    boosted: 0.4,
    anomaly: 0.2,
};

type RegressorFactory = Box<dyn Fn() -> Box<dyn MagnitudeRegressor> + Send + Sync>;
type DetectorFactory = Box<dyn Fn() -> Box<dyn AnomalyDetector> + Send + Sync>;

/// Factories for fresh, unfitted models. Training asks for new instances on
/// every run so a failed fit never touches the live state.
pub struct ModelSuite {
    pub regression: RegressorFactory,
    pub boosted: RegressorFactory,
    pub anomaly: DetectorFactory,
}

impl Default for ModelSuite {
    fn default() -> Self {
        Self {
            regression: Box::new(|| Box::new(RandomForestRegressor::default())),
            boosted: Box::new(|| Box::new(GradientBoostedRegressor::default())),
            anomaly: Box::new(|| Box::new(IsolationForest::default())),
        }
    }
}

impl fmt::Debug for ModelSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSuite").finish_non_exhaustive()
    }
}

/// Fitted models plus the scaler they were trained behind.
pub struct FittedModels {
    pub scaler: StandardScaler,
    pub regression: Box<dyn MagnitudeRegressor>,
    pub boosted: Box<dyn MagnitudeRegressor>,
    pub anomaly: Box<dyn AnomalyDetector>,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
}

/// Everything prediction reads from training. Replaced as a whole.
#[derive(Default)]
pub struct TrainedModelState {
    fitted: Option<FittedModels>,
}

impl TrainedModelState {
    pub fn untrained() -> Self {
        Self::default()
    }

    pub fn trained(models: FittedModels) -> Self {
        Self {
            fitted: Some(models),
        }
    }

    pub fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn models(&self) -> Option<&FittedModels> {
        self.fitted.as_ref()
    }

    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.fitted.as_ref().map(|m| m.trained_at)
    }
}

impl fmt::Debug for TrainedModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fitted {
            None => f.write_str("TrainedModelState::Untrained"),
            Some(m) => f
                .debug_struct("TrainedModelState")
                .field("regression", &m.regression.name())
                .field("boosted", &m.boosted.name())
                .field("anomaly", &m.anomaly.name())
                .field("trained_at", &m.trained_at)
                .field("training_rows", &m.training_rows)
                .finish(),
        }
    }
}
