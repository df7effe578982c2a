//! Tree ensembles for magnitude regression.
//!
//! - [`RandomForestRegressor`]: bootstrap-bagged CART trees, averaged.
//! - [`GradientBoostedRegressor`]: squared-loss boosting of shallow trees.
//!
//! Both are deterministic for a given seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::model::{check_row, check_training_rows, MagnitudeRegressor, ModelError};
use super::tree::{RegressionTree, TreeParams};

pub const DEFAULT_SEED: u64 = 42;

/// Random forest settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 30,
            max_depth: 8,
            min_samples_leaf: 2,
            seed: DEFAULT_SEED,
        }
    }
}

/// Bagged regression trees.
#[derive(Debug, Clone, Default)]
pub struct RandomForestRegressor {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
    width: usize,
}

impl RandomForestRegressor {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            width: 0,
        }
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl MagnitudeRegressor for RandomForestRegressor {
    fn name(&self) -> &str {
        "RandomForest"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        let width = check_training_rows(x, Some(y))?;
        let n = x.len();
        let params = TreeParams {
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
        };
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let trees = (0..self.config.n_trees.max(1))
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                RegressionTree::fit(x, y, &sample, &params)
            })
            .collect();

        self.trees = trees;
        self.width = width;
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_row(row, self.width)?;
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        let out = sum / self.trees.len() as f64;
        if out.is_finite() {
            Ok(out)
        } else {
            Err(ModelError::NonFinite("prediction"))
        }
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

/// Gradient boosting settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingConfig {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_rounds: 60,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
        }
    }
}

/// Squared-loss gradient boosting.
///
/// Starts from the target mean; each round fits a tree to the current
/// residuals and adds it scaled by the learning rate.
#[derive(Debug, Clone, Default)]
pub struct GradientBoostedRegressor {
    config: BoostingConfig,
    init: f64,
    trees: Vec<RegressionTree>,
    width: usize,
}

impl GradientBoostedRegressor {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

impl MagnitudeRegressor for GradientBoostedRegressor {
    fn name(&self) -> &str {
        "GradientBoosting"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        let width = check_training_rows(x, Some(y))?;
        let n = x.len();
        let params = TreeParams {
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
        };
        let all: Vec<usize> = (0..n).collect();
        let init = y.iter().sum::<f64>() / n as f64;
        let mut current = vec![init; n];
        let mut trees = Vec::with_capacity(self.config.n_rounds);

        for _ in 0..self.config.n_rounds {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();
            let tree = RegressionTree::fit(x, &residuals, &all, &params);
            for (i, row) in x.iter().enumerate() {
                current[i] += self.config.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        if current.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite("boosting fit"));
        }
        self.init = init;
        self.trees = trees;
        self.width = width;
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        if self.width == 0 {
            return Err(ModelError::NotFitted);
        }
        check_row(row, self.width)?;
        let boost: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        let out = self.init + self.config.learning_rate * boost;
        if out.is_finite() {
            Ok(out)
        } else {
            Err(ModelError::NonFinite("prediction"))
        }
    }

    fn is_fitted(&self) -> bool {
        self.width > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, (i % 4) as f64]).collect();
        let y: Vec<f64> = (0..n).map(|i| 2.0 + 0.05 * i as f64).collect();
        (x, y)
    }

    #[test]
    fn forest_requires_fit() {
        let forest = RandomForestRegressor::default();
        assert_eq!(forest.predict(&[1.0, 2.0]), Err(ModelError::NotFitted));
        assert!(!forest.is_fitted());
    }

    #[test]
    fn forest_tracks_trend() {
        let (x, y) = linear_data(40);
        let mut forest = RandomForestRegressor::default();
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.tree_count(), 30);
        let low = forest.predict(&[2.0, 2.0]).unwrap();
        let high = forest.predict(&[37.0, 1.0]).unwrap();
        assert!(low < high);
        assert!((2.0..=4.0).contains(&low));
        assert!((2.0..=4.0).contains(&high));
    }

    #[test]
    fn forest_is_deterministic_per_seed() {
        let (x, y) = linear_data(25);
        let mut a = RandomForestRegressor::default();
        let mut b = RandomForestRegressor::default();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&[10.0, 2.0]), b.predict(&[10.0, 2.0]));
    }

    #[test]
    fn forest_rejects_wrong_width() {
        let (x, y) = linear_data(12);
        let mut forest = RandomForestRegressor::default();
        forest.fit(&x, &y).unwrap();
        assert!(matches!(
            forest.predict(&[1.0]),
            Err(ModelError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn boosting_fits_training_data_closely() {
        let (x, y) = linear_data(30);
        let mut gbr = GradientBoostedRegressor::default();
        gbr.fit(&x, &y).unwrap();
        for (row, target) in x.iter().zip(&y) {
            let p = gbr.predict(row).unwrap();
            assert!((p - target).abs() < 0.15, "{p} vs {target}");
        }
    }

    #[test]
    fn boosting_on_constant_target_returns_mean() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let mut gbr = GradientBoostedRegressor::default();
        gbr.fit(&x, &[3.3; 10]).unwrap();
        assert!((gbr.predict(&[4.0]).unwrap() - 3.3).abs() < 1e-9);
    }

    #[test]
    fn empty_training_set() {
        let mut gbr = GradientBoostedRegressor::default();
        assert_eq!(gbr.fit(&[], &[]), Err(ModelError::EmptyTrainingSet));
    }
}
