//! Isolation forest anomaly detector.
//!
//! Anomalies are few and different, so random axis-aligned cuts isolate them
//! in fewer steps. The score for a row is
//!
//! ```text
//! s(x) = 2^(−E[h(x)] / c(ψ))
//! ```
//!
//! where `h` is the path length in one tree, `ψ` the subsample size, and
//! `c(ψ)` the expected path length of an unsuccessful BST search. Scores near
//! 1 are anomalous; the decision threshold is the training-score quantile at
//! `1 − contamination`.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::forest::DEFAULT_SEED;
use super::model::{check_row, check_training_rows, AnomalyDetector, ModelError};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation forest settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsolationConfig {
    pub n_trees: usize,
    pub subsample: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            n_trees: 50,
            subsample: 64,
            contamination: 0.1,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum INode {
    External {
        size: usize,
    },
    Internal {
        feature: usize,
        split: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct ITree {
    nodes: Vec<INode>,
}

impl ITree {
    fn build(x: &[Vec<f64>], rows: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, rows, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(INode::External { size: rows.len() });
        if depth >= max_depth || rows.len() <= 1 {
            return id;
        }

        let width = x[rows[0]].len();
        // Only features that still vary can split this node.
        let candidates: Vec<(usize, f64, f64)> = (0..width)
            .filter_map(|f| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    (lo.min(x[r][f]), hi.max(x[r][f]))
                });
                (hi > lo).then_some((f, lo, hi))
            })
            .collect();
        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.random_range(0..candidates.len())];
        let split = rng.random_range(lo..hi);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&r| x[r][feature] < split);
        let left = self.grow(x, left_rows, depth + 1, max_depth, rng);
        let right = self.grow(x, right_rows, depth + 1, max_depth, rng);
        self.nodes[id] = INode::Internal {
            feature,
            split,
            left,
            right,
        };
        id
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(at) {
                Some(INode::External { size }) => return depth + average_path_length(*size),
                Some(INode::Internal {
                    feature,
                    split,
                    left,
                    right,
                }) => {
                    depth += 1.0;
                    at = if row[*feature] < *split { *left } else { *right };
                }
                None => return depth,
            }
        }
    }
}

/// Expected path length of an unsuccessful search in a BST of `n` nodes.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Isolation forest over scaled feature rows.
#[derive(Debug, Clone, Default)]
pub struct IsolationForest {
    config: IsolationConfig,
    trees: Vec<ITree>,
    psi: usize,
    width: usize,
    threshold: f64,
}

impl IsolationForest {
    pub fn new(config: IsolationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn raw_score(&self, row: &[f64]) -> f64 {
        let mean_path =
            self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / self.trees.len() as f64;
        let c = average_path_length(self.psi);
        if c <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / c)
    }
}

impl AnomalyDetector for IsolationForest {
    fn name(&self) -> &str {
        "IsolationForest"
    }

    fn fit(&mut self, x: &[Vec<f64>]) -> Result<(), ModelError> {
        let width = check_training_rows(x, None)?;
        let n = x.len();
        let psi = self.config.subsample.clamp(1, n);
        let max_depth = (psi as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let trees: Vec<ITree> = (0..self.config.n_trees.max(1))
            .map(|_| {
                let rows = sample(&mut rng, n, psi).into_vec();
                ITree::build(x, rows, max_depth, &mut rng)
            })
            .collect();

        self.trees = trees;
        self.psi = psi;
        self.width = width;

        let scores: Vec<f64> = x.iter().map(|row| self.raw_score(row)).collect();
        let q = 1.0 - self.config.contamination.clamp(0.0, 0.5);
        self.threshold = qr_math::quantile(&scores, q).ok_or(ModelError::NonFinite("scores"))?;
        Ok(())
    }

    fn score(&self, row: &[f64]) -> Result<f64, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_row(row, self.width)?;
        Ok(self.raw_score(row))
    }

    fn is_anomaly(&self, row: &[f64]) -> Result<bool, ModelError> {
        Ok(self.score(row)? > self.threshold)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(n: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                vec![t.sin() * 0.1, t.cos() * 0.1]
            })
            .collect()
    }

    #[test]
    fn c_of_n() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.2448).abs() < 1e-3);
    }

    #[test]
    fn outlier_scores_above_cluster() {
        let mut x = cluster(100);
        x.push(vec![5.0, -5.0]);
        let mut forest = IsolationForest::default();
        forest.fit(&x).unwrap();

        let outlier = forest.score(&[5.0, -5.0]).unwrap();
        let inlier = forest.score(&[0.05, 0.09]).unwrap();
        assert!(outlier > inlier, "{outlier} <= {inlier}");
        assert!(forest.is_anomaly(&[5.0, -5.0]).unwrap());
    }

    #[test]
    fn contamination_sets_flag_rate() {
        let x = cluster(200);
        let mut forest = IsolationForest::default();
        forest.fit(&x).unwrap();
        let flagged = x.iter().filter(|r| forest.is_anomaly(r).unwrap()).count();
        assert!(flagged <= 21, "flagged {flagged}");
    }

    #[test]
    fn small_training_sets_work() {
        let x = vec![vec![1.0, 2.0], vec![1.5, 2.5], vec![0.5, 1.0]];
        let mut forest = IsolationForest::default();
        forest.fit(&x).unwrap();
        let s = forest.score(&[1.0, 2.0]).unwrap();
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn identical_rows_do_not_split() {
        let x = vec![vec![1.0, 1.0]; 10];
        let mut forest = IsolationForest::default();
        forest.fit(&x).unwrap();
        assert!(!forest.is_anomaly(&[1.0, 1.0]).unwrap());
    }

    #[test]
    fn unfitted_errors() {
        let forest = IsolationForest::default();
        assert_eq!(forest.score(&[0.0]), Err(ModelError::NotFitted));
    }
}
