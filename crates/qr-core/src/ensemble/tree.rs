//! CART regression tree.
//!
//! Greedy binary splits minimising the summed squared error of the two
//! children. Nodes live in a flat arena; a split stores the indices of its
//! children.

use serde::{Deserialize, Serialize};

/// Growth limits for one tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 8,
            min_samples_leaf: 1,
        }
    }
}

/// Minimum SSE reduction for a split to be kept.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree over the rows of `x` named by `indices`.
    ///
    /// `indices` may repeat rows (bootstrap samples). An empty index set
    /// yields a single zero leaf.
    pub fn fit(x: &[Vec<f64>], y: &[f64], indices: &[usize], params: &TreeParams) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, indices.to_vec(), 0, params);
        tree
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match self.nodes.get(at) {
                Some(Node::Leaf(value)) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    at = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], at: usize) -> usize {
            match nodes.get(at) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: Vec<usize>,
        depth: usize,
        params: &TreeParams,
    ) -> usize {
        let id = self.nodes.len();
        let value = mean_of(y, &indices);
        self.nodes.push(Node::Leaf(value));

        let min_leaf = params.min_samples_leaf.max(1);
        if depth >= params.max_depth || indices.len() < 2 * min_leaf {
            return id;
        }
        let Some(split) = best_split(x, y, &indices, min_leaf) else {
            return id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[i][split.feature] <= split.threshold);
        let left = self.grow(x, y, left_idx, depth + 1, params);
        let right = self.grow(x, y, right_idx, depth + 1, params);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }
}

fn mean_of(y: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
}

/// Exhaustive best split over every feature, by prefix sums over sorted
/// values. Thresholds sit halfway between adjacent distinct values.
fn best_split(x: &[Vec<f64>], y: &[f64], indices: &[usize], min_leaf: usize) -> Option<Split> {
    let n = indices.len();
    let width = x.get(indices[0]).map_or(0, Vec::len);
    let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;

    let mut best: Option<Split> = None;
    let mut order: Vec<usize> = indices.to_vec();
    for feature in 0..width {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..n - 1 {
            let yi = y[order[k]];
            left_sum += yi;
            left_sq += yi * yi;

            let left_n = k + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let here = x[order[k]][feature];
            let next = x[order[k + 1]][feature];
            if here == next {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n as f64)
                + (right_sq - right_sum * right_sum / right_n as f64);
            let gain = parent_sse - sse;
            if gain > MIN_GAIN && best.as_ref().is_none_or(|b| gain > b.gain) {
                best = Some(Split {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}
