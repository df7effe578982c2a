//! Per-column standardization.

use serde::{Deserialize, Serialize};

/// Standard scaler: `(x - mean) / std` per column.
///
/// Columns with zero variance are scaled by 1.0 so they map to 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit column statistics. Returns `None` for an empty or ragged matrix.
    pub fn fit(rows: &[Vec<f64>]) -> Option<Self> {
        let width = rows.first()?.len();
        if width == 0 || rows.iter().any(|r| r.len() != width) {
            return None;
        }
        let n = rows.len() as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut scales = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2) / n;
            }
        }
        for s in &mut scales {
            *s = s.sqrt();
            if *s == 0.0 || !s.is_finite() {
                *s = 1.0;
            }
        }
        Some(Self { means, scales })
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    /// Scale one row. Rows of the wrong width are returned unchanged.
    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        if row.len() != self.width() {
            return row.to_vec();
        }
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}
