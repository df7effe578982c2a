//! Least-squares polynomial fitting.
//!
//! `polyfit` solves the normal equations for degree 1 or 2 with Gaussian
//! elimination and partial pivoting. Coefficients are returned highest power
//! first, matching the usual `polyfit` convention.

use thiserror::Error;

/// Pivot magnitude below which the system is treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// Errors from polynomial fitting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("need at least {min} points for degree {degree}, got {n}")]
    TooFewPoints { n: usize, min: usize, degree: usize },

    #[error("normal equations are singular")]
    Singular,

    #[error("non-finite input or coefficient")]
    NonFinite,

    #[error("unsupported degree {0}")]
    UnsupportedDegree(usize),
}

/// Fit `y ≈ c0·x^d + … + cd` and return `[c0, …, cd]`.
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Result<Vec<f64>, FitError> {
    if degree == 0 || degree > 2 {
        return Err(FitError::UnsupportedDegree(degree));
    }
    let n = x.len().min(y.len());
    let min = degree + 1;
    if n < min {
        return Err(FitError::TooFewPoints { n, min, degree });
    }
    if x[..n].iter().chain(&y[..n]).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }

    // Center x to keep the power sums well conditioned.
    let x_mean = x[..n].iter().sum::<f64>() / n as f64;

    let size = degree + 1;
    let mut power_sums = vec![0.0; 2 * degree + 1];
    let mut rhs = vec![0.0; size];
    for i in 0..n {
        let xc = x[i] - x_mean;
        let mut p = 1.0;
        for (k, slot) in power_sums.iter_mut().enumerate() {
            *slot += p;
            if k < size {
                rhs[k] += p * y[i];
            }
            p *= xc;
        }
    }

    let mut a = vec![vec![0.0; size + 1]; size];
    for (r, row) in a.iter_mut().enumerate() {
        for c in 0..size {
            row[c] = power_sums[r + c];
        }
        row[size] = rhs[r];
    }
    // Ascending coefficients in the centered variable.
    let centered = solve(a)?;

    let coeffs_ascending = match degree {
        1 => vec![centered[0] - centered[1] * x_mean, centered[1]],
        _ => {
            let (b0, b1, b2) = (centered[0], centered[1], centered[2]);
            vec![
                b0 - b1 * x_mean + b2 * x_mean * x_mean,
                b1 - 2.0 * b2 * x_mean,
                b2,
            ]
        }
    };
    if coeffs_ascending.iter().any(|c| !c.is_finite()) {
        return Err(FitError::NonFinite);
    }
    Ok(coeffs_ascending.into_iter().rev().collect())
}

/// Slope of the least-squares line through `(x, y)`.
pub fn linear_slope(x: &[f64], y: &[f64]) -> Result<f64, FitError> {
    polyfit(x, y, 1).map(|c| c[0])
}

/// Slope of `y` against its index `0..n`.
pub fn index_slope(y: &[f64]) -> Result<f64, FitError> {
    let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
    linear_slope(&x, y)
}

fn solve(mut a: Vec<Vec<f64>>) -> Result<Vec<f64>, FitError> {
    let n = a.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .ok_or(FitError::Singular)?;
        if a[pivot][col].abs() < SINGULAR_EPS {
            return Err(FitError::Singular);
        }
        a.swap(col, pivot);
        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..=n {
                a[row][k] -= factor * a[col][k];
            }
        }
    }
    let mut out = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * out[k]).sum();
        out[row] = (a[row][n] - tail) / a[row][row];
    }
    Ok(out)
}
