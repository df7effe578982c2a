//! Property-based tests for qr-math numeric functions.

use proptest::prelude::*;
use qr_math::{polyfit, population_std, quantile, StandardScaler};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// A noiseless line is recovered exactly by the degree-1 fit.
    #[test]
    fn polyfit_recovers_line(slope in -10.0..10.0f64, intercept in -100.0..100.0f64, n in 3usize..40) {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| slope * v + intercept).collect();
        let c = polyfit(&x, &y, 1).unwrap();
        prop_assert!((c[0] - slope).abs() < 1e-6, "slope {} vs {}", c[0], slope);
        prop_assert!((c[1] - intercept).abs() < 1e-5, "intercept {} vs {}", c[1], intercept);
    }

    /// Population std is non-negative and shift-invariant.
    #[test]
    fn std_shift_invariant(values in prop::collection::vec(-1e3..1e3f64, 1..50), shift in -1e3..1e3f64) {
        let s = population_std(&values).unwrap();
        let shifted: Vec<f64> = values.iter().map(|v| v + shift).collect();
        let s2 = population_std(&shifted).unwrap();
        prop_assert!(s >= 0.0);
        prop_assert!((s - s2).abs() < 1e-6);
    }

    /// Quantiles stay within the sample range.
    #[test]
    fn quantile_bounded(values in prop::collection::vec(-1e3..1e3f64, 1..50), q in 0.0..=1.0f64) {
        let v = quantile(&values, q).unwrap();
        let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(v >= lo - 1e-9 && v <= hi + 1e-9);
    }

    /// Scaled columns have mean ~0.
    #[test]
    fn scaler_centers(rows in prop::collection::vec(prop::collection::vec(-50.0..50.0f64, 3), 2..30)) {
        let scaler = StandardScaler::fit(&rows).unwrap();
        let t = scaler.transform(&rows);
        for col in 0..3 {
            let m: f64 = t.iter().map(|r| r[col]).sum::<f64>() / t.len() as f64;
            prop_assert!(m.abs() < 1e-6, "column {} mean {}", col, m);
        }
    }
}
