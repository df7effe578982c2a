//! Quake Risk math utilities.

pub mod math;

pub use math::fit::{index_slope, linear_slope, polyfit, FitError};
pub use math::scale::StandardScaler;
pub use math::stats::*;
