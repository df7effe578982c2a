//! Core math modules.

pub mod fit;
pub mod scale;
pub mod stats;
