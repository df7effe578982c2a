//! Quake Risk common types and errors.
//!
//! This crate provides foundational types shared across the qr-* crates:
//! - The canonical earthquake event record
//! - Geographic points and great-circle distance
//! - The unified error taxonomy with stable codes

pub mod error;
pub mod event;
pub mod geo;

pub use error::{Error, ErrorCategory, Result, StructuredError};
pub use event::{AlertLevel, EarthquakeEvent};
pub use geo::{haversine_km, GeoPoint, EARTH_RADIUS_KM};
