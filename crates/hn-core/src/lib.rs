//! hn-core: stable foundation for heatnet.
//!
//! Contains:
//! - units (uom SI types + constructors, physical constants)
//! - numeric (Real + tolerances + float helpers)
//! - ids (stable compact IDs for nodes and pipes)
//! - water (density law and constant properties of the heat carrier)
//! - timing (opt-in wall-clock accounting for solver phases)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod timing;
pub mod units;
pub mod water;

// Re-exports: nice ergonomics for downstream crates
pub use error::{HnError, HnResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
pub use water::WaterProperties;
