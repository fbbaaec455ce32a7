//! Transient hydraulic and thermal simulation of district-heating networks.
//!
//! Provides:
//! - Seasonal soil temperature forcing
//! - Pipe discretization and explicit upwind temperature transport
//! - Topological forerun/return temperature propagation
//! - Substep scheduling bounded by the explicit stability limit
//! - The step-by-step [`Simulation`] driven by a [`BoundarySource`]

pub mod boundary;
pub mod error;
pub mod losses;
pub mod propagation;
pub mod segments;
pub mod sim;
pub mod soil;
pub mod thermal;

pub use boundary::{BoundarySource, ConstantBoundary, NodeBoundary, StepBoundary};
pub use error::{SimError, SimResult};
pub use losses::PipeLoss;
pub use sim::{DirectionRecord, SimConfig, Simulation, StepRecord};
pub use soil::soil_temperature;
