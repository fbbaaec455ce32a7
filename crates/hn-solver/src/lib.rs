//! Hydraulic network solver for district-heating pipe networks.
//!
//! For one flow direction the unknowns are the pipe mass flows, the pressures of
//! every non-reference node and the external mass flow at the reference node.
//! Each node contributes a continuity equation and each pipe a pressure
//! equation with a quadratic friction loss. After every solve the coupling
//! matrix is re-oriented so that no pipe carries negative flow, and the system
//! is solved again until the orientation is stable.

pub mod direction;
pub mod error;
pub mod hydraulic;
pub mod jacobian;
pub mod newton;
pub mod system;
pub mod unknowns;

pub use direction::{DirectionSettings, FlowDirection, HydraulicSolution, solve_direction};
pub use error::{SolverError, SolverResult};
pub use hydraulic::{HydraulicInputs, HydraulicProblem};
pub use newton::{NewtonConfig, NewtonResult, NewtonSolver, newton_solve};
pub use system::{NonlinearSystem, RootFinder};
pub use unknowns::UnknownLayout;
