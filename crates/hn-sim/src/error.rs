//! Error types for simulation operations.

use hn_core::HnError;
use hn_graph::GraphError;
use hn_solver::SolverError;
use thiserror::Error;

/// Errors that abort a simulation run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Invalid boundary data at step {step}: {what}")]
    Boundary { step: usize, what: String },

    #[error("{direction}: temperature propagation deadlocked; unresolved nodes {nodes:?}")]
    Deadlock {
        direction: &'static str,
        nodes: Vec<String>,
    },

    #[error("{direction}: substep advanced {advanced} of {pipes} pipes")]
    IncompleteSweep {
        direction: &'static str,
        advanced: usize,
        pipes: usize,
    },

    #[error("Reversed flow detected at feeder '{node}'")]
    ReversedFeederFlow { node: String },

    #[error("{required} thermal substeps needed per hydraulic step, limit is {limit}")]
    SubstepLimit { required: usize, limit: usize },

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Core error: {0}")]
    Core(#[from] HnError),
}

pub type SimResult<T> = Result<T, SimError>;
