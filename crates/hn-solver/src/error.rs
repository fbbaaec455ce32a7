//! Error types for solver operations.

use hn_core::HnError;
use thiserror::Error;

/// Errors that can occur during hydraulic solving.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Problem setup error: {what}")]
    ProblemSetup { what: String },

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error(
        "{direction}: flow direction still inconsistent after {iterations} corrections (pipes {pipes:?})"
    )]
    DirectionCorrectionExceeded {
        direction: &'static str,
        iterations: usize,
        pipes: Vec<String>,
    },

    #[error("Core error: {0}")]
    Core(#[from] HnError),
}

pub type SolverResult<T> = Result<T, SolverError>;
