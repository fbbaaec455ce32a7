//! Topology configuration errors.
//!
//! All of these are fatal and raised before any solve is attempted.

use hn_core::{NodeId, PipeId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("No node has been specified for the reference pressure; exactly one is required")]
    MissingReference,

    #[error("{count} nodes are specified for the reference pressure ({names:?}); exactly one is required")]
    MultipleReferences { count: usize, names: Vec<String> },

    #[error("{count} nodes are designated as gap-filling node ({names:?}); at most one is allowed")]
    MultipleGapFillingNodes { count: usize, names: Vec<String> },

    #[error("Node '{name}' is the pressure reference but is not a feeder")]
    ReferenceNotFeeder { name: String },

    #[error("Pipe '{pipe_name}' refers to non-existent node {node}")]
    InvalidNodeRef { pipe_name: String, node: NodeId },

    #[error("Pipe '{name}' starts and ends at the same node")]
    SelfLoop { name: String },

    #[error("Pipe '{name}' closes a loop; meshed networks are not supported")]
    MeshedTopology { name: String, pipe: PipeId },

    #[error("Node '{name}' is not connected to the reference node")]
    Disconnected { name: String, node: NodeId },

    #[error("Invalid value for {field} of '{name}': {value}")]
    InvalidValue {
        name: String,
        field: &'static str,
        value: f64,
    },

    #[error("Duplicate name '{name}' among {what}")]
    DuplicateName { name: String, what: &'static str },
}

pub type GraphResult<T> = Result<T, GraphError>;
