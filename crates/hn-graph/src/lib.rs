//! hn-graph: network topology layer for heatnet.
//!
//! Provides:
//! - Core network data structures (Node, Pipe, Network)
//! - Incremental network builder with load-time validation
//! - The signed node/pipe coupling matrix and its direction correction
//!
//! # Example
//!
//! ```
//! use hn_core::units::{m, mm};
//! use hn_graph::{NetworkBuilder, NodeKind, PipeParams};
//!
//! let mut builder = NetworkBuilder::new();
//! let plant = builder.add_node("Plant", NodeKind::Feeder);
//! let house = builder.add_node("House", NodeKind::Consumer);
//! builder.set_reference(plant);
//! builder.add_pipe("P1", plant, house, PipeParams::new(m(120.0), mm(80.0)));
//! let network = builder.build().unwrap();
//!
//! assert_eq!(network.nodes().len(), 2);
//! assert_eq!(network.pipes().len(), 1);
//! assert_eq!(network.reference(), plant);
//! ```

pub mod builder;
pub mod coupling;
pub mod error;
pub mod graph;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::NetworkBuilder;
pub use coupling::{CouplingMatrix, DirectionCorrection};
pub use error::{GraphError, GraphResult};
pub use graph::{Network, Node, NodeKind, Pipe, PipeParams};
