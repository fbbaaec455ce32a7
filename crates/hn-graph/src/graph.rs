//! Core network data structures.

use hn_core::units::Length;
use hn_core::{NodeId, PipeId};
use std::f64::consts::PI;

/// Role of a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Transfer station taking heat (and water) out of the forerun.
    Consumer,
    /// Heat source injecting water into the forerun.
    Feeder,
    /// Pass-through junction without external flow.
    Distributor,
}

/// A point in the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Planar coordinates (m), used only for reporting.
    pub position: (f64, f64),
    /// Geodetic elevation, enters the hydrostatic pressure term.
    pub elevation: Length,
    /// Whether this node carries the fixed reference pressure.
    pub is_reference: bool,
    /// Whether the data layer closes the volumetric flow balance at this node.
    pub is_gap_filling: bool,
}

impl Node {
    pub fn is_feeder(&self) -> bool {
        self.kind == NodeKind::Feeder
    }

    pub fn is_consumer(&self) -> bool {
        self.kind == NodeKind::Consumer
    }
}

/// Geometry and transfer coefficients of a pipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipeParams {
    pub length: Length,
    /// Internal diameter.
    pub diameter: Length,
    /// Darcy friction coefficient λ (-).
    pub friction: f64,
    /// Lumped local-loss coefficient ζ for fittings and valves (-).
    pub loss_coefficient: f64,
    /// Heat-transfer coefficient to the soil referred to the inner pipe surface (W/(m² K)).
    pub htc: f64,
}

impl PipeParams {
    /// Defaults typical for a pre-insulated steel pipe.
    pub fn new(length: Length, diameter: Length) -> Self {
        Self {
            length,
            diameter,
            friction: 0.02,
            loss_coefficient: 0.0,
            htc: 0.5,
        }
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_loss_coefficient(mut self, zeta: f64) -> Self {
        self.loss_coefficient = zeta;
        self
    }

    pub fn with_htc(mut self, htc: f64) -> Self {
        self.htc = htc;
        self
    }
}

/// A pipe between two nodes. `from`/`to` is the declared orientation; the
/// physical flow direction lives in the [`CouplingMatrix`](crate::CouplingMatrix).
#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    pub id: PipeId,
    pub name: String,
    pub from: NodeId,
    pub to: NodeId,
    pub params: PipeParams,
}

impl Pipe {
    pub fn length_m(&self) -> f64 {
        self.params.length.value
    }

    pub fn diameter_m(&self) -> f64 {
        self.params.diameter.value
    }

    /// Flow cross-section (m²).
    pub fn flow_area(&self) -> f64 {
        PI * self.diameter_m().powi(2) / 4.0
    }

    /// Inner surface per metre of pipe (m²/m).
    pub fn surface_per_length(&self) -> f64 {
        PI * self.diameter_m()
    }

    /// Quadratic hydraulic resistance K such that Δp = K·ṁ².
    ///
    /// K = 8 (λ L/d + ζ) / (π² ρ d⁴)
    pub fn resistance(&self, rho: f64) -> f64 {
        let d = self.diameter_m();
        let p = &self.params;
        8.0 * (p.friction * self.length_m() / d + p.loss_coefficient) / (PI.powi(2) * rho * d.powi(4))
    }
}

/// A validated, immutable district-heating network.
///
/// Nodes and pipes are stored in arenas indexed by their IDs; per-step values
/// (mass flows, pressures, temperatures) live in parallel vectors owned by the
/// solvers and are addressed through the same IDs.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) nodes: Vec<Node>,
    pub(crate) pipes: Vec<Pipe>,
    pub(crate) reference: NodeId,
    pub(crate) gap_filling: Option<NodeId>,
    /// Offsets for node->pipe adjacency: node i's pipes are in node_pipes[offsets[i]..offsets[i+1]].
    pub(crate) node_pipe_offsets: Vec<usize>,
    pub(crate) node_pipes: Vec<PipeId>,
}

impl Network {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.idx())
    }

    pub fn pipe(&self, id: PipeId) -> Option<&Pipe> {
        self.pipes.get(id.idx())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn pipe_count(&self) -> usize {
        self.pipes.len()
    }

    /// The single node carrying the fixed reference pressure.
    pub fn reference(&self) -> NodeId {
        self.reference
    }

    /// The node absorbing the flow-balance residual of gap-filled data, if any.
    pub fn gap_filling(&self) -> Option<NodeId> {
        self.gap_filling
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn pipe_by_name(&self, name: &str) -> Option<&Pipe> {
        self.pipes.iter().find(|p| p.name == name)
    }

    /// Pipes incident to a node regardless of orientation, sorted by ID.
    pub fn node_pipes(&self, node: NodeId) -> &[PipeId] {
        let idx = node.idx();
        if idx >= self.nodes.len() {
            return &[];
        }
        &self.node_pipes[self.node_pipe_offsets[idx]..self.node_pipe_offsets[idx + 1]]
    }

    /// Display label of a node for diagnostics.
    pub fn node_name(&self, id: NodeId) -> &str {
        self.node(id).map_or("?", |n| n.name.as_str())
    }

    /// Display label of a pipe for diagnostics.
    pub fn pipe_name(&self, id: PipeId) -> &str {
        self.pipe(id).map_or("?", |p| p.name.as_str())
    }
}
