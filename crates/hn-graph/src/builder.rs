//! Incremental network builder.

use hn_core::units::{Length, m};
use hn_core::{NodeId, PipeId};

use crate::error::GraphResult;
use crate::graph::{Network, Node, NodeKind, Pipe, PipeParams};
use crate::validate;

/// Builder for constructing a network incrementally.
///
/// Use `add_node` and `add_pipe` to build up the topology, then call
/// `build()` to validate and freeze it into an immutable `Network`.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    nodes: Vec<Node>,
    pipes: Vec<Pipe>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node at the origin with zero elevation and return its ID.
    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId::from_index(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            name: name.into(),
            kind,
            position: (0.0, 0.0),
            elevation: m(0.0),
            is_reference: false,
            is_gap_filling: false,
        });
        id
    }

    /// Add a pipe oriented `from` -> `to` and return its ID.
    pub fn add_pipe(
        &mut self,
        name: impl Into<String>,
        from: NodeId,
        to: NodeId,
        params: PipeParams,
    ) -> PipeId {
        let id = PipeId::from_index(self.pipes.len() as u32);
        self.pipes.push(Pipe {
            id,
            name: name.into(),
            from,
            to,
            params,
        });
        id
    }

    /// Flag a node as carrying the reference pressure.
    ///
    /// Flagging more than one node is accepted here and rejected by `build()`.
    pub fn set_reference(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.get_mut(node.idx()) {
            n.is_reference = true;
        }
    }

    /// Flag the node balancing gap-filled flows; at most one is allowed.
    pub fn set_gap_filling(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.get_mut(node.idx()) {
            n.is_gap_filling = true;
        }
    }

    pub fn set_elevation(&mut self, node: NodeId, elevation: Length) {
        if let Some(n) = self.nodes.get_mut(node.idx()) {
            n.elevation = elevation;
        }
    }

    pub fn set_position(&mut self, node: NodeId, x: f64, y: f64) {
        if let Some(n) = self.nodes.get_mut(node.idx()) {
            n.position = (x, y);
        }
    }

    /// Validate and build the network.
    ///
    /// Checks references and geometry, the reference-pressure configuration,
    /// and that the undirected topology is a single tree.
    pub fn build(self) -> GraphResult<Network> {
        validate::validate_structure(&self.nodes, &self.pipes)?;
        let reference = validate::validate_reference(&self.nodes)?;
        let gap_filling = validate::validate_gap_filling(&self.nodes)?;
        validate::validate_tree(&self.nodes, &self.pipes, reference)?;

        let (node_pipe_offsets, node_pipes) = Self::build_adjacency(&self.nodes, &self.pipes);

        Ok(Network {
            nodes: self.nodes,
            pipes: self.pipes,
            reference,
            gap_filling,
            node_pipe_offsets,
            node_pipes,
        })
    }

    /// Build compact adjacency lists: for each node, collect its incident pipes.
    fn build_adjacency(nodes: &[Node], pipes: &[Pipe]) -> (Vec<usize>, Vec<PipeId>) {
        let mut per_node: Vec<Vec<PipeId>> = vec![Vec::new(); nodes.len()];
        for pipe in pipes {
            per_node[pipe.from.idx()].push(pipe.id);
            per_node[pipe.to.idx()].push(pipe.id);
        }

        let mut offsets = Vec::with_capacity(nodes.len() + 1);
        let mut flat = Vec::with_capacity(2 * pipes.len());
        offsets.push(0);
        for list in per_node {
            flat.extend(list);
            offsets.push(flat.len());
        }
        (offsets, flat)
    }
}
