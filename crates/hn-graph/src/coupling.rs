//! Signed node/pipe incidence matrix.
//!
//! Entry (n, p) is +1 if pipe p starts at node n, -1 if it ends there and 0
//! otherwise. The orientation encodes the assumed flow direction; after a
//! hydraulic solve every column must agree with the solved sign of its pipe's
//! mass flow. Corrections never mutate in place: [`CouplingMatrix::correct`]
//! returns a new matrix plus the list of flipped pipes.

use hn_core::{NodeId, PipeId};

use crate::graph::Network;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouplingMatrix {
    n_nodes: usize,
    n_pipes: usize,
    /// Row-major node x pipe entries.
    entries: Vec<i8>,
    /// Row-major pipe x node copy, kept in sync with `entries`.
    transposed: Vec<i8>,
    /// (start, end) of every pipe under the current orientation.
    ends: Vec<(NodeId, NodeId)>,
    /// Incident pipes per node; orientation independent.
    incident: Vec<Vec<PipeId>>,
}

/// Outcome of one direction-correction scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionCorrection {
    pub matrix: CouplingMatrix,
    /// Pipes whose orientation was reversed, in ID order.
    pub flipped: Vec<PipeId>,
}

impl DirectionCorrection {
    /// True when no pipe had to be flipped, i.e. the input orientation was already consistent.
    pub fn converged(&self) -> bool {
        self.flipped.is_empty()
    }
}

impl CouplingMatrix {
    /// Build the matrix from the declared `from -> to` orientation of every pipe.
    pub fn from_network(network: &Network) -> Self {
        let ends = network.pipes().iter().map(|p| (p.from, p.to)).collect();
        let incident = network
            .nodes()
            .iter()
            .map(|n| network.node_pipes(n.id).to_vec())
            .collect();
        Self::from_ends(network.node_count(), ends, incident)
    }

    /// Build a matrix directly from `(start, end)` pairs, without topology checks.
    ///
    /// Endpoints must be below `node_count`.
    pub fn from_pipe_ends(node_count: usize, ends: &[(NodeId, NodeId)]) -> Self {
        let mut incident = vec![Vec::new(); node_count];
        for (i, &(s, e)) in ends.iter().enumerate() {
            let pipe = PipeId::from_index(i as u32);
            incident[s.idx()].push(pipe);
            incident[e.idx()].push(pipe);
        }
        Self::from_ends(node_count, ends.to_vec(), incident)
    }

    fn from_ends(n_nodes: usize, ends: Vec<(NodeId, NodeId)>, incident: Vec<Vec<PipeId>>) -> Self {
        let n_pipes = ends.len();
        let mut m = Self {
            n_nodes,
            n_pipes,
            entries: vec![0; n_nodes * n_pipes],
            transposed: vec![0; n_nodes * n_pipes],
            ends,
            incident,
        };
        for p in 0..n_pipes {
            m.write_column(p);
        }
        m
    }

    fn write_column(&mut self, p: usize) {
        let (start, end) = self.ends[p];
        for n in 0..self.n_nodes {
            let v = if n == start.idx() {
                1
            } else if n == end.idx() {
                -1
            } else {
                0
            };
            self.entries[n * self.n_pipes + p] = v;
            self.transposed[p * self.n_nodes + n] = v;
        }
    }

    pub fn node_count(&self) -> usize {
        self.n_nodes
    }

    pub fn pipe_count(&self) -> usize {
        self.n_pipes
    }

    pub fn entry(&self, node: NodeId, pipe: PipeId) -> i8 {
        self.entries[node.idx() * self.n_pipes + pipe.idx()]
    }

    /// Column of `pipe` as a node-indexed slice, read from the transposed copy.
    pub fn column(&self, pipe: PipeId) -> &[i8] {
        let start = pipe.idx() * self.n_nodes;
        &self.transposed[start..start + self.n_nodes]
    }

    /// Non-zero entries of a node's row.
    pub fn row(&self, node: NodeId) -> impl Iterator<Item = (PipeId, i8)> + '_ {
        self.incident[node.idx()]
            .iter()
            .map(move |&p| (p, self.entry(node, p)))
    }

    /// Node the pipe's flow leaves from.
    pub fn start(&self, pipe: PipeId) -> NodeId {
        self.ends[pipe.idx()].0
    }

    /// Node the pipe's flow arrives at.
    pub fn end(&self, pipe: PipeId) -> NodeId {
        self.ends[pipe.idx()].1
    }

    /// Pipes whose flow arrives at `node` (entry -1).
    pub fn incoming(&self, node: NodeId) -> impl Iterator<Item = PipeId> + '_ {
        self.row(node).filter(|&(_, s)| s < 0).map(|(p, _)| p)
    }

    /// Pipes whose flow leaves `node` (entry +1).
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = PipeId> + '_ {
        self.row(node).filter(|&(_, s)| s > 0).map(|(p, _)| p)
    }

    pub fn in_degree(&self, node: NodeId) -> usize {
        self.incoming(node).count()
    }

    /// Every pipe reversed; the starting orientation of the return network.
    pub fn negated(&self) -> Self {
        let ends = self.ends.iter().map(|&(s, e)| (e, s)).collect();
        Self::from_ends(self.n_nodes, ends, self.incident.clone())
    }

    /// Copy of this matrix with the given columns reversed.
    pub fn with_flipped(&self, pipes: &[PipeId]) -> Self {
        let mut m = self.clone();
        for &p in pipes {
            let (s, e) = m.ends[p.idx()];
            m.ends[p.idx()] = (e, s);
            m.write_column(p.idx());
        }
        m
    }

    /// Flip every pipe whose solved mass flow is below `-tol`.
    pub fn correct(&self, mass_flows: &[f64], tol: f64) -> DirectionCorrection {
        let flipped: Vec<PipeId> = mass_flows
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m < -tol)
            .map(|(i, _)| PipeId::from_index(i as u32))
            .collect();
        DirectionCorrection {
            matrix: self.with_flipped(&flipped),
            flipped,
        }
    }

    /// Dense node-major rows, for reporting.
    pub fn to_rows(&self) -> Vec<Vec<i8>> {
        self.entries
            .chunks(self.n_pipes.max(1))
            .take(self.n_nodes)
            .map(|r| r[..self.n_pipes].to_vec())
            .collect()
    }
}
