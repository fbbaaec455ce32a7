//! Layout of the hydraulic unknown vector.
//!
//! `[ m_pipe(0..P) | p_node(non-reference, in node order) | m_ext(reference) ]`

use hn_core::{NodeId, PipeId};
use hn_graph::Network;
use nalgebra::DVector;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownLayout {
    n_pipes: usize,
    reference: NodeId,
    /// Slot of every node's pressure, `None` for the reference node.
    pressure_slots: Vec<Option<usize>>,
}

impl UnknownLayout {
    pub fn new(network: &Network) -> Self {
        let n_pipes = network.pipe_count();
        let reference = network.reference();
        let mut next = n_pipes;
        let pressure_slots = network
            .nodes()
            .iter()
            .map(|n| {
                if n.id == reference {
                    None
                } else {
                    next += 1;
                    Some(next - 1)
                }
            })
            .collect();
        Self {
            n_pipes,
            reference,
            pressure_slots,
        }
    }

    /// Total number of unknowns (= pipes + nodes).
    pub fn len(&self) -> usize {
        self.n_pipes + self.pressure_slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_count(&self) -> usize {
        self.pressure_slots.len()
    }

    pub fn pipe_count(&self) -> usize {
        self.n_pipes
    }

    pub fn reference(&self) -> NodeId {
        self.reference
    }

    pub fn flow_index(&self, pipe: PipeId) -> usize {
        pipe.idx()
    }

    pub fn pressure_index(&self, node: NodeId) -> Option<usize> {
        self.pressure_slots[node.idx()]
    }

    /// Slot of the reference node's external mass flow (always last).
    pub fn reference_flow_index(&self) -> usize {
        self.len() - 1
    }

    pub fn mass_flows<'a>(&self, x: &'a DVector<f64>) -> &'a [f64] {
        &x.as_slice()[..self.n_pipes]
    }

    /// Pressure of `node`, reading the fixed reference value for the reference node.
    pub fn pressure(&self, x: &DVector<f64>, node: NodeId, reference_pressure: f64) -> f64 {
        match self.pressure_index(node) {
            Some(i) => x[i],
            None => reference_pressure,
        }
    }

    /// Full node pressure vector.
    pub fn pressures(&self, x: &DVector<f64>, reference_pressure: f64) -> Vec<f64> {
        self.pressure_slots
            .iter()
            .map(|slot| slot.map_or(reference_pressure, |i| x[i]))
            .collect()
    }

    pub fn reference_flow(&self, x: &DVector<f64>) -> f64 {
        x[self.reference_flow_index()]
    }

    /// Assemble an unknown vector from per-pipe flows, per-node pressures and
    /// the reference node's external flow. The reference entry of `pressures`
    /// is ignored.
    pub fn pack(&self, mass_flows: &[f64], pressures: &[f64], reference_flow: f64) -> DVector<f64> {
        let mut x = DVector::zeros(self.len());
        for (i, m) in mass_flows.iter().enumerate().take(self.n_pipes) {
            x[i] = *m;
        }
        for (slot, p) in self.pressure_slots.iter().zip(pressures) {
            if let Some(i) = slot {
                x[*i] = *p;
            }
        }
        let last = self.reference_flow_index();
        x[last] = reference_flow;
        x
    }

    /// Cold start: uniform pipe flow, uniform pressure guess and the reference
    /// flow that balances the given external flows.
    pub fn seed(
        &self,
        start_mass_flow: f64,
        reference_pressure: f64,
        pressure_offset: f64,
        external_flows: &[f64],
    ) -> DVector<f64> {
        let flows = vec![start_mass_flow; self.n_pipes];
        let pressures = vec![reference_pressure + pressure_offset; self.node_count()];
        self.pack(&flows, &pressures, self.balancing_flow(external_flows))
    }

    /// Warm start from a previous solution; flows are taken in absolute value
    /// because orientations have already been corrected.
    pub fn warm_start(&self, mass_flows: &[f64], pressures: &[f64], reference_flow: f64) -> DVector<f64> {
        let flows: Vec<f64> = mass_flows.iter().map(|m| m.abs()).collect();
        self.pack(&flows, pressures, reference_flow)
    }

    /// External flow at the reference node that closes the global mass balance.
    pub fn balancing_flow(&self, external_flows: &[f64]) -> f64 {
        -external_flows
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != self.reference.idx())
            .map(|(_, m)| m)
            .sum::<f64>()
    }
}
