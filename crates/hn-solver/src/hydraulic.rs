//! Continuity and pressure equations of one flow direction.

use hn_core::{NodeId, PipeId};
use hn_graph::{CouplingMatrix, Network};
use nalgebra::{DMatrix, DVector};

use crate::error::{SolverError, SolverResult};
use crate::system::NonlinearSystem;
use crate::unknowns::UnknownLayout;

/// Per-step boundary data of the hydraulic system.
#[derive(Clone, Debug, PartialEq)]
pub struct HydraulicInputs {
    /// External mass flow per node (kg/s): feeders positive, consumers negative.
    /// The reference node's entry is an unknown and is ignored.
    pub external_flows: Vec<f64>,
    /// Fixed pressure at the reference node (Pa).
    pub reference_pressure: f64,
    /// Water density (kg/m³).
    pub rho: f64,
    /// Gravitational acceleration (m/s²).
    pub gravity: f64,
}

/// Residual `F(x)` for one direction under a fixed coupling matrix.
///
/// Rows `0..N` are node continuity equations
/// `Σ_p C[n,p]·m_p − m_ext_n = 0`, rows `N..N+P` are pipe pressure equations
/// `Σ_n Cᵀ[p,n]·(p_n + ρ·g·h_n) − K_p·m_p² = 0`.
pub struct HydraulicProblem<'a> {
    network: &'a Network,
    coupling: &'a CouplingMatrix,
    layout: &'a UnknownLayout,
    inputs: &'a HydraulicInputs,
    resistance: Vec<f64>,
    head: Vec<f64>,
}

impl<'a> HydraulicProblem<'a> {
    pub fn new(
        network: &'a Network,
        coupling: &'a CouplingMatrix,
        layout: &'a UnknownLayout,
        inputs: &'a HydraulicInputs,
    ) -> SolverResult<Self> {
        if inputs.external_flows.len() != network.node_count() {
            return Err(SolverError::ProblemSetup {
                what: format!(
                    "{} external flows given for {} nodes",
                    inputs.external_flows.len(),
                    network.node_count()
                ),
            });
        }
        if coupling.node_count() != network.node_count()
            || coupling.pipe_count() != network.pipe_count()
        {
            return Err(SolverError::ProblemSetup {
                what: "coupling matrix does not match network".to_string(),
            });
        }
        if !(inputs.rho > 0.0) {
            return Err(SolverError::ProblemSetup {
                what: format!("density must be positive, got {}", inputs.rho),
            });
        }
        if let Some((i, m)) = inputs
            .external_flows
            .iter()
            .enumerate()
            .find(|(_, m)| !m.is_finite())
        {
            return Err(SolverError::ProblemSetup {
                what: format!("external flow of node '{}' is {m}", network.nodes()[i].name),
            });
        }

        let resistance = network.pipes().iter().map(|p| p.resistance(inputs.rho)).collect();
        let head = network
            .nodes()
            .iter()
            .map(|n| inputs.rho * inputs.gravity * n.elevation.value)
            .collect();

        Ok(Self {
            network,
            coupling,
            layout,
            inputs,
            resistance,
            head,
        })
    }

    fn external_flow(&self, x: &DVector<f64>, node: NodeId) -> f64 {
        if node == self.layout.reference() {
            self.layout.reference_flow(x)
        } else {
            self.inputs.external_flows[node.idx()]
        }
    }

    fn hydraulic_head(&self, x: &DVector<f64>, node: NodeId) -> f64 {
        self.layout.pressure(x, node, self.inputs.reference_pressure) + self.head[node.idx()]
    }

    /// Resistance `K` of a pipe in `Δp = K·m²`.
    pub fn resistance(&self, pipe: PipeId) -> f64 {
        self.resistance[pipe.idx()]
    }

    /// Human-readable form of every equation, in residual row order.
    pub fn equation_labels(&self) -> Vec<String> {
        let mut labels = Vec::with_capacity(self.dimension());

        for node in self.network.nodes() {
            let mut eq = String::new();
            for (pipe, sign) in self.coupling.row(node.id) {
                let op = if sign > 0 { "+" } else { "-" };
                if eq.is_empty() {
                    eq.push_str(op);
                } else {
                    eq.push_str(&format!(" {op} "));
                }
                eq.push_str(&format!("m({})", self.network.pipe_name(pipe)));
            }
            if node.id == self.layout.reference()
                || self.inputs.external_flows[node.id.idx()] != 0.0
            {
                eq.push_str(&format!(" - m_ext({})", node.name));
            } else {
                eq.push_str(" + 0");
            }
            eq.push_str(" = 0");
            labels.push(eq);
        }

        for pipe in self.network.pipes() {
            let s = self.network.node_name(self.coupling.start(pipe.id));
            let e = self.network.node_name(self.coupling.end(pipe.id));
            labels.push(format!(
                "(p({s}) + rho*g*h({s})) - (p({e}) + rho*g*h({e})) - K({p})*m({p})^2 = 0",
                p = pipe.name
            ));
        }

        labels
    }
}

impl NonlinearSystem for HydraulicProblem<'_> {
    fn dimension(&self) -> usize {
        self.layout.len()
    }

    fn residual(&self, x: &DVector<f64>) -> SolverResult<DVector<f64>> {
        let n_nodes = self.network.node_count();
        let flows = self.layout.mass_flows(x);
        let mut r = DVector::zeros(self.dimension());

        for node in self.network.nodes() {
            let balance: f64 = self
                .coupling
                .row(node.id)
                .map(|(p, s)| f64::from(s) * flows[p.idx()])
                .sum();
            r[node.id.idx()] = balance - self.external_flow(x, node.id);
        }

        for pipe in self.network.pipes() {
            let m = flows[pipe.id.idx()];
            let drop = self.hydraulic_head(x, self.coupling.start(pipe.id))
                - self.hydraulic_head(x, self.coupling.end(pipe.id));
            r[n_nodes + pipe.id.idx()] = drop - self.resistance(pipe.id) * m * m;
        }

        Ok(r)
    }

    fn jacobian(&self, x: &DVector<f64>) -> SolverResult<DMatrix<f64>> {
        let n_nodes = self.network.node_count();
        let flows = self.layout.mass_flows(x);
        let dim = self.dimension();
        let mut jac = DMatrix::zeros(dim, dim);

        for node in self.network.nodes() {
            for (p, s) in self.coupling.row(node.id) {
                jac[(node.id.idx(), self.layout.flow_index(p))] = f64::from(s);
            }
        }
        jac[(self.layout.reference().idx(), self.layout.reference_flow_index())] = -1.0;

        for pipe in self.network.pipes() {
            let row = n_nodes + pipe.id.idx();
            let col = self.layout.flow_index(pipe.id);
            jac[(row, col)] = -2.0 * self.resistance(pipe.id) * flows[pipe.id.idx()];
            if let Some(i) = self.layout.pressure_index(self.coupling.start(pipe.id)) {
                jac[(row, i)] = 1.0;
            }
            if let Some(i) = self.layout.pressure_index(self.coupling.end(pipe.id)) {
                jac[(row, i)] = -1.0;
            }
        }

        Ok(jac)
    }
}
