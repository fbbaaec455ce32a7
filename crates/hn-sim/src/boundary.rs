//! Per-step boundary data supplied by the (external) data layer.

use chrono::NaiveDateTime;
use hn_core::units::{kw, lps};
use hn_core::WaterProperties;
use hn_graph::{Network, NodeKind};
use uom::si::mass_rate::kilogram_per_second;
use uom::si::power::watt;

use crate::error::{SimError, SimResult};

/// Gap-filled measurements of one node for one hydraulic step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeBoundary {
    /// Volumetric flow magnitude (l/s); drawn by consumers, injected by feeders.
    pub flow_lps: f64,
    /// Heat drawn by a consumer (kW).
    pub heat_kw: f64,
    /// Supply temperature of a feeder (°C).
    pub supply_temp_c: Option<f64>,
    /// Forerun pressure of a feeder (Pa).
    pub forerun_pressure_pa: Option<f64>,
    /// Return pressure of a feeder (Pa).
    pub return_pressure_pa: Option<f64>,
}

/// Boundary data of every node, indexed by node id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepBoundary {
    pub nodes: Vec<NodeBoundary>,
}

/// Source of per-step boundary data.
pub trait BoundarySource {
    fn boundary(&mut self, step: usize, time: NaiveDateTime, network: &Network) -> SimResult<StepBoundary>;
}

/// Boundary data converted to kernel units.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelBoundary {
    /// Forerun external mass flow per node (kg/s); the reference entry is solved.
    pub forerun_flows: Vec<f64>,
    /// Return external mass flow per node (kg/s), the negated forerun flows.
    pub return_flows: Vec<f64>,
    /// Heat drawn per node (W).
    pub heat_w: Vec<f64>,
    pub supply_temps: Vec<Option<f64>>,
    pub forerun_reference_pressure: f64,
    pub return_reference_pressure: f64,
}

impl StepBoundary {
    /// Check the data against the network and convert to SI mass flows.
    pub fn to_kernel(
        &self,
        step: usize,
        network: &Network,
        water: &WaterProperties,
    ) -> SimResult<KernelBoundary> {
        let invalid = |what: String| SimError::Boundary { step, what };

        if self.nodes.len() != network.node_count() {
            return Err(invalid(format!(
                "{} node entries for {} nodes",
                self.nodes.len(),
                network.node_count()
            )));
        }

        let mut forerun_flows = Vec::with_capacity(self.nodes.len());
        let mut heat_w = Vec::with_capacity(self.nodes.len());
        let mut supply_temps = Vec::with_capacity(self.nodes.len());

        for (node, b) in network.nodes().iter().zip(&self.nodes) {
            if !b.flow_lps.is_finite() || b.flow_lps < 0.0 {
                return Err(invalid(format!("flow of '{}' is {}", node.name, b.flow_lps)));
            }
            if !b.heat_kw.is_finite() {
                return Err(invalid(format!("heat flow of '{}' is {}", node.name, b.heat_kw)));
            }
            if let Some(t) = b.supply_temp_c.filter(|t| !t.is_finite()) {
                return Err(invalid(format!("supply temperature of '{}' is {t}", node.name)));
            }
            if node.is_feeder() && b.supply_temp_c.is_none() {
                return Err(invalid(format!("feeder '{}' has no supply temperature", node.name)));
            }

            let m = water.mass_flow(lps(b.flow_lps)).get::<kilogram_per_second>();
            let ext = match node.kind {
                _ if node.is_reference => 0.0,
                NodeKind::Feeder => m,
                NodeKind::Consumer => -m,
                NodeKind::Distributor => 0.0,
            };
            forerun_flows.push(ext);
            heat_w.push(kw(b.heat_kw).get::<watt>());
            supply_temps.push(b.supply_temp_c);
        }

        let reference = &self.nodes[network.reference().idx()];
        let ref_name = network.node_name(network.reference());
        let forerun_reference_pressure = reference
            .forerun_pressure_pa
            .filter(|p| p.is_finite())
            .ok_or_else(|| invalid(format!("reference '{ref_name}' has no forerun pressure")))?;
        let return_reference_pressure = reference
            .return_pressure_pa
            .filter(|p| p.is_finite())
            .ok_or_else(|| invalid(format!("reference '{ref_name}' has no return pressure")))?;

        Ok(KernelBoundary {
            return_flows: forerun_flows.iter().map(|m| -m).collect(),
            forerun_flows,
            heat_w,
            supply_temps,
            forerun_reference_pressure,
            return_reference_pressure,
        })
    }
}

/// Same boundary data at every step.
#[derive(Clone, Debug)]
pub struct ConstantBoundary(pub StepBoundary);

impl BoundarySource for ConstantBoundary {
    fn boundary(&mut self, _step: usize, _time: NaiveDateTime, _network: &Network) -> SimResult<StepBoundary> {
        Ok(self.0.clone())
    }
}
