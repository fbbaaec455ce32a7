//! Conversion of a validated project into kernel inputs.

use crate::schema::{NodeKindDef, Project, SeriesDef, SettingsDef};
use crate::{ProjectError, ProjectResult};
use chrono::NaiveDateTime;
use hn_core::WaterProperties;
use hn_core::units::{m, mm};
use hn_graph::{Network, NetworkBuilder, NodeKind, PipeParams};
use hn_sim::{BoundarySource, NodeBoundary, SimConfig, SimError, SimResult, Simulation, StepBoundary};
use hn_solver::NewtonConfig;
use std::collections::HashMap;
use tracing::debug;

impl From<NodeKindDef> for NodeKind {
    fn from(kind: NodeKindDef) -> Self {
        match kind {
            NodeKindDef::Consumer => NodeKind::Consumer,
            NodeKindDef::Feeder => NodeKind::Feeder,
            NodeKindDef::Distributor => NodeKind::Distributor,
        }
    }
}

impl SettingsDef {
    pub fn to_config(&self) -> SimConfig {
        SimConfig {
            start: self.start,
            steps: self.steps,
            hydraulic_step_s: self.hydraulic_step_s,
            thermal_step_max_s: self.thermal_step_max_s,
            segment_length_max_m: self.segment_length_max_m,
            stability_safety: self.stability_safety,
            max_substeps: self.max_substeps,
            water: WaterProperties {
                cp: self.cp,
                ..WaterProperties::at_temperature(self.water_temp_c)
            },
            gravity: self.gravity,
            newton: NewtonConfig {
                max_iterations: self.newton_max_iterations,
                abs_tol: self.newton_abs_tol,
                ..NewtonConfig::default()
            },
            max_direction_corrections: self.max_direction_corrections,
            flow_direction_tol: self.flow_direction_tol,
            start_mass_flow: self.start_mass_flow,
            start_pressure_offset: self.start_pressure_offset,
            parallel_directions: self.parallel_directions,
        }
    }
}

/// Build the network; node and pipe ids keep their declaration order.
pub fn build_network(project: &Project) -> ProjectResult<Network> {
    let mut builder = NetworkBuilder::new();
    let mut ids = HashMap::new();
    for node in &project.nodes {
        let id = builder.add_node(node.id.clone(), node.kind.into());
        builder.set_position(id, node.x_m, node.y_m);
        builder.set_elevation(id, m(node.elevation_m));
        if node.reference {
            builder.set_reference(id);
        }
        if node.gap_filling {
            builder.set_gap_filling(id);
        }
        ids.insert(node.id.as_str(), id);
    }
    for pipe in &project.pipes {
        let (Some(&from), Some(&to)) = (ids.get(pipe.from.as_str()), ids.get(pipe.to.as_str())) else {
            return Err(ProjectError::Conversion {
                what: format!("pipe '{}' refers to an undeclared node", pipe.id),
            });
        };
        let params = PipeParams::new(m(pipe.length_m), mm(pipe.diameter_mm))
            .with_friction(pipe.friction)
            .with_loss_coefficient(pipe.loss_coefficient)
            .with_htc(pipe.htc);
        builder.add_pipe(pipe.id.clone(), from, to, params);
    }
    let network = builder.build()?;
    debug!(
        nodes = network.node_count(),
        pipes = network.pipe_count(),
        "built network for project '{}'",
        project.name
    );
    Ok(network)
}

/// Build the simulation and its boundary source.
pub fn prepare(project: &Project) -> ProjectResult<(Simulation, SeriesBoundary)> {
    let network = build_network(project)?;
    let boundary = SeriesBoundary::new(project, &network)?;
    let simulation = Simulation::new(network, project.settings.to_config())?;
    Ok((simulation, boundary))
}

/// Boundary source replaying the project's per-node series.
#[derive(Clone, Debug)]
pub struct SeriesBoundary {
    /// Indexed by node id; `None` for nodes without series.
    nodes: Vec<Option<SeriesDef>>,
}

fn sample(values: &[f64], step: usize) -> Option<f64> {
    match values {
        [] => None,
        [v] => Some(*v),
        _ => values.get(step).copied(),
    }
}

impl SeriesBoundary {
    pub fn new(project: &Project, network: &Network) -> ProjectResult<Self> {
        let mut nodes = vec![None; network.node_count()];
        for series in &project.series {
            let node = network.node_by_name(&series.node).ok_or_else(|| ProjectError::Conversion {
                what: format!("series refers to unknown node '{}'", series.node),
            })?;
            nodes[node.id.idx()] = Some(series.clone());
        }
        Ok(Self { nodes })
    }

    /// Boundary of one step; every series must reach that far.
    pub fn at(&self, step: usize) -> SimResult<StepBoundary> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for series in &self.nodes {
            let Some(series) = series else {
                out.push(NodeBoundary::default());
                continue;
            };
            for (field, values) in series.fields() {
                if !values.is_empty() && sample(values, step).is_none() {
                    return Err(SimError::Boundary {
                        step,
                        what: format!("series {field} of node '{}' ends after {} values", series.node, values.len()),
                    });
                }
            }
            out.push(NodeBoundary {
                flow_lps: sample(&series.flow_lps, step).unwrap_or(0.0),
                heat_kw: sample(&series.heat_kw, step).unwrap_or(0.0),
                supply_temp_c: sample(&series.supply_temp_c, step),
                forerun_pressure_pa: sample(&series.forerun_pressure_pa, step),
                return_pressure_pa: sample(&series.return_pressure_pa, step),
            });
        }
        Ok(StepBoundary { nodes: out })
    }
}

impl BoundarySource for SeriesBoundary {
    fn boundary(&mut self, step: usize, _time: NaiveDateTime, _network: &Network) -> SimResult<StepBoundary> {
        self.at(step)
    }
}
