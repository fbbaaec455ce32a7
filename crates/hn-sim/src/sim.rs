//! Time stepping: one hydraulic solve per direction, then thermal substeps.

use chrono::{NaiveDateTime, TimeDelta};
use hn_core::timing::{Timer, kernel_timing};
use hn_core::{NodeId, WaterProperties, ensure_finite};
use hn_graph::{CouplingMatrix, Network};
use hn_solver::{
    DirectionSettings, FlowDirection, HydraulicInputs, HydraulicSolution, NewtonConfig,
    NewtonSolver, UnknownLayout, solve_direction,
};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::boundary::{BoundarySource, KernelBoundary};
use crate::error::{SimError, SimResult};
use crate::losses::{LossAccumulator, PipeLoss};
use crate::propagation::{
    FlowField, ReturnNodeInput, ThermalContext, check_sweep, forerun_temperature, propagate_substep,
    propagation_order, return_temperature,
};
use crate::segments::{PipeGrid, grids};
use crate::soil::soil_temperature;
use crate::thermal::{SubstepPlan, plan_substeps, stable_dt};

/// Options for simulation runs.
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Calendar time of the first hydraulic step.
    pub start: NaiveDateTime,
    /// Number of hydraulic steps for [`Simulation::run`].
    pub steps: usize,
    /// Hydraulic step (s)
    pub hydraulic_step_s: f64,
    /// Upper bound of a thermal substep (s)
    pub thermal_step_max_s: f64,
    /// Upper bound of a pipe segment (m)
    pub segment_length_max_m: f64,
    /// Fraction of the stability limit a substep may use.
    pub stability_safety: f64,
    pub max_substeps: usize,
    pub water: WaterProperties,
    /// Gravitational acceleration (m/s²)
    pub gravity: f64,
    pub newton: NewtonConfig,
    pub max_direction_corrections: usize,
    /// Flows below `-flow_direction_tol` (kg/s) trigger a flip.
    pub flow_direction_tol: f64,
    /// Initial guess of every pipe flow on a cold start (kg/s).
    pub start_mass_flow: f64,
    /// Initial guess of node pressures relative to the reference (Pa).
    pub start_pressure_offset: f64,
    /// Solve forerun and return hydraulics concurrently.
    pub parallel_directions: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start: NaiveDateTime::default(),
            steps: 1,
            hydraulic_step_s: 900.0,
            thermal_step_max_s: 60.0,
            segment_length_max_m: 10.0,
            stability_safety: 0.9,
            max_substeps: 100_000,
            water: WaterProperties::default(),
            gravity: hn_core::units::constants::G_MPS2,
            newton: NewtonConfig::default(),
            max_direction_corrections: 50,
            flow_direction_tol: 1e-10,
            start_mass_flow: 0.1,
            start_pressure_offset: 0.0,
            parallel_directions: true,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> SimResult<()> {
        let positive = [
            ("hydraulic_step_s", self.hydraulic_step_s),
            ("thermal_step_max_s", self.thermal_step_max_s),
            ("segment_length_max_m", self.segment_length_max_m),
            ("stability_safety", self.stability_safety),
            ("water.rho", self.water.rho),
            ("water.cp", self.water.cp),
        ];
        for (what, v) in positive {
            if !(v > 0.0 && v.is_finite()) {
                return Err(SimError::InvalidArg {
                    what: format!("{what} must be positive, got {v}"),
                });
            }
        }
        if self.stability_safety > 1.0 {
            return Err(SimError::InvalidArg {
                what: format!("stability_safety must not exceed 1, got {}", self.stability_safety),
            });
        }
        if self.max_substeps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_substeps must be positive".to_string(),
            });
        }
        Ok(())
    }

    fn direction_settings(&self) -> DirectionSettings {
        DirectionSettings {
            max_corrections: self.max_direction_corrections,
            flow_tol: self.flow_direction_tol,
        }
    }

    /// Calendar time one hydraulic step after `time`.
    fn advance(&self, time: NaiveDateTime) -> SimResult<NaiveDateTime> {
        TimeDelta::try_milliseconds((self.hydraulic_step_s * 1000.0).round() as i64)
            .and_then(|dt| time.checked_add_signed(dt))
            .ok_or_else(|| SimError::InvalidArg {
                what: format!(
                    "hydraulic step {} s from {time} is out of range",
                    self.hydraulic_step_s
                ),
            })
    }
}

/// Results of one direction at the end of a hydraulic step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectionRecord {
    pub mass_flows_kgps: Vec<f64>,
    /// Including the solved reference feeder flow.
    pub external_flows_kgps: Vec<f64>,
    pub pressures_pa: Vec<f64>,
    pub node_temps_c: Vec<f64>,
    pub segment_temps_c: Vec<Vec<f64>>,
    pub pipe_losses: Vec<PipeLoss>,
    /// Pipes re-oriented during this step.
    pub flipped_pipes: Vec<String>,
    pub corrections: usize,
    pub converged: bool,
}

/// Results of one hydraulic step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub time: NaiveDateTime,
    pub soil_temp_c: f64,
    pub substeps: usize,
    pub substep_s: f64,
    pub forerun: DirectionRecord,
    #[serde(rename = "return")]
    pub ret: DirectionRecord,
}

/// Evolving state of one flow direction.
#[derive(Clone, Debug)]
struct DirectionState {
    coupling: CouplingMatrix,
    segments: Vec<Vec<f64>>,
    node_temps: Vec<f64>,
    last: Option<HydraulicSolution>,
}

impl DirectionState {
    fn new(coupling: CouplingMatrix, grids: &[PipeGrid], node_count: usize, initial: f64) -> Self {
        Self {
            coupling,
            segments: grids.iter().map(|g| vec![initial; g.count]).collect(),
            node_temps: vec![initial; node_count],
            last: None,
        }
    }

    fn seed(&self, layout: &UnknownLayout, config: &SimConfig, inputs: &HydraulicInputs) -> DVector<f64> {
        match &self.last {
            Some(prev) => layout.warm_start(
                &prev.mass_flows,
                &prev.pressures,
                prev.external_flows[layout.reference().idx()],
            ),
            None => layout.seed(
                config.start_mass_flow,
                inputs.reference_pressure,
                config.start_pressure_offset,
                &inputs.external_flows,
            ),
        }
    }
}

/// District-heating network simulation.
pub struct Simulation {
    network: Network,
    config: SimConfig,
    finder: NewtonSolver,
    layout: UnknownLayout,
    grids: Vec<PipeGrid>,
    forerun: DirectionState,
    ret: DirectionState,
    step: usize,
    time: NaiveDateTime,
}

impl Simulation {
    /// Discretize the network and set all temperatures to the soil
    /// temperature at `config.start`.
    pub fn new(network: Network, config: SimConfig) -> SimResult<Self> {
        config.validate()?;

        let grids = grids(&network, config.segment_length_max_m);
        let initial = soil_temperature(config.start);
        let forerun_coupling = CouplingMatrix::from_network(&network);
        let return_coupling = forerun_coupling.negated();
        let n = network.node_count();

        info!(
            nodes = n,
            pipes = network.pipe_count(),
            segments = grids.iter().map(|g| g.count).sum::<usize>(),
            "network discretized"
        );

        Ok(Self {
            layout: UnknownLayout::new(&network),
            forerun: DirectionState::new(forerun_coupling, &grids, n, initial),
            ret: DirectionState::new(return_coupling, &grids, n, initial),
            finder: NewtonSolver::new(config.newton.clone()),
            time: config.start,
            step: 0,
            grids,
            network,
            config,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Calendar time of the next step.
    pub fn time(&self) -> NaiveDateTime {
        self.time
    }

    /// Number of completed hydraulic steps.
    pub fn steps_done(&self) -> usize {
        self.step
    }

    pub fn grids(&self) -> &[PipeGrid] {
        &self.grids
    }

    pub fn coupling(&self, direction: FlowDirection) -> &CouplingMatrix {
        &self.state(direction).coupling
    }

    pub fn segment_temperatures(&self, direction: FlowDirection) -> &[Vec<f64>] {
        &self.state(direction).segments
    }

    pub fn node_temperatures(&self, direction: FlowDirection) -> &[f64] {
        &self.state(direction).node_temps
    }

    fn state(&self, direction: FlowDirection) -> &DirectionState {
        match direction {
            FlowDirection::Forerun => &self.forerun,
            FlowDirection::Return => &self.ret,
        }
    }

    /// Run `config.steps` hydraulic steps.
    pub fn run(&mut self, source: &mut dyn BoundarySource) -> SimResult<Vec<StepRecord>> {
        (0..self.config.steps).map(|_| self.step(source)).collect()
    }

    /// Advance by one hydraulic step.
    ///
    /// On error the simulation is left as it was before the call.
    pub fn step(&mut self, source: &mut dyn BoundarySource) -> SimResult<StepRecord> {
        let next_time = self.config.advance(self.time)?;
        let boundary = source
            .boundary(self.step, self.time, &self.network)?
            .to_kernel(self.step, &self.network, &self.config.water)?;
        let soil = soil_temperature(self.time);

        let (fwd, ret) = self.solve_hydraulics(&boundary)?;

        let fwd_order = propagation_order(FlowDirection::Forerun, &self.network, &fwd.coupling)?;
        let ret_order = propagation_order(FlowDirection::Return, &self.network, &ret.coupling)?;

        let plan = self.plan(&fwd, &ret)?;
        debug!(substeps = plan.count, dt = plan.dt, "thermal substep plan");

        let saved = (self.forerun.clone(), self.ret.clone());
        let outcome = self
            .run_substeps(&plan, &boundary, &fwd, &ret, &fwd_order, &ret_order, soil)
            .and_then(|losses| {
                for &t in self.forerun.node_temps.iter().chain(&self.ret.node_temps) {
                    ensure_finite(t, "node temperature")?;
                }
                Ok(losses)
            });
        let (fwd_losses, ret_losses) = match outcome {
            Ok(losses) => losses,
            Err(e) => {
                (self.forerun, self.ret) = saved;
                return Err(e);
            }
        };

        let record = StepRecord {
            step: self.step,
            time: self.time,
            soil_temp_c: soil,
            substeps: plan.count,
            substep_s: plan.dt,
            forerun: self.direction_record(&fwd, &self.forerun, fwd_losses),
            ret: self.direction_record(&ret, &self.ret, ret_losses),
        };

        info!(
            step = self.step,
            time = %self.time,
            soil_c = soil,
            substeps = plan.count,
            reference_flow = fwd.external_flows[self.network.reference().idx()],
            flips = fwd.flipped.len() + ret.flipped.len(),
            "hydraulic step complete"
        );

        self.forerun.coupling = fwd.coupling.clone();
        self.forerun.last = Some(fwd);
        self.ret.coupling = ret.coupling.clone();
        self.ret.last = Some(ret);
        self.step += 1;
        self.time = next_time;

        Ok(record)
    }

    fn solve_hydraulics(
        &self,
        boundary: &KernelBoundary,
    ) -> SimResult<(HydraulicSolution, HydraulicSolution)> {
        let fwd_inputs = HydraulicInputs {
            external_flows: boundary.forerun_flows.clone(),
            reference_pressure: boundary.forerun_reference_pressure,
            rho: self.config.water.rho,
            gravity: self.config.gravity,
        };
        let ret_inputs = HydraulicInputs {
            external_flows: boundary.return_flows.clone(),
            reference_pressure: boundary.return_reference_pressure,
            ..fwd_inputs.clone()
        };
        let fwd_seed = self.forerun.seed(&self.layout, &self.config, &fwd_inputs);
        let ret_seed = self.ret.seed(&self.layout, &self.config, &ret_inputs);
        let settings = self.config.direction_settings();

        let solve = |direction: FlowDirection,
                     coupling: &CouplingMatrix,
                     inputs: &HydraulicInputs,
                     seed: &DVector<f64>| {
            solve_direction(
                direction,
                &self.network,
                coupling,
                inputs,
                seed,
                &self.finder,
                &settings,
            )
        };

        let (fwd, ret) = if self.config.parallel_directions {
            rayon::join(
                || solve(FlowDirection::Forerun, &self.forerun.coupling, &fwd_inputs, &fwd_seed),
                || solve(FlowDirection::Return, &self.ret.coupling, &ret_inputs, &ret_seed),
            )
        } else {
            (
                solve(FlowDirection::Forerun, &self.forerun.coupling, &fwd_inputs, &fwd_seed),
                solve(FlowDirection::Return, &self.ret.coupling, &ret_inputs, &ret_seed),
            )
        };
        Ok((fwd?, ret?))
    }

    fn plan(&self, fwd: &HydraulicSolution, ret: &HydraulicSolution) -> SimResult<SubstepPlan> {
        let water = &self.config.water;
        let min_stable = self
            .grids
            .iter()
            .enumerate()
            .flat_map(|(i, g)| {
                [
                    stable_dt(g, fwd.mass_flows[i], water),
                    stable_dt(g, ret.mass_flows[i], water),
                ]
            })
            .fold(f64::INFINITY, f64::min);

        plan_substeps(
            self.config.hydraulic_step_s,
            self.config.thermal_step_max_s,
            min_stable,
            self.config.stability_safety,
            self.config.max_substeps,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn run_substeps(
        &mut self,
        plan: &SubstepPlan,
        boundary: &KernelBoundary,
        fwd: &HydraulicSolution,
        ret: &HydraulicSolution,
        fwd_order: &[NodeId],
        ret_order: &[NodeId],
        soil: f64,
    ) -> SimResult<(Vec<PipeLoss>, Vec<PipeLoss>)> {
        let Simulation {
            network,
            config,
            grids,
            forerun,
            ret: backflow,
            step,
            ..
        } = self;
        let network: &Network = network;
        let config: &SimConfig = config;
        let grids: &[PipeGrid] = grids;
        let first_step = *step == 0;
        let nodes = network.nodes();
        let cp = config.water.cp;
        let ctx = ThermalContext {
            grids,
            water: &config.water,
            soil,
            dt: plan.dt,
        };
        let fwd_field = FlowField {
            coupling: &fwd.coupling,
            mass_flows: &fwd.mass_flows,
        };
        let ret_field = FlowField {
            coupling: &ret.coupling,
            mass_flows: &ret.mass_flows,
        };

        let mut fwd_acc = LossAccumulator::new(grids.len());
        let mut ret_acc = LossAccumulator::new(grids.len());
        let mut clipped = vec![false; nodes.len()];
        let mut stagnant = vec![false; nodes.len()];

        for _ in 0..plan.count {
            let timer = Timer::start();
            let prev_fwd = forerun.node_temps.clone();
            let prev_ret = backflow.node_temps.clone();

            let advanced = propagate_substep(
                fwd_order,
                &fwd_field,
                &ctx,
                &mut forerun.segments,
                &mut forerun.node_temps,
                |n, streams| {
                    let i = n.idx();
                    Ok(forerun_temperature(
                        &nodes[i],
                        fwd.external_flows[i],
                        boundary.supply_temps[i],
                        streams,
                        prev_fwd[i],
                    ))
                },
            )?;
            check_sweep(FlowDirection::Forerun, advanced, network.pipe_count())?;

            let fwd_temps = &forerun.node_temps;
            let advanced = propagate_substep(
                ret_order,
                &ret_field,
                &ctx,
                &mut backflow.segments,
                &mut backflow.node_temps,
                |n, streams| {
                    let i = n.idx();
                    let input = ReturnNodeInput {
                        external_flow: ret.external_flows[i],
                        heat_w: boundary.heat_w[i],
                        forerun_temp: fwd_temps[i],
                        history: (!first_step).then(|| (prev_fwd[i], prev_ret[i])),
                        previous: prev_ret[i],
                    };
                    let r = return_temperature(&nodes[i], &input, streams, cp, soil)?;
                    clipped[i] |= r.clipped;
                    stagnant[i] |= r.stagnant;
                    Ok(r.temp)
                },
            )?;
            check_sweep(FlowDirection::Return, advanced, network.pipe_count())?;

            fwd_acc.record(&forerun.segments);
            ret_acc.record(&backflow.segments);
            timer.stop_into(&kernel_timing::THERMAL_SUBSTEPS);
        }

        warn_nodes(network, &clipped, "return temperature clipped at soil temperature");
        warn_nodes(network, &stagnant, "stagnant branch; carrying previous temperature difference");

        Ok((
            fwd_acc.finish(grids, &fwd.mass_flows, soil, cp),
            ret_acc.finish(grids, &ret.mass_flows, soil, cp),
        ))
    }

    fn direction_record(
        &self,
        sol: &HydraulicSolution,
        state: &DirectionState,
        pipe_losses: Vec<PipeLoss>,
    ) -> DirectionRecord {
        DirectionRecord {
            mass_flows_kgps: sol.mass_flows.clone(),
            external_flows_kgps: sol.external_flows.clone(),
            pressures_pa: sol.pressures.clone(),
            node_temps_c: state.node_temps.clone(),
            segment_temps_c: state.segments.clone(),
            pipe_losses,
            flipped_pipes: sol
                .flipped
                .iter()
                .map(|&p| self.network.pipe_name(p).to_string())
                .collect(),
            corrections: sol.corrections,
            converged: sol.converged,
        }
    }
}

fn warn_nodes(network: &Network, flags: &[bool], message: &str) {
    let names: Vec<&str> = flags
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f)
        .map(|(i, _)| network.nodes()[i].name.as_str())
        .collect();
    if !names.is_empty() {
        warn!(nodes = ?names, "{message}");
    }
}
