//! Solve-and-reorient loop for one flow direction.

use std::fmt;

use hn_core::PipeId;
use hn_core::timing::{Timer, kernel_timing};
use hn_graph::{CouplingMatrix, Network};
use nalgebra::DVector;
use tracing::{Level, debug, enabled, trace, warn};

use crate::error::{SolverError, SolverResult};
use crate::hydraulic::{HydraulicInputs, HydraulicProblem};
use crate::system::{NonlinearSystem, RootFinder};
use crate::unknowns::UnknownLayout;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowDirection {
    Forerun,
    Return,
}

impl FlowDirection {
    pub fn label(self) -> &'static str {
        match self {
            FlowDirection::Forerun => "forerun",
            FlowDirection::Return => "return",
        }
    }
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Limits of the direction-correction loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionSettings {
    /// Maximum number of re-orientations before giving up.
    pub max_corrections: usize,
    /// Flows below `-flow_tol` (kg/s) count as reversed.
    pub flow_tol: f64,
}

impl Default for DirectionSettings {
    fn default() -> Self {
        Self {
            max_corrections: 50,
            flow_tol: 1e-10,
        }
    }
}

/// Converged hydraulic state of one direction.
#[derive(Clone, Debug)]
pub struct HydraulicSolution {
    /// Coupling matrix oriented along the solved flows.
    pub coupling: CouplingMatrix,
    /// Mass flow per pipe (kg/s), non-negative up to `flow_tol`.
    pub mass_flows: Vec<f64>,
    /// Pressure per node (Pa).
    pub pressures: Vec<f64>,
    /// External mass flow per node, including the solved reference flow.
    pub external_flows: Vec<f64>,
    /// Pipes whose orientation differs from the input matrix.
    pub flipped: Vec<PipeId>,
    /// Number of re-solves triggered by reversed flows.
    pub corrections: usize,
    /// Whether the final root-finder call met its tolerance.
    pub converged: bool,
    pub residual_norm: f64,
    /// Final unknown vector, usable as a warm start.
    pub unknowns: DVector<f64>,
}

/// Solve one direction, flipping reversed pipes and re-solving from `seed`
/// until every pipe carries non-negative flow.
pub fn solve_direction<R>(
    direction: FlowDirection,
    network: &Network,
    coupling: &CouplingMatrix,
    inputs: &HydraulicInputs,
    seed: &DVector<f64>,
    finder: &R,
    settings: &DirectionSettings,
) -> SolverResult<HydraulicSolution>
where
    R: RootFinder + ?Sized,
{
    let timer = Timer::start();
    let layout = UnknownLayout::new(network);
    let mut matrix = coupling.clone();
    let mut flip_count = vec![0usize; network.pipe_count()];

    for corrections in 0..=settings.max_corrections {
        let problem = HydraulicProblem::new(network, &matrix, &layout, inputs)?;
        if enabled!(Level::TRACE) {
            for (i, eq) in problem.equation_labels().iter().enumerate() {
                trace!("{direction} equation {i}: {eq}");
            }
        }

        let result = finder.find_root(&problem, seed.clone())?;
        if !result.converged {
            warn!(
                %direction,
                residual = result.residual_norm,
                "hydraulic system did not converge; continuing with best estimate"
            );
        }
        debug_assert_eq!(result.x.len(), problem.dimension());

        let flows = layout.mass_flows(&result.x);
        let fix = matrix.correct(flows, settings.flow_tol);
        if fix.converged() {
            let mut external_flows = inputs.external_flows.clone();
            external_flows[layout.reference().idx()] = layout.reference_flow(&result.x);
            timer.stop_into(&kernel_timing::HYDRAULIC_SOLVES);
            return Ok(HydraulicSolution {
                coupling: matrix,
                mass_flows: flows.to_vec(),
                pressures: layout.pressures(&result.x, inputs.reference_pressure),
                external_flows,
                flipped: flip_count
                    .iter()
                    .enumerate()
                    .filter(|&(_, n)| n % 2 == 1)
                    .map(|(i, _)| PipeId::from_index(i as u32))
                    .collect(),
                corrections,
                converged: result.converged,
                residual_norm: result.residual_norm,
                unknowns: result.x,
            });
        }

        if corrections == settings.max_corrections {
            return Err(SolverError::DirectionCorrectionExceeded {
                direction: direction.label(),
                iterations: corrections,
                pipes: fix
                    .flipped
                    .iter()
                    .map(|&p| network.pipe_name(p).to_string())
                    .collect(),
            });
        }

        for &pipe in &fix.flipped {
            debug!(
                "{direction}: correcting flow direction of pipe {}",
                network.pipe_name(pipe)
            );
            flip_count[pipe.idx()] += 1;
        }
        matrix = fix.matrix;
    }

    unreachable!("loop returns on its last iteration")
}
