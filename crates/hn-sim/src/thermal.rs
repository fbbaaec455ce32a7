//! Explicit upwind transport of temperature along a pipe and substep sizing.
//!
//! Each segment obeys
//!
//! ```text
//! ρ·c_p·A·Δx · dT/dt = ṁ·c_p·(T_up − T) − htc·π·d·Δx·(T − T_soil)
//! ```
//!
//! with `T_up` the upstream segment (or the pipe inlet for the first one).
//! Forward Euler on this is monotone while `dt · a ≤ 1`, where
//! `a = ṁ/(ρ·A·Δx) + htc·π·d/(ρ·c_p·A)`.

use hn_core::WaterProperties;

use crate::error::{SimError, SimResult};
use crate::segments::PipeGrid;

/// Advance all segment temperatures of one pipe by `dt`.
///
/// Reversed flows below zero are treated as stagnant.
pub fn advance_segments(
    temps: &mut [f64],
    inlet: f64,
    mass_flow: f64,
    grid: &PipeGrid,
    water: &WaterProperties,
    soil: f64,
    dt: f64,
) {
    let m = mass_flow.max(0.0);
    let capacity = water.rho * water.cp * grid.dx * grid.flow_area();
    let advect = m * water.cp;
    let loss = grid.htc * grid.segment_surface();

    // Back to front so the upstream value is still the old one.
    for i in (0..temps.len()).rev() {
        let upstream = if i == 0 { inlet } else { temps[i - 1] };
        let t = temps[i];
        let dtdt = (advect * (upstream - t) - loss * (t - soil)) / capacity;
        temps[i] = t + dtdt * dt;
    }
}

/// Largest stable explicit step for a pipe at the given flow, `f64::INFINITY`
/// for a lossless stagnant pipe.
pub fn stable_dt(grid: &PipeGrid, mass_flow: f64, water: &WaterProperties) -> f64 {
    let area = grid.flow_area();
    let a = mass_flow.max(0.0) / (water.rho * area * grid.dx)
        + grid.htc * std::f64::consts::PI * grid.diameter / (water.rho * water.cp * area);
    if a > 0.0 { 1.0 / a } else { f64::INFINITY }
}

/// Division of one hydraulic step into equal thermal substeps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubstepPlan {
    pub count: usize,
    pub dt: f64,
}

/// Choose the number of substeps so that each is no longer than `max_dt` and
/// no longer than `safety · min_stable_dt`.
pub fn plan_substeps(
    hydraulic_dt: f64,
    max_dt: f64,
    min_stable_dt: f64,
    safety: f64,
    max_substeps: usize,
) -> SimResult<SubstepPlan> {
    if !(hydraulic_dt > 0.0) || !(max_dt > 0.0) || !(safety > 0.0) {
        return Err(SimError::InvalidArg {
            what: format!(
                "step sizes must be positive (hydraulic {hydraulic_dt}, thermal {max_dt}, safety {safety})"
            ),
        });
    }
    let by_limit = (hydraulic_dt / max_dt).ceil();
    let by_stability = if min_stable_dt.is_finite() {
        (hydraulic_dt / (safety * min_stable_dt)).ceil()
    } else {
        1.0
    };
    let required = by_limit.max(by_stability).max(1.0);
    if required > max_substeps as f64 {
        return Err(SimError::SubstepLimit {
            required: required.min(usize::MAX as f64) as usize,
            limit: max_substeps,
        });
    }
    let count = required as usize;
    Ok(SubstepPlan {
        count,
        dt: hydraulic_dt / count as f64,
    })
}
