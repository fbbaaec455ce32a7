//! Project schema definitions.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub settings: SettingsDef,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub pipes: Vec<PipeDef>,
    /// Gap-filled per-node boundary series.
    #[serde(default)]
    pub series: Vec<SeriesDef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKindDef {
    Consumer,
    Feeder,
    Distributor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDef {
    pub id: String,
    pub kind: NodeKindDef,
    /// Carries the fixed forerun/return reference pressure.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reference: bool,
    /// Closes the volumetric flow balance of gap-filled series; at most one node.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub gap_filling: bool,
    #[serde(default)]
    pub x_m: f64,
    #[serde(default)]
    pub y_m: f64,
    #[serde(default)]
    pub elevation_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipeDef {
    pub id: String,
    pub from: String,
    pub to: String,
    pub length_m: f64,
    pub diameter_mm: f64,
    #[serde(default = "default_friction")]
    pub friction: f64,
    #[serde(default)]
    pub loss_coefficient: f64,
    /// W/(m² K), referred to the inner pipe surface.
    #[serde(default = "default_htc")]
    pub htc: f64,
}

fn default_friction() -> f64 {
    0.02
}

fn default_htc() -> f64 {
    0.5
}

/// Boundary series of one node.
///
/// A series with a single value is held constant; otherwise it needs one
/// value per hydraulic step. Empty series are absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SeriesDef {
    pub node: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_lps: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub heat_kw: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supply_temp_c: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forerun_pressure_pa: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub return_pressure_pa: Vec<f64>,
}

impl SeriesDef {
    /// Named series of this node, in declaration order.
    pub fn fields(&self) -> [(&'static str, &[f64]); 5] {
        [
            ("flow_lps", self.flow_lps.as_slice()),
            ("heat_kw", self.heat_kw.as_slice()),
            ("supply_temp_c", self.supply_temp_c.as_slice()),
            ("forerun_pressure_pa", self.forerun_pressure_pa.as_slice()),
            ("return_pressure_pa", self.return_pressure_pa.as_slice()),
        ]
    }
}

/// Run settings; every field falls back to the simulation default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SettingsDef {
    pub start: NaiveDateTime,
    pub steps: usize,
    pub hydraulic_step_s: f64,
    pub thermal_step_max_s: f64,
    pub segment_length_max_m: f64,
    pub stability_safety: f64,
    pub max_substeps: usize,
    /// Temperature at which the constant water density is evaluated (°C).
    pub water_temp_c: f64,
    pub cp: f64,
    pub gravity: f64,
    pub newton_max_iterations: usize,
    pub newton_abs_tol: f64,
    pub max_direction_corrections: usize,
    pub flow_direction_tol: f64,
    pub start_mass_flow: f64,
    pub start_pressure_offset: f64,
    pub parallel_directions: bool,
}

impl Default for SettingsDef {
    fn default() -> Self {
        let sim = hn_sim::SimConfig::default();
        Self {
            start: sim.start,
            steps: sim.steps,
            hydraulic_step_s: sim.hydraulic_step_s,
            thermal_step_max_s: sim.thermal_step_max_s,
            segment_length_max_m: sim.segment_length_max_m,
            stability_safety: sim.stability_safety,
            max_substeps: sim.max_substeps,
            water_temp_c: hn_core::WaterProperties::REFERENCE_TEMP_C,
            cp: sim.water.cp,
            gravity: sim.gravity,
            newton_max_iterations: sim.newton.max_iterations,
            newton_abs_tol: sim.newton.abs_tol,
            max_direction_corrections: sim.max_direction_corrections,
            flow_direction_tol: sim.flow_direction_tol,
            start_mass_flow: sim.start_mass_flow,
            start_pressure_offset: sim.start_pressure_offset,
            parallel_directions: sim.parallel_directions,
        }
    }
}
