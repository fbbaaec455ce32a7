//! Project validation logic.
//!
//! Checks what the file format can get wrong on its own: ids, references,
//! value ranges and series lengths. Topology rules (single reference, tree
//! shape) are enforced when the network is built.

use crate::schema::{NodeDef, NodeKindDef, PipeDef, Project, SeriesDef, SettingsDef};
use std::collections::{HashMap, HashSet};

pub const LATEST_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Series {field} of node '{node}' has {len} values, expected 1 or at least {steps}")]
    SeriesLength {
        node: String,
        field: &'static str,
        len: usize,
        steps: usize,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version == 0 || project.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    validate_settings(&project.settings)?;

    let mut node_kinds = HashMap::new();
    for node in &project.nodes {
        if node_kinds.insert(node.id.as_str(), node.kind).is_some() {
            return Err(ValidationError::DuplicateId {
                id: node.id.clone(),
                context: "nodes".to_string(),
            });
        }
        validate_node(node)?;
    }

    let mut pipe_ids = HashSet::new();
    for pipe in &project.pipes {
        if !pipe_ids.insert(pipe.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: pipe.id.clone(),
                context: "pipes".to_string(),
            });
        }
        validate_pipe(pipe, &node_kinds)?;
    }

    let mut series_nodes = HashSet::new();
    for series in &project.series {
        if !series_nodes.insert(series.node.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: series.node.clone(),
                context: "series".to_string(),
            });
        }
        let Some(kind) = node_kinds.get(series.node.as_str()) else {
            return Err(ValidationError::MissingReference {
                id: series.node.clone(),
                context: "series node".to_string(),
            });
        };
        validate_series(series, *kind, project.settings.steps)?;
    }

    Ok(())
}

fn positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be positive".to_string(),
        })
    }
}

fn finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be finite".to_string(),
        })
    }
}

fn validate_settings(settings: &SettingsDef) -> Result<(), ValidationError> {
    positive("settings.hydraulic_step_s", settings.hydraulic_step_s)?;
    positive("settings.thermal_step_max_s", settings.thermal_step_max_s)?;
    positive("settings.segment_length_max_m", settings.segment_length_max_m)?;
    positive("settings.stability_safety", settings.stability_safety)?;
    positive("settings.cp", settings.cp)?;
    positive("settings.newton_abs_tol", settings.newton_abs_tol)?;
    finite("settings.water_temp_c", settings.water_temp_c)?;
    finite("settings.gravity", settings.gravity)?;
    finite("settings.start_mass_flow", settings.start_mass_flow)?;
    finite("settings.start_pressure_offset", settings.start_pressure_offset)?;
    if settings.stability_safety > 1.0 {
        return Err(ValidationError::InvalidValue {
            field: "settings.stability_safety".to_string(),
            value: settings.stability_safety.to_string(),
            reason: "must not exceed 1".to_string(),
        });
    }
    if settings.steps == 0 {
        return Err(ValidationError::InvalidValue {
            field: "settings.steps".to_string(),
            value: "0".to_string(),
            reason: "at least one hydraulic step is required".to_string(),
        });
    }
    Ok(())
}

fn validate_node(node: &NodeDef) -> Result<(), ValidationError> {
    finite(&format!("node '{}' x_m", node.id), node.x_m)?;
    finite(&format!("node '{}' y_m", node.id), node.y_m)?;
    finite(&format!("node '{}' elevation_m", node.id), node.elevation_m)?;
    Ok(())
}

fn validate_pipe(
    pipe: &PipeDef,
    node_kinds: &HashMap<&str, NodeKindDef>,
) -> Result<(), ValidationError> {
    for end in [&pipe.from, &pipe.to] {
        if !node_kinds.contains_key(end.as_str()) {
            return Err(ValidationError::MissingReference {
                id: end.clone(),
                context: format!("pipe '{}'", pipe.id),
            });
        }
    }
    positive(&format!("pipe '{}' length_m", pipe.id), pipe.length_m)?;
    positive(&format!("pipe '{}' diameter_mm", pipe.id), pipe.diameter_mm)?;
    for (field, value) in [
        ("friction", pipe.friction),
        ("loss_coefficient", pipe.loss_coefficient),
        ("htc", pipe.htc),
    ] {
        if !(value >= 0.0 && value.is_finite()) {
            return Err(ValidationError::InvalidValue {
                field: format!("pipe '{}' {field}", pipe.id),
                value: value.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_series(series: &SeriesDef, kind: NodeKindDef, steps: usize) -> Result<(), ValidationError> {
    for (field, values) in series.fields() {
        if values.is_empty() {
            continue;
        }
        if values.len() != 1 && values.len() < steps {
            return Err(ValidationError::SeriesLength {
                node: series.node.clone(),
                field,
                len: values.len(),
                steps,
            });
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(ValidationError::InvalidValue {
                field: format!("series '{}' {field}", series.node),
                value: v.to_string(),
                reason: "must be finite".to_string(),
            });
        }
    }

    let feeder_only = !series.supply_temp_c.is_empty()
        || !series.forerun_pressure_pa.is_empty()
        || !series.return_pressure_pa.is_empty();
    if feeder_only && kind != NodeKindDef::Feeder {
        return Err(ValidationError::InvalidValue {
            field: format!("series '{}'", series.node),
            value: format!("{kind:?}"),
            reason: "supply temperatures and pressures belong to feeders".to_string(),
        });
    }
    if !series.heat_kw.is_empty() && kind != NodeKindDef::Consumer {
        return Err(ValidationError::InvalidValue {
            field: format!("series '{}' heat_kw", series.node),
            value: format!("{kind:?}"),
            reason: "only consumers draw heat".to_string(),
        });
    }
    if kind == NodeKindDef::Distributor && !series.flow_lps.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: format!("series '{}' flow_lps", series.node),
            value: format!("{kind:?}"),
            reason: "distributors carry no external flow".to_string(),
        });
    }
    if series.flow_lps.iter().any(|&v| v < 0.0) {
        return Err(ValidationError::InvalidValue {
            field: format!("series '{}' flow_lps", series.node),
            value: "negative".to_string(),
            reason: "flows are magnitudes; the node kind sets the sign".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            version: LATEST_VERSION,
            name: "t".to_string(),
            settings: SettingsDef {
                steps: 3,
                ..SettingsDef::default()
            },
            nodes: vec![
                NodeDef {
                    id: "F".to_string(),
                    kind: NodeKindDef::Feeder,
                    reference: true,
                    gap_filling: false,
                    x_m: 0.0,
                    y_m: 0.0,
                    elevation_m: 0.0,
                },
                NodeDef {
                    id: "C".to_string(),
                    kind: NodeKindDef::Consumer,
                    reference: false,
                    gap_filling: false,
                    x_m: 10.0,
                    y_m: 0.0,
                    elevation_m: 2.0,
                },
            ],
            pipes: vec![PipeDef {
                id: "1".to_string(),
                from: "F".to_string(),
                to: "C".to_string(),
                length_m: 10.0,
                diameter_mm: 50.0,
                friction: 0.02,
                loss_coefficient: 0.0,
                htc: 0.5,
            }],
            series: vec![SeriesDef {
                node: "C".to_string(),
                flow_lps: vec![0.2, 0.3, 0.25],
                heat_kw: vec![10.0],
                ..SeriesDef::default()
            }],
        }
    }

    #[test]
    fn accepts_valid_project() {
        validate_project(&project()).unwrap();
    }

    #[test]
    fn rejects_unknown_pipe_end() {
        let mut p = project();
        p.pipes[0].to = "X".to_string();
        assert!(matches!(
            validate_project(&p),
            Err(ValidationError::MissingReference { id, .. }) if id == "X"
        ));
    }

    #[test]
    fn rejects_short_series() {
        let mut p = project();
        p.series[0].flow_lps.pop();
        assert_eq!(
            validate_project(&p),
            Err(ValidationError::SeriesLength {
                node: "C".to_string(),
                field: "flow_lps",
                len: 2,
                steps: 3,
            })
        );
    }

    #[test]
    fn rejects_supply_temperature_on_consumer() {
        let mut p = project();
        p.series[0].supply_temp_c = vec![80.0];
        assert!(matches!(
            validate_project(&p),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_node() {
        let mut p = project();
        p.nodes[1].id = "F".to_string();
        assert!(matches!(
            validate_project(&p),
            Err(ValidationError::DuplicateId { .. })
        ));
    }

    #[test]
    fn rejects_future_version() {
        let mut p = project();
        p.version = LATEST_VERSION + 1;
        assert_eq!(
            validate_project(&p),
            Err(ValidationError::UnsupportedVersion {
                version: LATEST_VERSION + 1
            })
        );
    }
}
