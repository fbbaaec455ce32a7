//! Topological temperature propagation over the flow-oriented network.
//!
//! Within one thermal substep a node can be resolved once every pipe flowing
//! into it has been advanced, and a pipe can be advanced once its upstream node
//! is resolved. With the coupling matrix oriented along the solved flows this
//! is a Kahn ordering of the induced DAG; it is computed once per hydraulic
//! step and replayed for every substep.

use std::collections::VecDeque;

use hn_core::{NodeId, WaterProperties, weighted_mean};
use hn_graph::{CouplingMatrix, Network, Node};
use hn_solver::FlowDirection;

use crate::error::{SimError, SimResult};
use crate::segments::PipeGrid;
use crate::thermal::advance_segments;

/// Kahn ordering of the nodes, or the nodes that never became ready.
pub fn topological_order(coupling: &CouplingMatrix) -> Result<Vec<NodeId>, Vec<NodeId>> {
    let n = coupling.node_count();
    let mut pending: Vec<usize> = (0..n)
        .map(|i| coupling.in_degree(NodeId::from_index(i as u32)))
        .collect();
    let mut ready: VecDeque<NodeId> = (0..n)
        .filter(|&i| pending[i] == 0)
        .map(|i| NodeId::from_index(i as u32))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(node) = ready.pop_front() {
        order.push(node);
        for pipe in coupling.outgoing(node) {
            let end = coupling.end(pipe).idx();
            pending[end] -= 1;
            if pending[end] == 0 {
                ready.push_back(coupling.end(pipe));
            }
        }
    }

    if order.len() == n {
        Ok(order)
    } else {
        Err((0..n)
            .filter(|&i| pending[i] > 0)
            .map(|i| NodeId::from_index(i as u32))
            .collect())
    }
}

/// [`topological_order`] with the unresolved nodes reported as a deadlock.
pub fn propagation_order(
    direction: FlowDirection,
    network: &Network,
    coupling: &CouplingMatrix,
) -> SimResult<Vec<NodeId>> {
    topological_order(coupling).map_err(|stuck| SimError::Deadlock {
        direction: direction.label(),
        nodes: stuck
            .into_iter()
            .map(|n| network.node_name(n).to_string())
            .collect(),
    })
}

/// Hydraulic state a substep propagates through.
pub struct FlowField<'a> {
    pub coupling: &'a CouplingMatrix,
    pub mass_flows: &'a [f64],
}

/// Pipe grids and medium shared by every substep.
pub struct ThermalContext<'a> {
    pub grids: &'a [PipeGrid],
    pub water: &'a WaterProperties,
    pub soil: f64,
    pub dt: f64,
}

/// Run one substep in `order`.
///
/// `node_rule` receives the node and its inflowing `(mass flow, outlet
/// temperature)` streams and returns the node temperature. Returns the number
/// of pipes advanced.
pub fn propagate_substep<F>(
    order: &[NodeId],
    flow: &FlowField<'_>,
    ctx: &ThermalContext<'_>,
    segments: &mut [Vec<f64>],
    node_temps: &mut [f64],
    mut node_rule: F,
) -> SimResult<usize>
where
    F: FnMut(NodeId, &[(f64, f64)]) -> SimResult<f64>,
{
    let mut streams = Vec::new();
    let mut advanced = 0;

    for &node in order {
        streams.clear();
        streams.extend(flow.coupling.incoming(node).map(|p| {
            let outlet = segments[p.idx()].last().copied().unwrap_or(ctx.soil);
            (flow.mass_flows[p.idx()], outlet)
        }));

        let temp = node_rule(node, &streams)?;
        node_temps[node.idx()] = temp;

        for pipe in flow.coupling.outgoing(node) {
            advance_segments(
                &mut segments[pipe.idx()],
                temp,
                flow.mass_flows[pipe.idx()],
                &ctx.grids[pipe.idx()],
                ctx.water,
                ctx.soil,
                ctx.dt,
            );
            advanced += 1;
        }
    }

    Ok(advanced)
}

/// A substep must advance every pipe exactly once.
pub fn check_sweep(direction: FlowDirection, advanced: usize, pipes: usize) -> SimResult<()> {
    if advanced == pipes {
        Ok(())
    } else {
        Err(SimError::IncompleteSweep {
            direction: direction.label(),
            advanced,
            pipes,
        })
    }
}

/// Forerun temperature of a node.
///
/// Sources take the supply temperature if they are feeders and keep their
/// previous value otherwise. Other nodes mix their inflows, adding a feeder's
/// own injection; a zero total flow keeps the previous value.
pub fn forerun_temperature(
    node: &Node,
    external_flow: f64,
    supply_temp: Option<f64>,
    streams: &[(f64, f64)],
    previous: f64,
) -> f64 {
    if streams.is_empty() {
        return match (node.is_feeder(), supply_temp) {
            (true, Some(t)) => t,
            _ => previous,
        };
    }
    let injection = match (node.is_feeder(), supply_temp) {
        (true, Some(t)) if external_flow > 0.0 => Some((external_flow, t)),
        _ => None,
    };
    weighted_mean(streams.iter().copied().chain(injection)).unwrap_or(previous)
}

/// Return temperature leaving a consumer: `T_f − Q/(ṁ·c_p)`, never below soil.
///
/// The flag is set when the soil bound was applied.
pub fn consumer_return_temperature(
    forerun_temp: f64,
    heat_w: f64,
    mass_flow: f64,
    cp: f64,
    soil: f64,
) -> (f64, bool) {
    let t = forerun_temp - heat_w / (mass_flow * cp);
    if t < soil { (soil, true) } else { (t, false) }
}

/// Node state the return rule needs beyond its inflows.
#[derive(Clone, Copy, Debug)]
pub struct ReturnNodeInput {
    /// External return mass flow (kg/s); positive where a consumer feeds back.
    pub external_flow: f64,
    /// Heat drawn by the consumer (W).
    pub heat_w: f64,
    /// Forerun temperature of the node in this substep.
    pub forerun_temp: f64,
    /// Forerun and return temperature of the previous substep, `None` during the first hydraulic step.
    pub history: Option<(f64, f64)>,
    pub previous: f64,
}

/// Outcome of the return rule for one node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReturnTemperature {
    pub temp: f64,
    /// The consumer energy balance hit the soil bound.
    pub clipped: bool,
    /// A stagnant source carried the previous forerun/return difference forward.
    pub stagnant: bool,
}

/// Return temperature of a node.
///
/// * A feeder with positive return flow means flow reversed into it: fatal.
/// * A source with zero flow carries the previous forerun/return difference.
/// * A consumer source applies its energy balance.
/// * Other nodes mix their inflows, plus a consumer's own return.
pub fn return_temperature(
    node: &Node,
    input: &ReturnNodeInput,
    streams: &[(f64, f64)],
    cp: f64,
    soil: f64,
) -> SimResult<ReturnTemperature> {
    if node.is_feeder() && input.external_flow > 0.0 {
        return Err(SimError::ReversedFeederFlow {
            node: node.name.clone(),
        });
    }

    let own = if input.external_flow > 0.0 {
        let (t, clipped) = consumer_return_temperature(
            input.forerun_temp,
            input.heat_w,
            input.external_flow,
            cp,
            soil,
        );
        Some((input.external_flow, t, clipped))
    } else {
        None
    };
    let clipped = own.is_some_and(|(_, _, c)| c);

    if streams.is_empty() {
        return Ok(match own {
            Some((_, temp, _)) => ReturnTemperature {
                temp,
                clipped,
                stagnant: false,
            },
            None => ReturnTemperature {
                temp: match input.history {
                    Some((fwd, ret)) => input.forerun_temp - (fwd - ret),
                    None => input.forerun_temp,
                },
                clipped: false,
                stagnant: true,
            },
        });
    }

    let mixed = streams
        .iter()
        .copied()
        .chain(own.map(|(m, t, _)| (m, t)));
    Ok(ReturnTemperature {
        temp: weighted_mean(mixed).unwrap_or(input.previous),
        clipped,
        stagnant: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_core::units::{m, mm};
    use hn_graph::{NetworkBuilder, NodeKind, PipeParams};
    use proptest::prelude::*;

    fn node(kind: NodeKind) -> Node {
        let mut b = NetworkBuilder::new();
        let f = b.add_node("F", NodeKind::Feeder);
        let n = b.add_node("N", kind);
        b.set_reference(f);
        b.add_pipe("1", f, n, PipeParams::new(m(10.0), mm(50.0)));
        b.build().unwrap().nodes()[1].clone()
    }

    fn input(external_flow: f64) -> ReturnNodeInput {
        ReturnNodeInput {
            external_flow,
            heat_w: 0.0,
            forerun_temp: 70.0,
            history: None,
            previous: 45.0,
        }
    }

    #[test]
    fn directed_cycle_is_reported() {
        let mut b = NetworkBuilder::new();
        let a = b.add_node("A", NodeKind::Feeder);
        let x = b.add_node("X", NodeKind::Distributor);
        let y = b.add_node("Y", NodeKind::Consumer);
        b.set_reference(a);
        let p = PipeParams::new(m(10.0), mm(50.0));
        b.add_pipe("1", a, x, p);
        b.add_pipe("2", x, y, p);
        let net = b.build().unwrap();

        let looped = CouplingMatrix::from_pipe_ends(3, &[(a, x), (x, y), (y, x)]);
        let err = propagation_order(FlowDirection::Forerun, &net, &looped).unwrap_err();
        assert_eq!(
            err,
            SimError::Deadlock {
                direction: "forerun",
                nodes: vec!["X".to_string(), "Y".to_string()],
            }
        );
    }

    #[test]
    fn order_starts_at_sources() {
        let mut b = NetworkBuilder::new();
        let f = b.add_node("F", NodeKind::Feeder);
        let c = b.add_node("C", NodeKind::Consumer);
        let d = b.add_node("D", NodeKind::Distributor);
        b.set_reference(f);
        let p = PipeParams::new(m(10.0), mm(50.0));
        b.add_pipe("1", d, c, p);
        b.add_pipe("2", f, d, p);
        let net = b.build().unwrap();
        let order = propagation_order(
            FlowDirection::Forerun,
            &net,
            &CouplingMatrix::from_network(&net),
        )
        .unwrap();
        assert_eq!(order, vec![f, d, c]);
    }

    #[test]
    fn substep_visits_every_node_and_pipe_once() {
        // F -> D branches to C1 and C2; the return side merges at D.
        let mut b = NetworkBuilder::new();
        let f = b.add_node("F", NodeKind::Feeder);
        let d = b.add_node("D", NodeKind::Distributor);
        let c1 = b.add_node("C1", NodeKind::Consumer);
        let c2 = b.add_node("C2", NodeKind::Consumer);
        b.set_reference(f);
        let p = PipeParams::new(m(25.0), mm(50.0));
        b.add_pipe("1", f, d, p);
        b.add_pipe("2", d, c1, p);
        b.add_pipe("3", d, c2, p);
        let net = b.build().unwrap();

        let grids = crate::segments::grids(&net, 10.0);
        let water = WaterProperties::default();
        let ctx = ThermalContext {
            grids: &grids,
            water: &water,
            soil: 8.0,
            dt: 10.0,
        };
        let mass_flows = [1.0, 0.6, 0.4];
        let forerun = CouplingMatrix::from_network(&net);

        for (direction, coupling) in [
            (FlowDirection::Forerun, forerun.clone()),
            (FlowDirection::Return, forerun.negated()),
        ] {
            let order = propagation_order(direction, &net, &coupling).unwrap();
            let flow = FlowField {
                coupling: &coupling,
                mass_flows: &mass_flows,
            };
            let mut segments: Vec<Vec<f64>> = grids.iter().map(|g| vec![8.0; g.count]).collect();
            let mut temps = vec![8.0; net.node_count()];
            let mut visits = vec![0usize; net.node_count()];

            let advanced = propagate_substep(&order, &flow, &ctx, &mut segments, &mut temps, |n, _| {
                visits[n.idx()] += 1;
                Ok(60.0)
            })
            .unwrap();

            assert_eq!(advanced, net.pipe_count());
            assert!(visits.iter().all(|&v| v == 1), "{direction}: {visits:?}");
            check_sweep(direction, advanced, net.pipe_count()).unwrap();
        }
    }

    #[test]
    fn short_sweep_is_reported() {
        assert_eq!(
            check_sweep(FlowDirection::Return, 2, 3),
            Err(SimError::IncompleteSweep {
                direction: "return",
                advanced: 2,
                pipes: 3,
            })
        );
    }

    #[test]
    fn feeder_source_takes_supply_temperature() {
        let f = node(NodeKind::Feeder);
        assert_eq!(forerun_temperature(&f, 1.0, Some(85.0), &[], 20.0), 85.0);
        let d = node(NodeKind::Distributor);
        assert_eq!(forerun_temperature(&d, 0.0, None, &[], 20.0), 20.0);
    }

    #[test]
    fn feeder_with_inflow_mixes_its_injection() {
        let f = node(NodeKind::Feeder);
        let t = forerun_temperature(&f, 1.0, Some(90.0), &[(3.0, 70.0)], 0.0);
        assert!((t - 75.0).abs() < 1e-12);
    }

    #[test]
    fn zero_inflow_keeps_previous_value() {
        let d = node(NodeKind::Distributor);
        assert_eq!(forerun_temperature(&d, 0.0, None, &[(0.0, 80.0)], 42.0), 42.0);
        let r = return_temperature(&d, &input(0.0), &[(0.0, 30.0)], 4190.0, 8.0).unwrap();
        assert_eq!(r.temp, 45.0);
    }

    #[test]
    fn stagnant_return_source_keeps_previous_difference() {
        let c = node(NodeKind::Consumer);
        let first = return_temperature(&c, &input(0.0), &[], 4190.0, 8.0).unwrap();
        assert_eq!(first.temp, 70.0);
        assert!(first.stagnant);

        let later = ReturnNodeInput {
            history: Some((68.0, 40.0)),
            ..input(0.0)
        };
        let r = return_temperature(&c, &later, &[], 4190.0, 8.0).unwrap();
        assert!((r.temp - 42.0).abs() < 1e-12);
    }

    #[test]
    fn consumer_energy_balance() {
        let c = node(NodeKind::Consumer);
        let consumer = ReturnNodeInput {
            heat_w: 0.5 * 4190.0 * 25.0,
            ..input(0.5)
        };
        let r = return_temperature(&c, &consumer, &[], 4190.0, 8.0).unwrap();
        assert!((r.temp - 45.0).abs() < 1e-9);
        assert!(!r.clipped);

        // Mixed with a downstream branch.
        let r = return_temperature(&c, &consumer, &[(1.5, 35.0)], 4190.0, 8.0).unwrap();
        assert!((r.temp - 37.5).abs() < 1e-9);
    }

    #[test]
    fn reversed_feeder_flow_is_fatal() {
        let f = node(NodeKind::Feeder);
        let err = return_temperature(&f, &input(0.2), &[], 4190.0, 8.0).unwrap_err();
        assert_eq!(
            err,
            SimError::ReversedFeederFlow {
                node: "N".to_string()
            }
        );
    }

    proptest! {
        #[test]
        fn energy_balance_is_clipped_at_soil(
            forerun in 40.0f64..110.0,
            heat in 0.0f64..500_000.0,
            flow in 0.01f64..20.0,
            soil in -5.0f64..25.0,
        ) {
            let cp = 4190.0;
            let (t, clipped) = consumer_return_temperature(forerun, heat, flow, cp, soil);
            let raw = forerun - heat / (flow * cp);
            if raw < soil {
                prop_assert!(clipped);
                prop_assert_eq!(t, soil);
            } else {
                prop_assert!(!clipped);
                prop_assert_eq!(t, raw);
            }
        }

        #[test]
        fn mixing_stays_within_inflow_range(
            streams in proptest::collection::vec((0.001f64..10.0, 10.0f64..100.0), 1..6),
        ) {
            let d = node(NodeKind::Distributor);
            let t = forerun_temperature(&d, 0.0, None, &streams, 0.0);
            let lo = streams.iter().map(|s| s.1).fold(f64::INFINITY, f64::min);
            let hi = streams.iter().map(|s| s.1).fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(t >= lo - 1e-9 && t <= hi + 1e-9);
        }
    }
}
