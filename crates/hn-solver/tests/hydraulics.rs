//! Hydraulic solves on small synthetic networks.

use hn_core::PipeId;
use hn_core::units::{m, mm};
use hn_graph::{CouplingMatrix, Network, NetworkBuilder, NodeKind, PipeParams};
use hn_solver::{
    DirectionSettings, FlowDirection, HydraulicInputs, NewtonSolver, UnknownLayout,
    solve_direction,
};
use proptest::prelude::*;

/// F -> D1 -> C1, D1 -> D2, D2 -> C2, C3 -> D2 (last pipe declared backwards).
fn one_feeder_three_consumers() -> Network {
    let mut b = NetworkBuilder::new();
    let f = b.add_node("F", NodeKind::Feeder);
    let d1 = b.add_node("D1", NodeKind::Distributor);
    let d2 = b.add_node("D2", NodeKind::Distributor);
    let c1 = b.add_node("C1", NodeKind::Consumer);
    let c2 = b.add_node("C2", NodeKind::Consumer);
    let c3 = b.add_node("C3", NodeKind::Consumer);
    b.set_reference(f);
    b.set_elevation(c2, m(8.0));
    b.add_pipe("1", f, d1, PipeParams::new(m(300.0), mm(100.0)));
    b.add_pipe("2", d1, c1, PipeParams::new(m(60.0), mm(40.0)));
    b.add_pipe("3", d1, d2, PipeParams::new(m(150.0), mm(80.0)).with_loss_coefficient(2.0));
    b.add_pipe("4", d2, c2, PipeParams::new(m(45.0), mm(40.0)));
    b.add_pipe("5", c3, d2, PipeParams::new(m(70.0), mm(32.0)));
    b.build().unwrap()
}

fn inputs(consumers: [f64; 3]) -> HydraulicInputs {
    HydraulicInputs {
        external_flows: vec![0.0, 0.0, 0.0, -consumers[0], -consumers[1], -consumers[2]],
        reference_pressure: 6.0e5,
        rho: 977.6,
        gravity: 9.81,
    }
}

fn solve(net: &Network, inputs: &HydraulicInputs) -> hn_solver::HydraulicSolution {
    let cm = CouplingMatrix::from_network(net);
    let layout = UnknownLayout::new(net);
    let seed = layout.seed(0.1, inputs.reference_pressure, 0.0, &inputs.external_flows);
    solve_direction(
        FlowDirection::Forerun,
        net,
        &cm,
        inputs,
        &seed,
        &NewtonSolver::default(),
        &DirectionSettings::default(),
    )
    .unwrap()
}

fn assert_mass_conserved(net: &Network, sol: &hn_solver::HydraulicSolution) {
    for node in net.nodes() {
        let balance: f64 = sol
            .coupling
            .row(node.id)
            .map(|(p, s)| f64::from(s) * sol.mass_flows[p.idx()])
            .sum();
        let ext = sol.external_flows[node.id.idx()];
        assert!(
            (balance - ext).abs() < 1e-8,
            "node {} unbalanced: {balance} vs {ext}",
            node.name
        );
    }
}

#[test]
fn tree_flows_follow_consumers() {
    let net = one_feeder_three_consumers();
    let sol = solve(&net, &inputs([0.4, 0.3, 0.2]));

    println!("flows = {:?}", sol.mass_flows);
    println!("pressures = {:?}", sol.pressures);

    assert!(sol.converged);
    assert_mass_conserved(&net, &sol);
    assert!((sol.mass_flows[0] - 0.9).abs() < 1e-9);
    assert!((sol.mass_flows[2] - 0.5).abs() < 1e-9);
    assert!((sol.mass_flows[4] - 0.2).abs() < 1e-9);
    assert!((sol.external_flows[0] - 0.9).abs() < 1e-9);

    // Only the backwards-declared pipe changed orientation.
    assert_eq!(sol.flipped, vec![PipeId::from_index(4)]);
    assert_eq!(sol.coupling.end(PipeId::from_index(4)).idx(), 5);

    // Pressure falls along the flow; C2 also sits 8 m higher.
    assert!(sol.pressures[1] < sol.pressures[0]);
    assert!(sol.pressures[4] < sol.pressures[2] - 977.6 * 9.81 * 8.0 + 1.0);
}

#[test]
fn resolving_converged_state_is_idempotent() {
    let net = one_feeder_three_consumers();
    let inputs = inputs([0.25, 0.5, 0.1]);
    let first = solve(&net, &inputs);

    let layout = UnknownLayout::new(&net);
    let again = solve_direction(
        FlowDirection::Forerun,
        &net,
        &first.coupling,
        &inputs,
        &first.unknowns,
        &NewtonSolver::default(),
        &DirectionSettings::default(),
    )
    .unwrap();

    assert_eq!(again.corrections, 0);
    assert!(again.flipped.is_empty());
    for (a, b) in first.unknowns.iter().zip(again.unknowns.iter()) {
        assert!((a - b).abs() <= 1e-9 * (1.0 + a.abs()), "{a} vs {b}");
    }
    assert_eq!(layout.len(), again.unknowns.len());
}

#[test]
fn zero_demand_branch_carries_no_flow() {
    let net = one_feeder_three_consumers();
    let sol = solve(&net, &inputs([0.4, 0.0, 0.0]));
    assert_mass_conserved(&net, &sol);
    assert!(sol.mass_flows[3].abs() < 1e-9);
    assert!(sol.mass_flows.iter().all(|&m| m >= -1e-10));
}

#[test]
fn return_direction_is_mirror_of_forerun() {
    let net = one_feeder_three_consumers();
    let fwd = inputs([0.4, 0.3, 0.2]);
    let ret = HydraulicInputs {
        external_flows: fwd.external_flows.iter().map(|m| -m).collect(),
        reference_pressure: 2.0e5,
        ..fwd.clone()
    };
    let forerun = solve(&net, &fwd);

    let start = forerun.coupling.negated();
    let layout = UnknownLayout::new(&net);
    let seed = layout.seed(0.1, ret.reference_pressure, 0.0, &ret.external_flows);
    let sol = solve_direction(
        FlowDirection::Return,
        &net,
        &start,
        &ret,
        &seed,
        &NewtonSolver::default(),
        &DirectionSettings::default(),
    )
    .unwrap();

    assert!(sol.flipped.is_empty());
    assert_mass_conserved(&net, &sol);
    assert!((sol.external_flows[0] + 0.9).abs() < 1e-9);
    for (a, b) in forerun.mass_flows.iter().zip(&sol.mass_flows) {
        assert!((a - b).abs() < 1e-9);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn mass_is_conserved_for_any_demand(
        a in 0.0f64..3.0,
        b in 0.0f64..3.0,
        c in 0.0f64..3.0,
    ) {
        let net = one_feeder_three_consumers();
        let sol = solve(&net, &inputs([a, b, c]));
        assert_mass_conserved(&net, &sol);
        prop_assert!(sol.mass_flows.iter().all(|&m| m >= -1e-10));
        prop_assert!((sol.external_flows[0] - (a + b + c)).abs() < 1e-8);
    }
}
