//! Integration tests for hn-graph.

use hn_core::units::{m, mm};
use hn_graph::{CouplingMatrix, GraphError, NetworkBuilder, NodeKind, PipeParams};

fn params() -> PipeParams {
    PipeParams::new(m(80.0), mm(65.0))
}

#[test]
fn one_feeder_three_consumers() {
    // F -> D1 -> C1
    //       \-> D2 -> C2
    //            \-> C3
    let mut b = NetworkBuilder::new();
    let f = b.add_node("F", NodeKind::Feeder);
    let d1 = b.add_node("D1", NodeKind::Distributor);
    let d2 = b.add_node("D2", NodeKind::Distributor);
    let c1 = b.add_node("C1", NodeKind::Consumer);
    let c2 = b.add_node("C2", NodeKind::Consumer);
    let c3 = b.add_node("C3", NodeKind::Consumer);
    b.set_reference(f);
    b.add_pipe("P1", f, d1, params());
    b.add_pipe("P2", d1, c1, params());
    b.add_pipe("P3", d1, d2, params());
    b.add_pipe("P4", d2, c2, params());
    b.add_pipe("P5", d2, c3, params());

    let net = b.build().unwrap();
    assert_eq!(net.node_count(), 6);
    assert_eq!(net.pipe_count(), 5);
    assert_eq!(net.reference(), f);

    let cm = CouplingMatrix::from_network(&net);
    assert_eq!(cm.node_count(), 6);
    assert_eq!(cm.pipe_count(), 5);
    // Each column has exactly one +1 and one -1.
    for pipe in net.pipes() {
        let col = cm.column(pipe.id);
        assert_eq!(col.iter().filter(|&&v| v == 1).count(), 1);
        assert_eq!(col.iter().filter(|&&v| v == -1).count(), 1);
        assert_eq!(col.iter().map(|&v| v as i32).sum::<i32>(), 0);
    }
    for c in [c1, c2, c3] {
        assert_eq!(cm.outgoing(c).count(), 0);
        assert_eq!(cm.in_degree(c), 1);
    }
}

#[test]
fn zero_or_two_references_fail_before_solving() {
    let mut b = NetworkBuilder::new();
    let f1 = b.add_node("F1", NodeKind::Feeder);
    let c = b.add_node("C", NodeKind::Consumer);
    b.add_pipe("P1", f1, c, params());
    assert_eq!(b.build().unwrap_err(), GraphError::MissingReference);

    let mut b = NetworkBuilder::new();
    let f1 = b.add_node("F1", NodeKind::Feeder);
    let f2 = b.add_node("F2", NodeKind::Feeder);
    let c = b.add_node("C", NodeKind::Consumer);
    b.set_reference(f1);
    b.set_reference(f2);
    b.add_pipe("P1", f1, c, params());
    b.add_pipe("P2", f2, c, params());
    let err = b.build().unwrap_err();
    assert!(matches!(err, GraphError::MultipleReferences { count: 2, .. }));
    assert!(err.to_string().contains("exactly one"));
}

#[test]
fn duplicate_names_are_rejected() {
    let mut b = NetworkBuilder::new();
    let f = b.add_node("X", NodeKind::Feeder);
    let c = b.add_node("X", NodeKind::Consumer);
    b.set_reference(f);
    b.add_pipe("P1", f, c, params());
    assert!(matches!(b.build(), Err(GraphError::DuplicateName { .. })));
}

#[test]
fn large_chain() {
    let mut b = NetworkBuilder::new();
    let mut nodes = vec![b.add_node("N0", NodeKind::Feeder)];
    b.set_reference(nodes[0]);
    for i in 1..100 {
        nodes.push(b.add_node(format!("N{i}"), NodeKind::Consumer));
    }
    for i in 0..99 {
        b.add_pipe(format!("P{i}"), nodes[i], nodes[i + 1], params());
    }
    let net = b.build().unwrap();
    assert_eq!(net.node_count(), 100);
    assert_eq!(net.pipe_count(), 99);
    assert_eq!(net.node_pipes(nodes[50]).len(), 2);
}
