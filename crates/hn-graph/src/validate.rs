//! Load-time network validation.

use std::collections::HashSet;

use hn_core::NodeId;

use crate::error::{GraphError, GraphResult};
use crate::graph::{Node, Pipe};

/// Validate references, names and geometry.
pub(crate) fn validate_structure(nodes: &[Node], pipes: &[Pipe]) -> GraphResult<()> {
    let mut names = HashSet::new();
    for node in nodes {
        if !names.insert(node.name.as_str()) {
            return Err(GraphError::DuplicateName {
                name: node.name.clone(),
                what: "nodes",
            });
        }
        check_finite(&node.name, "elevation", node.elevation.value)?;
    }

    let mut names = HashSet::new();
    for pipe in pipes {
        if !names.insert(pipe.name.as_str()) {
            return Err(GraphError::DuplicateName {
                name: pipe.name.clone(),
                what: "pipes",
            });
        }
        for end in [pipe.from, pipe.to] {
            if end.idx() >= nodes.len() {
                return Err(GraphError::InvalidNodeRef {
                    pipe_name: pipe.name.clone(),
                    node: end,
                });
            }
        }
        if pipe.from == pipe.to {
            return Err(GraphError::SelfLoop {
                name: pipe.name.clone(),
            });
        }

        let p = &pipe.params;
        check_positive(&pipe.name, "length", p.length.value)?;
        check_positive(&pipe.name, "diameter", p.diameter.value)?;
        check_non_negative(&pipe.name, "friction coefficient", p.friction)?;
        check_non_negative(&pipe.name, "loss coefficient", p.loss_coefficient)?;
        check_non_negative(&pipe.name, "heat-transfer coefficient", p.htc)?;
    }

    Ok(())
}

/// Exactly one node must carry the reference pressure, and it must be a feeder.
pub(crate) fn validate_reference(nodes: &[Node]) -> GraphResult<NodeId> {
    let refs: Vec<&Node> = nodes.iter().filter(|n| n.is_reference).collect();
    match refs.as_slice() {
        [] => Err(GraphError::MissingReference),
        [node] if !node.is_feeder() => Err(GraphError::ReferenceNotFeeder {
            name: node.name.clone(),
        }),
        [node] => Ok(node.id),
        many => Err(GraphError::MultipleReferences {
            count: many.len(),
            names: many.iter().map(|n| n.name.clone()).collect(),
        }),
    }
}

/// At most one node may close the flow balance of gap-filled data.
pub(crate) fn validate_gap_filling(nodes: &[Node]) -> GraphResult<Option<NodeId>> {
    let flagged: Vec<&Node> = nodes.iter().filter(|n| n.is_gap_filling).collect();
    match flagged.as_slice() {
        [] => Ok(None),
        [node] => Ok(Some(node.id)),
        many => Err(GraphError::MultipleGapFillingNodes {
            count: many.len(),
            names: many.iter().map(|n| n.name.clone()).collect(),
        }),
    }
}

/// The undirected topology must be a single tree: no loops, everything
/// reachable from the reference node.
pub(crate) fn validate_tree(nodes: &[Node], pipes: &[Pipe], reference: NodeId) -> GraphResult<()> {
    let mut sets = DisjointSets::new(nodes.len());
    for pipe in pipes {
        if !sets.union(pipe.from.idx(), pipe.to.idx()) {
            return Err(GraphError::MeshedTopology {
                name: pipe.name.clone(),
                pipe: pipe.id,
            });
        }
    }

    let root = sets.find(reference.idx());
    for node in nodes {
        if sets.find(node.id.idx()) != root {
            return Err(GraphError::Disconnected {
                name: node.name.clone(),
                node: node.id,
            });
        }
    }
    Ok(())
}

fn check_finite(name: &str, field: &'static str, value: f64) -> GraphResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(name, field, value))
    }
}

fn check_positive(name: &str, field: &'static str, value: f64) -> GraphResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, field, value))
    }
}

fn check_non_negative(name: &str, field: &'static str, value: f64) -> GraphResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(name, field, value))
    }
}

fn invalid(name: &str, field: &'static str, value: f64) -> GraphError {
    GraphError::InvalidValue {
        name: name.to_string(),
        field,
        value,
    }
}

/// Union-find with path halving.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Returns false if `a` and `b` were already connected.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent[rb] = ra;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, PipeParams};
    use hn_core::Id;
    use hn_core::units::{m, mm};

    fn node(i: u32, kind: NodeKind, is_reference: bool) -> Node {
        Node {
            id: Id::from_index(i),
            name: format!("N{i}"),
            kind,
            position: (0.0, 0.0),
            elevation: m(0.0),
            is_reference,
            is_gap_filling: false,
        }
    }

    fn pipe(i: u32, from: u32, to: u32) -> Pipe {
        Pipe {
            id: Id::from_index(i),
            name: format!("P{i}"),
            from: Id::from_index(from),
            to: Id::from_index(to),
            params: PipeParams::new(m(10.0), mm(50.0)),
        }
    }

    #[test]
    fn validate_empty_network_structure() {
        assert!(validate_structure(&[], &[]).is_ok());
    }

    #[test]
    fn reference_must_be_unique() {
        let nodes = vec![
            node(0, NodeKind::Feeder, true),
            node(1, NodeKind::Feeder, true),
        ];
        assert!(matches!(
            validate_reference(&nodes),
            Err(GraphError::MultipleReferences { count: 2, .. })
        ));
    }

    #[test]
    fn gap_filling_node_is_optional_but_unique() {
        let mut nodes = vec![
            node(0, NodeKind::Feeder, true),
            node(1, NodeKind::Consumer, false),
            node(2, NodeKind::Consumer, false),
        ];
        assert_eq!(validate_gap_filling(&nodes), Ok(None));

        nodes[1].is_gap_filling = true;
        assert_eq!(validate_gap_filling(&nodes), Ok(Some(Id::from_index(1))));

        nodes[2].is_gap_filling = true;
        assert_eq!(
            validate_gap_filling(&nodes),
            Err(GraphError::MultipleGapFillingNodes {
                count: 2,
                names: vec!["N1".to_string(), "N2".to_string()],
            })
        );
    }

    #[test]
    fn reference_must_be_feeder() {
        let nodes = vec![node(0, NodeKind::Consumer, true)];
        assert!(matches!(
            validate_reference(&nodes),
            Err(GraphError::ReferenceNotFeeder { .. })
        ));
    }

    #[test]
    fn loop_is_rejected() {
        let nodes = vec![
            node(0, NodeKind::Feeder, true),
            node(1, NodeKind::Distributor, false),
            node(2, NodeKind::Consumer, false),
        ];
        let pipes = vec![pipe(0, 0, 1), pipe(1, 1, 2), pipe(2, 2, 0)];
        let err = validate_tree(&nodes, &pipes, Id::from_index(0)).unwrap_err();
        assert!(matches!(err, GraphError::MeshedTopology { ref name, .. } if name == "P2"));
    }

    #[test]
    fn parallel_pipes_form_a_loop() {
        let nodes = vec![
            node(0, NodeKind::Feeder, true),
            node(1, NodeKind::Consumer, false),
        ];
        let pipes = vec![pipe(0, 0, 1), pipe(1, 0, 1)];
        assert!(validate_tree(&nodes, &pipes, Id::from_index(0)).is_err());
    }

    #[test]
    fn island_is_rejected() {
        let nodes = vec![
            node(0, NodeKind::Feeder, true),
            node(1, NodeKind::Consumer, false),
            node(2, NodeKind::Consumer, false),
        ];
        let pipes = vec![pipe(0, 0, 1)];
        let err = validate_tree(&nodes, &pipes, Id::from_index(0)).unwrap_err();
        assert!(matches!(err, GraphError::Disconnected { ref name, .. } if name == "N2"));
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let nodes = vec![
            node(0, NodeKind::Feeder, true),
            node(1, NodeKind::Consumer, false),
        ];
        let mut p = pipe(0, 0, 1);
        p.params.diameter = m(0.0);
        assert!(matches!(
            validate_structure(&nodes, &[p]),
            Err(GraphError::InvalidValue { field: "diameter", .. })
        ));
        assert!(matches!(
            validate_structure(&nodes, &[pipe(0, 1, 1)]),
            Err(GraphError::SelfLoop { .. })
        ));
        assert!(matches!(
            validate_structure(&nodes, &[pipe(0, 0, 7)]),
            Err(GraphError::InvalidNodeRef { .. })
        ));
    }
}
