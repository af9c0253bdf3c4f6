use super::graph::Graph;
use super::node::{NodeId, NodeKind, Probability};

// Short-circuit boolean combinators. Every node produced here goes through
// `Graph::unique`, so equal conditions built twice are the same node.

pub fn negate(graph: &mut Graph, condition: NodeId) -> NodeId {
    if graph.kind(condition) == NodeKind::LogicNegation {
        return graph.node(condition).inputs()[0];
    }

    graph.unique(NodeKind::LogicNegation, vec![condition])
}

pub fn or(graph: &mut Graph, a: NodeId, b: NodeId, short_circuit_probability: f64) -> NodeId {
    or_negated(graph, a, false, b, false, short_circuit_probability)
}

pub fn or_negated(
    graph: &mut Graph,
    a: NodeId,
    negate_a: bool,
    b: NodeId,
    negate_b: bool,
    short_circuit_probability: f64,
) -> NodeId {
    let kind = NodeKind::ShortCircuitOr {
        negate_x: negate_a,
        negate_y: negate_b,
        probability: Probability::new(short_circuit_probability),
    };

    graph.unique(kind, vec![a, b])
}

pub fn and(graph: &mut Graph, a: NodeId, b: NodeId, short_circuit_probability: f64) -> NodeId {
    and_negated(graph, a, false, b, false, short_circuit_probability)
}

/// `a && b` is built as `!(!a || !b)`.
pub fn and_negated(
    graph: &mut Graph,
    a: NodeId,
    negate_a: bool,
    b: NodeId,
    negate_b: bool,
    short_circuit_probability: f64,
) -> NodeId {
    let not_a_or_not_b = or_negated(
        graph,
        a,
        !negate_a,
        b,
        !negate_b,
        short_circuit_probability,
    );

    negate(graph, not_a_or_not_b)
}
