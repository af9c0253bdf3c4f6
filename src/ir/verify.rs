use super::graph::Graph;
use super::node::{NodeId, NodeKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("{node} uses deleted node {input}")]
    DeadReference { node: NodeId, input: NodeId },
    #[error("usages of {input} disagree with the edges from {node}")]
    UsageMismatch { node: NodeId, input: NodeId },
    #[error("fixed node {0} is not reachable through control flow")]
    Unlinked(NodeId),
    #[error("{0} does not continue control flow")]
    MissingNext(NodeId),
    #[error("{node} lists {successor} as successor but it is not linked back")]
    BrokenControlEdge { node: NodeId, successor: NodeId },
    #[error("floating node {0} carries control edges")]
    FloatingWithControl(NodeId),
    #[error("{0} has no merge as first input")]
    PhiWithoutMerge(NodeId),
    #[error("{phi} at {merge} has {found} values, expected {expected}")]
    PhiArity {
        phi: NodeId,
        merge: NodeId,
        expected: usize,
        found: usize,
    },
    #[error("{0} is not attached to a loop exit")]
    ProxyWithoutExit(NodeId),
    #[error("{0} was not lowered")]
    UnloweredGuard(NodeId),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Loop phis may still lack their backedge values.
    pub allow_open_loop_phis: bool,
    pub allow_guards: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            allow_open_loop_phis: false,
            allow_guards: true,
        }
    }
}

pub fn verify(graph: &Graph) -> Result<(), VerifyError> {
    verify_with(graph, VerifyOptions::default())
}

pub fn verify_with(graph: &Graph, options: VerifyOptions) -> Result<(), VerifyError> {
    for node in graph.node_ids() {
        verify_edges(graph, node)?;

        if graph.kind(node).is_fixed() {
            verify_control(graph, node)?;
        } else {
            verify_floating(graph, node, options)?;
        }
    }

    Ok(())
}

fn verify_edges(graph: &Graph, id: NodeId) -> Result<(), VerifyError> {
    let node = graph.node(id);

    for input in node.inputs().iter().chain(node.dependencies().iter()) {
        if !graph.is_alive(*input) {
            return Err(VerifyError::DeadReference { node: id, input: *input });
        }

        let edges = node
            .inputs()
            .iter()
            .chain(node.dependencies().iter())
            .filter(|other| *other == input)
            .count();
        let usages = graph
            .node(*input)
            .usages()
            .iter()
            .filter(|user| **user == id)
            .count();

        if edges != usages {
            return Err(VerifyError::UsageMismatch { node: id, input: *input });
        }
    }

    for user in node.usages().iter() {
        let listed = graph.is_alive(*user) && {
            let user_node = graph.node(*user);

            user_node.inputs().contains(&id) || user_node.dependencies().contains(&id)
        };

        if !listed {
            return Err(VerifyError::UsageMismatch { node: *user, input: id });
        }
    }

    Ok(())
}

fn verify_control(graph: &Graph, id: NodeId) -> Result<(), VerifyError> {
    let node = graph.node(id);
    let kind = graph.kind(id);

    let linked = match kind {
        NodeKind::Start => true,
        kind if kind.is_merge() => node.predecessor().is_none() && !node.inputs().is_empty(),
        _ => node.predecessor().is_some(),
    };

    if !linked {
        return Err(VerifyError::Unlinked(id));
    }

    if kind.is_fixed_with_next() && node.next().is_none() {
        return Err(VerifyError::MissingNext(id));
    }

    if kind.is_control_split() && node.successors().len() != 2 {
        return Err(VerifyError::MissingNext(id));
    }

    for successor in node.successors().iter() {
        if !graph.is_alive(*successor) || graph.node(*successor).predecessor() != Some(id) {
            return Err(VerifyError::BrokenControlEdge {
                node: id,
                successor: *successor,
            });
        }
    }

    Ok(())
}

fn verify_floating(graph: &Graph, id: NodeId, options: VerifyOptions) -> Result<(), VerifyError> {
    let node = graph.node(id);

    if node.predecessor().is_some() || !node.successors().is_empty() {
        return Err(VerifyError::FloatingWithControl(id));
    }

    match graph.kind(id) {
        NodeKind::Phi { .. } => verify_phi(graph, id, options),
        NodeKind::ValueProxy { .. } => match node.inputs().get(1) {
            Some(exit) if graph.kind(*exit) == NodeKind::LoopExit => Ok(()),
            _ => Err(VerifyError::ProxyWithoutExit(id)),
        },
        NodeKind::Guard { .. } if !options.allow_guards => Err(VerifyError::UnloweredGuard(id)),
        _ => Ok(()),
    }
}

fn verify_phi(graph: &Graph, phi: NodeId, options: VerifyOptions) -> Result<(), VerifyError> {
    let merge = match graph.node(phi).inputs().first() {
        Some(merge) if graph.kind(*merge).is_merge() => *merge,
        _ => return Err(VerifyError::PhiWithoutMerge(phi)),
    };
    let found = graph.phi_values(phi).len();

    let expected = match graph.kind(merge) {
        NodeKind::LoopBegin => {
            let closed = 1 + graph.loop_ends(merge).len();

            if options.allow_open_loop_phis && found == 1 {
                1
            } else {
                closed
            }
        }
        _ => graph.forward_ends(merge).len(),
    };

    if found != expected {
        return Err(VerifyError::PhiArity {
            phi,
            merge,
            expected,
            found,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::graph_builder::GraphBuilder;
    use crate::ir::node::{DeoptAction, DeoptReason, PhiType};

    fn branching_graph() -> (Graph, NodeId) {
        let mut builder = GraphBuilder::new();
        let p = builder.parameter();
        let c = builder.is_null(p);

        builder.begin_if(c);
        builder.invoke();
        builder.end_if();

        let graph = builder.build();
        let merge = graph
            .node_ids()
            .find(|n| graph.kind(*n) == NodeKind::Merge)
            .unwrap();

        (graph, merge)
    }

    fn loop_graph() -> (Graph, NodeId) {
        let mut builder = GraphBuilder::new();
        let p = builder.parameter();
        let c = builder.is_null(p);

        builder.begin_while(c);
        builder.invoke();
        builder.end_while();

        let graph = builder.build();
        let header = graph
            .node_ids()
            .find(|n| graph.kind(*n) == NodeKind::LoopBegin)
            .unwrap();

        (graph, header)
    }

    #[test]
    fn built_graphs_verify() {
        assert_eq!(verify(&branching_graph().0), Ok(()));
        assert_eq!(verify(&loop_graph().0), Ok(()));
    }

    #[test]
    fn merge_phi_arity() {
        let (mut graph, merge) = branching_graph();
        let start = graph.start();
        let phi = graph.add_phi(PhiType::Memory, merge, vec![start]);

        assert_eq!(
            verify(&graph),
            Err(VerifyError::PhiArity {
                phi,
                merge,
                expected: 2,
                found: 1
            })
        );

        graph.add_phi_input(phi, start);

        assert_eq!(verify(&graph), Ok(()));
    }

    #[test]
    fn open_loop_phis() {
        let (mut graph, header) = loop_graph();
        let start = graph.start();
        let phi = graph.add_phi(PhiType::Memory, header, vec![start]);
        let strict = verify(&graph);
        let relaxed = verify_with(
            &graph,
            VerifyOptions {
                allow_open_loop_phis: true,
                ..VerifyOptions::default()
            },
        );

        assert!(matches!(strict, Err(VerifyError::PhiArity { expected: 2, found: 1, .. })));
        assert_eq!(relaxed, Ok(()));

        graph.add_phi_input(phi, start);

        assert_eq!(verify(&graph), Ok(()));
    }

    #[test]
    fn unlinked_fixed_nodes_and_leftover_guards() {
        let (mut graph, _) = branching_graph();
        let p = graph.unique(NodeKind::Parameter { index: 0 }, vec![]);
        let dangling = graph.add(NodeKind::Invoke, vec![]);

        assert_eq!(verify(&graph), Err(VerifyError::Unlinked(dangling)));

        graph.delete(dangling);

        let start = graph.start();
        let guard = graph.add(
            NodeKind::Guard {
                reason: DeoptReason::NullCheckException,
                action: DeoptAction::InvalidateReprofile,
                negated: true,
            },
            vec![p, start],
        );
        let lowered = VerifyOptions {
            allow_guards: false,
            ..VerifyOptions::default()
        };

        assert_eq!(verify_with(&graph, lowered), Err(VerifyError::UnloweredGuard(guard)));
    }
}
