use super::super::graph::Graph;
use super::super::node::{NodeId, NodeKind};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// A forward walk over the fixed nodes of a graph, threading one state per
/// control flow path.
///
/// States are cloned when control splits and merged once every forward end
/// of a merge has been reached. The next node of a `FixedWithNext` node is
/// read before `node` is called, so a visitor may replace or splice the
/// node it is handed.
pub trait ControlFlowVisitor: Sized {
    type State: Clone;

    fn node(&mut self, graph: &mut Graph, node: NodeId, state: &mut Self::State);

    /// `state` arrives as a clone of the state at forward end 0, `others`
    /// are the states at forward ends `1..n` in order.
    fn merge(&mut self, graph: &mut Graph, merge: NodeId, state: &mut Self::State, others: &[Self::State]);

    fn loop_begin(&mut self, _graph: &mut Graph, _loop_begin: NodeId, _state: &mut Self::State) {}

    /// Called once every loop end of `loop_begin` has been visited, with the
    /// states at those ends in backedge order.
    fn loop_ends(&mut self, _graph: &mut Graph, _loop_begin: NodeId, _end_states: Vec<Self::State>) {}

    fn after_split(&mut self, _graph: &mut Graph, _node: NodeId, _state: &mut Self::State) {}

    fn apply(&mut self, graph: &mut Graph, initial: Self::State) {
        let mut iterator = PostOrderIterator::<Self>::new();

        iterator.run(self, graph, initial);
    }
}

struct PostOrderIterator<V: ControlFlowVisitor> {
    node_states: FxHashMap<NodeId, V::State>,
    visited_ends: FxHashSet<NodeId>,
    node_queue: VecDeque<NodeId>,
}

impl<V: ControlFlowVisitor> PostOrderIterator<V> {
    fn new() -> Self {
        Self {
            node_states: FxHashMap::default(),
            visited_ends: FxHashSet::default(),
            node_queue: VecDeque::new(),
        }
    }

    fn run(&mut self, visitor: &mut V, graph: &mut Graph, initial: V::State) {
        let mut state = initial;
        let mut current = Some(graph.start());

        while let Some(node) = current {
            current = match graph.kind(node) {
                NodeKind::LoopBegin => {
                    visitor.loop_begin(graph, node, &mut state);
                    self.visit_fixed_with_next(visitor, graph, node, &mut state)
                }
                NodeKind::End => {
                    visitor.node(graph, node, &mut state);
                    self.queue_merge(graph, node, state.clone());
                    self.next_queued_node(visitor, graph, &mut state)
                }
                NodeKind::LoopEnd => {
                    visitor.node(graph, node, &mut state);
                    self.finish_loop_ends(visitor, graph, node, state.clone());
                    self.next_queued_node(visitor, graph, &mut state)
                }
                NodeKind::If { .. } => {
                    let successors = graph.node(node).successors().to_vec();

                    visitor.node(graph, node, &mut state);
                    self.node_states.insert(node, state.clone());
                    self.node_queue.extend(successors);
                    self.next_queued_node(visitor, graph, &mut state)
                }
                NodeKind::Return | NodeKind::Deoptimize { .. } => {
                    visitor.node(graph, node, &mut state);
                    self.next_queued_node(visitor, graph, &mut state)
                }
                _ => self.visit_fixed_with_next(visitor, graph, node, &mut state),
            };
        }
    }

    fn visit_fixed_with_next(
        &mut self,
        visitor: &mut V,
        graph: &mut Graph,
        node: NodeId,
        state: &mut V::State,
    ) -> Option<NodeId> {
        let next = graph.node(node).next();

        assert!(next.is_some(), "{node} ({}) has no next", graph.kind(node).name());

        visitor.node(graph, node, state);

        next
    }

    fn next_queued_node(&mut self, visitor: &mut V, graph: &mut Graph, state: &mut V::State) -> Option<NodeId> {
        let node = self.node_queue.pop_front()?;

        if graph.kind(node).is_merge() {
            let ends = graph.forward_ends(node).to_vec();
            let mut states = ends.iter().map(|end| {
                self.node_states
                    .remove(end)
                    .unwrap_or_else(|| panic!("no state for {end}"))
            });

            // the merge is only queued once every end has a state
            let mut merged = states.next().unwrap_or_else(|| panic!("{node} has no ends"));
            let others: Vec<V::State> = states.collect();

            visitor.merge(graph, node, &mut merged, &others);
            *state = merged;
        } else {
            let pred = graph
                .node(node)
                .predecessor()
                .unwrap_or_else(|| panic!("{node} has no predecessor"));

            *state = self.node_states[&pred].clone();
            visitor.after_split(graph, node, state);
        }

        Some(node)
    }

    fn queue_merge(&mut self, graph: &Graph, end: NodeId, state: V::State) {
        assert!(self.visited_ends.insert(end), "{end} visited twice");
        self.node_states.insert(end, state);

        let merge = graph.merge_of_end(end);
        let ends_visited = graph
            .forward_ends(merge)
            .iter()
            .all(|end| self.visited_ends.contains(end));

        if ends_visited {
            self.node_queue.push_back(merge);
        }
    }

    fn finish_loop_ends(&mut self, visitor: &mut V, graph: &mut Graph, loop_end: NodeId, state: V::State) {
        assert!(self.visited_ends.insert(loop_end), "{loop_end} visited twice");
        self.node_states.insert(loop_end, state);

        let loop_begin = graph.loop_begin_of(loop_end);
        let loop_ends = graph.loop_ends(loop_begin);

        if loop_ends.iter().all(|end| self.visited_ends.contains(end)) {
            let states = loop_ends
                .iter()
                .map(|end| {
                    self.node_states
                        .remove(end)
                        .unwrap_or_else(|| panic!("no state for {end}"))
                })
                .collect();

            visitor.loop_ends(graph, loop_begin, states);
        }
    }
}
