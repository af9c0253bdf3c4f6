use super::super::analysis::{AliasState, AliasTracker, ControlFlowVisitor};
use super::super::graph::Graph;
use super::super::node::{NodeId, NodeKind};
use crate::location_map::{Location, LocationIdentity};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

/// Rewrites every fixed `Read` into a `FloatingRead` ordered after the last
/// access of its location. Guard dependencies of a read stay ordered through
/// a `ValueAnchor` placed where the read used to be.
pub fn schedule_floating_reads(graph: &mut Graph) -> usize {
    let mut scheduler = FloatingReadScheduler::new();
    let initial = AliasState::new(graph.start());

    scheduler.apply(graph, initial);

    debug!("floated {} reads", scheduler.floated);

    scheduler.floated
}

struct FloatingReadScheduler {
    tracker: AliasTracker,
    floated: usize,
}

impl FloatingReadScheduler {
    fn new() -> Self {
        Self {
            tracker: AliasTracker::new(),
            floated: 0,
        }
    }

    fn process_read(&mut self, graph: &mut Graph, read: NodeId, location: Location, state: &mut AliasState) {
        let object = graph.node(read).inputs()[0];
        let dependencies = graph.node(read).dependencies().to_vec();
        let last_access = self.tracker.last_access(graph, state, location.identity);

        let mut inputs = vec![object];
        inputs.extend(last_access);

        let floating = graph.unique_with_dependencies(NodeKind::FloatingRead { location }, inputs, dependencies.clone());

        let guards: Vec<NodeId> = dependencies
            .into_iter()
            .filter(|dep| graph.kind(*dep).is_guard())
            .collect();

        if !guards.is_empty() {
            let anchor = graph.add(NodeKind::ValueAnchor, guards);

            graph.add_after_fixed(read, anchor);
        }

        trace!("{read} -> {floating} after {last_access:?}");

        graph.replace_fixed_with_floating(read, floating);
        self.floated += 1;
    }
}

impl ControlFlowVisitor for FloatingReadScheduler {
    type State = AliasState;

    fn node(&mut self, graph: &mut Graph, node: NodeId, state: &mut AliasState) {
        match graph.kind(node) {
            NodeKind::Read { location, null_check } => {
                assert!(!null_check, "{node} already checks for null");

                self.process_read(graph, node, location, state)
            }
            NodeKind::Write { location, .. } => self.tracker.write(state, location.identity, node),
            NodeKind::LoopExit => self.tracker.loop_exit(graph, node, state),
            kind if kind.is_memory_checkpoint() => self.tracker.checkpoint(state, node),
            _ => {}
        }
    }

    fn merge(&mut self, graph: &mut Graph, merge: NodeId, state: &mut AliasState, others: &[AliasState]) {
        self.tracker.merge(graph, merge, state, others)
    }

    /// Locations written in the loop get a header phi even when nothing
    /// tracked them before the loop, so reads after the exit stay ordered
    /// after those writes.
    fn loop_begin(&mut self, graph: &mut Graph, loop_begin: NodeId, state: &mut AliasState) {
        for location in modified_locations(graph, loop_begin) {
            if !state.is_tracked(location) {
                self.tracker.last_access(graph, state, location);
            }
        }

        self.tracker.loop_begin(graph, loop_begin, state)
    }

    fn loop_ends(&mut self, graph: &mut Graph, loop_begin: NodeId, end_states: Vec<AliasState>) {
        self.tracker.loop_ends(graph, loop_begin, end_states)
    }
}

/// Every location written inside the loop of `header`, nested loops
/// included, in identity order. `ANY` and `FINAL` are left out.
fn modified_locations(graph: &Graph, header: NodeId) -> Vec<LocationIdentity> {
    let mut locations = vec![];
    let mut visited = FxHashSet::default();
    let mut work_list = vec![header];

    while let Some(node) = work_list.pop() {
        if !visited.insert(node) {
            continue;
        }

        match graph.kind(node) {
            NodeKind::Write { location, .. } => {
                let identity = location.identity;

                if !identity.is_any() && !identity.is_final() {
                    locations.push(identity);
                }
            }
            NodeKind::LoopExit if graph.loop_begin_of(node) == header => continue,
            NodeKind::LoopEnd => continue,
            NodeKind::End => {
                work_list.push(graph.merge_of_end(node));
                continue;
            }
            _ => {}
        }

        work_list.extend(graph.node(node).successors().iter().copied());
    }

    locations.sort();
    locations.dedup();
    locations
}
