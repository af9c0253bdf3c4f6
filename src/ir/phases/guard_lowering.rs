use super::super::analysis::{BlockSchedule, ScheduledBlock};
use super::super::graph::Graph;
use super::super::node::{NodeId, NodeKind, Probability};
use super::scheduled_iter::{BlockCursor, ScheduledNodeVisitor};
use crate::location_map::Location;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GuardLoweringConfig {
    pub use_implicit_null_checks: bool,
}

impl Default for GuardLoweringConfig {
    fn default() -> Self {
        Self {
            use_implicit_null_checks: true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TargetDescription {
    /// Accesses below this displacement fault on a null base.
    pub implicit_null_check_limit: i64,
}

impl Default for TargetDescription {
    fn default() -> Self {
        Self {
            implicit_null_check_limit: 4096,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct GuardLoweringStats {
    pub implicit_null_checks: usize,
    pub null_checks: usize,
    pub deopt_branches: usize,
}

/// Removes every guard from the graph, block by block. Null guards directly
/// followed by an access close enough to the base become implicit checks on
/// that access, everything else becomes a `NullCheck` or an `If` branching
/// to a `Deoptimize`.
pub fn lower_guards(
    graph: &mut Graph,
    schedule: &BlockSchedule,
    config: GuardLoweringConfig,
    target: TargetDescription,
) -> GuardLoweringStats {
    let mut stats = GuardLoweringStats::default();

    for block in schedule.blocks() {
        process_block(graph, block, config, target, &mut stats);
    }

    let remaining = graph.count(|kind| kind.is_guard());
    assert_eq!(remaining, 0, "{remaining} guards survived lowering");

    debug!(
        "lowered guards: {} implicit, {} null checks, {} branches",
        stats.implicit_null_checks, stats.null_checks, stats.deopt_branches
    );

    stats
}

fn process_block(
    graph: &mut Graph,
    block: &ScheduledBlock,
    config: GuardLoweringConfig,
    target: TargetDescription,
    stats: &mut GuardLoweringStats,
) {
    let mut nodes = block.nodes.clone();

    if config.use_implicit_null_checks && target.implicit_null_check_limit > 0 {
        let mut implicit = UseImplicitNullChecks::new(target, stats);

        nodes = implicit.process_nodes(graph, &nodes, block.begin);
    }

    LowerGuards { block, stats }.process_nodes(graph, &nodes, block.begin);
}

struct UseImplicitNullChecks<'a> {
    target: TargetDescription,
    null_guarded: FxHashMap<NodeId, NodeId>,
    stats: &'a mut GuardLoweringStats,
}

impl<'a> UseImplicitNullChecks<'a> {
    fn new(target: TargetDescription, stats: &'a mut GuardLoweringStats) -> Self {
        Self {
            target,
            null_guarded: FxHashMap::default(),
            stats,
        }
    }

    fn is_implicit_null_check(&self, location: Location) -> bool {
        match location.displacement {
            Some(displacement) => displacement < self.target.implicit_null_check_limit,
            None => false,
        }
    }

    fn process_guard(&mut self, graph: &Graph, guard: NodeId, negated: bool) {
        let condition = graph.node(guard).inputs()[0];

        if negated && graph.kind(condition) == NodeKind::IsNull {
            let object = graph.node(condition).inputs()[0];

            self.null_guarded.insert(object, guard);
        }
    }

    fn process_access(&mut self, graph: &mut Graph, cursor: &mut BlockCursor, access: NodeId, kind: NodeKind) {
        let object = graph.node(access).inputs()[0];
        let guard = match self.null_guarded.get(&object) {
            Some(guard) => *guard,
            None => return,
        };
        let location = match kind.location() {
            Some(location) if self.is_implicit_null_check(location) => location,
            _ => return,
        };

        graph.remove_dependency(access, guard);

        let fixed_access = match kind {
            NodeKind::FloatingRead { .. } => {
                let dependencies = graph.node(access).dependencies().to_vec();
                let read = graph.add_with_dependencies(
                    NodeKind::Read {
                        location,
                        null_check: true,
                    },
                    vec![object],
                    dependencies,
                );

                cursor.replace_current(graph, read);
                read
            }
            NodeKind::Read { .. } => {
                graph.set_kind(access, NodeKind::Read { location, null_check: true });
                access
            }
            NodeKind::Write { .. } => {
                graph.set_kind(access, NodeKind::Write { location, null_check: true });
                access
            }
            _ => unreachable!("{access} is not an access"),
        };

        let condition = graph.node(guard).inputs()[0];

        graph.replace_and_delete(guard, fixed_access);

        if graph.node(condition).usages().is_empty() {
            graph.kill_with_unused_floating_inputs(condition);
        }

        self.null_guarded.remove(&object);
        self.stats.implicit_null_checks += 1;

        debug!("{guard} folded into {fixed_access} at displacement {:?}", location.displacement);
    }
}

impl<'a> ScheduledNodeVisitor for UseImplicitNullChecks<'a> {
    fn node(&mut self, graph: &mut Graph, cursor: &mut BlockCursor, node: NodeId) {
        let kind = graph.kind(node);

        match kind {
            NodeKind::Guard { negated, .. } => self.process_guard(graph, node, negated),
            kind if kind.is_access() => self.process_access(graph, cursor, node, kind),
            _ => {}
        }

        if kind.has_state_after() {
            self.null_guarded.clear();
        } else {
            self.null_guarded
                .retain(|_, guard| !graph.node(*guard).usages().contains(&node));
        }
    }
}

struct LowerGuards<'a> {
    block: &'a ScheduledBlock,
    stats: &'a mut GuardLoweringStats,
}

impl<'a> LowerGuards<'a> {
    fn lower_to_null_check(&mut self, graph: &mut Graph, cursor: &mut BlockCursor, guard: NodeId) {
        let is_null = graph.node(guard).inputs()[0];
        let object = graph.node(is_null).inputs()[0];
        let null_check = graph.add(NodeKind::NullCheck, vec![object]);

        cursor.replace_current(graph, null_check);

        if graph.node(is_null).usages().is_empty() {
            graph.kill_with_unused_floating_inputs(is_null);
        }

        self.stats.null_checks += 1;
        trace!("{guard} -> {null_check}");
    }

    fn lower_to_if(&mut self, graph: &mut Graph, cursor: &mut BlockCursor, guard: NodeId, kind: NodeKind) {
        let (reason, action, negated) = match kind {
            NodeKind::Guard {
                reason,
                action,
                negated,
            } => (reason, action, negated),
            _ => unreachable!("{guard} is not a guard"),
        };
        let condition = graph.node(guard).inputs()[0];

        let fast_path = graph.add(NodeKind::Begin, vec![]);
        let deopt = graph.add(NodeKind::Deoptimize { action, reason }, vec![]);
        let deopt_branch = graph.add(NodeKind::Begin, vec![]);
        graph.set_next(deopt_branch, deopt);

        self.insert_loop_exits(graph, deopt);

        let (true_successor, false_successor) = if negated {
            (deopt_branch, fast_path)
        } else {
            (fast_path, deopt_branch)
        };
        let true_probability = if true_successor == fast_path { 1.0 } else { 0.0 };

        let if_node = graph.add(
            NodeKind::If {
                true_probability: Probability::new(true_probability),
            },
            vec![condition],
        );
        graph.set_successors(if_node, vec![true_successor, false_successor]);

        graph.replace_and_delete(guard, fast_path);
        cursor.insert(graph, if_node, fast_path);

        self.stats.deopt_branches += 1;
        trace!("{guard} -> {if_node} deoptimizing with {reason}");
    }

    /// Innermost loop first, each exit directly in front of the deoptimize.
    fn insert_loop_exits(&self, graph: &mut Graph, deopt: NodeId) {
        for header in self.block.loops.iter() {
            let exit = graph.add(NodeKind::LoopExit, vec![*header]);

            graph.add_before_fixed(deopt, exit);
        }
    }
}

impl<'a> ScheduledNodeVisitor for LowerGuards<'a> {
    fn node(&mut self, graph: &mut Graph, cursor: &mut BlockCursor, node: NodeId) {
        let kind = graph.kind(node);

        if let NodeKind::Guard { negated, .. } = kind {
            let condition = graph.node(node).inputs()[0];

            // a guard still protecting an access keeps an explicit deopt path
            let protects_access = graph
                .node(node)
                .usages()
                .iter()
                .any(|user| graph.kind(*user).is_access());

            if negated && graph.kind(condition) == NodeKind::IsNull && !protects_access {
                self.lower_to_null_check(graph, cursor, node);
            } else {
                self.lower_to_if(graph, cursor, node, kind);
            }
        }
    }
}
