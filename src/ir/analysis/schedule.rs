use super::super::graph::Graph;
use super::super::node::{NodeId, NodeKind};
use super::postorder::ControlFlowVisitor;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cmp::max;
use std::fmt;

pub type BlockId = usize;

pub type LoopChain = SmallVec<[NodeId; 4]>;

/// One basic block: its begin node, every scheduled node in order, and the
/// headers of the loops containing it, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledBlock {
    pub id: BlockId,
    pub begin: NodeId,
    pub nodes: Vec<NodeId>,
    pub loops: LoopChain,
}

impl ScheduledBlock {
    pub fn new(id: BlockId, begin: NodeId, nodes: Vec<NodeId>, loops: LoopChain) -> Self {
        Self {
            id,
            begin,
            nodes,
            loops,
        }
    }

    pub fn innermost_loop(&self) -> Option<NodeId> {
        self.loops.first().copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSchedule {
    blocks: Vec<ScheduledBlock>,
}

impl BlockSchedule {
    pub fn new(blocks: Vec<ScheduledBlock>) -> Self {
        Self { blocks }
    }

    /// Schedules every fixed node in control order and every `Guard` and
    /// `FloatingRead` at its earliest position: right after the latest of
    /// its inputs and dependencies.
    pub fn compute(graph: &mut Graph) -> Self {
        let mut builder = BlockListBuilder::default();
        let initial = SchedulerState {
            block: 0,
            loops: LoopChain::new(),
        };

        builder.apply(graph, initial);

        let mut placer = FloatingPlacer {
            graph,
            fixed: builder.positions,
            floating: FxHashMap::default(),
        };
        let mut placed: Vec<Vec<(usize, NodeId)>> = vec![vec![]; builder.blocks.len()];

        let floating: Vec<NodeId> = graph
            .node_ids()
            .filter(|node| matches!(graph.kind(*node), NodeKind::Guard { .. } | NodeKind::FloatingRead { .. }))
            .collect();

        for node in floating {
            let position = placer.position(node).unwrap_or(Position { block: 0, index: 0 });

            placed[position.block].push((position.index, node));
        }

        let blocks = builder
            .blocks
            .into_iter()
            .zip(placed)
            .map(|(block, mut floating)| {
                floating.sort();
                interleave(graph, block, floating)
            })
            .collect();

        Self { blocks }
    }

    pub fn blocks(&self) -> &[ScheduledBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block_of(&self, node: NodeId) -> Option<BlockId> {
        self.blocks
            .iter()
            .find(|block| block.nodes.contains(&node))
            .map(|block| block.id)
    }
}

impl std::ops::Index<BlockId> for BlockSchedule {
    type Output = ScheduledBlock;

    fn index(&self, index: BlockId) -> &Self::Output {
        &self.blocks[index]
    }
}

/// Floating nodes anchored at a terminator go in front of it.
fn interleave(graph: &Graph, mut block: ScheduledBlock, floating: Vec<(usize, NodeId)>) -> ScheduledBlock {
    let fixed = std::mem::take(&mut block.nodes);
    let mut floating = floating.into_iter().peekable();

    for (index, node) in fixed.into_iter().enumerate() {
        let terminator = graph.kind(node).ends_block();

        if !terminator {
            block.nodes.push(node);
        }

        while let Some((_, float)) = floating.next_if(|(at, _)| *at == index) {
            block.nodes.push(float);
        }

        if terminator {
            block.nodes.push(node);
        }
    }

    block.nodes.extend(floating.map(|(_, float)| float));
    block
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Position {
    block: BlockId,
    index: usize,
}

#[derive(Clone)]
struct SchedulerState {
    block: BlockId,
    loops: LoopChain,
}

#[derive(Default)]
struct BlockListBuilder {
    blocks: Vec<ScheduledBlock>,
    positions: FxHashMap<NodeId, Position>,
}

impl ControlFlowVisitor for BlockListBuilder {
    type State = SchedulerState;

    fn node(&mut self, graph: &mut Graph, node: NodeId, state: &mut SchedulerState) {
        let kind = graph.kind(node);

        if kind == NodeKind::LoopExit {
            let header = graph.loop_begin_of(node);
            let popped = state.loops.pop();

            assert_eq!(popped, Some(header), "{node} does not exit the innermost loop");
        }

        let starts_block = match kind {
            NodeKind::Start | NodeKind::Merge | NodeKind::LoopBegin => true,
            _ => graph
                .node(node)
                .predecessor()
                .map(|pred| graph.kind(pred).is_control_split())
                .unwrap_or(false),
        };

        if starts_block {
            let id = self.blocks.len();
            let loops = state.loops.iter().rev().copied().collect();

            self.blocks.push(ScheduledBlock::new(id, node, vec![], loops));
            state.block = id;
        }

        let block = &mut self.blocks[state.block];

        self.positions.insert(
            node,
            Position {
                block: state.block,
                index: block.nodes.len(),
            },
        );
        block.nodes.push(node);
    }

    fn merge(&mut self, _: &mut Graph, _: NodeId, _: &mut SchedulerState, _: &[SchedulerState]) {}

    fn loop_begin(&mut self, _: &mut Graph, loop_begin: NodeId, state: &mut SchedulerState) {
        state.loops.push(loop_begin);
    }
}

struct FloatingPlacer<'a> {
    graph: &'a Graph,
    fixed: FxHashMap<NodeId, Position>,
    floating: FxHashMap<NodeId, Option<Position>>,
}

impl<'a> FloatingPlacer<'a> {
    fn position(&mut self, node: NodeId) -> Option<Position> {
        if let Some(position) = self.fixed.get(&node) {
            return Some(*position);
        }

        if let Some(position) = self.floating.get(&node) {
            return *position;
        }

        let graph = self.graph;
        let position = match graph.kind(node) {
            NodeKind::Phi { .. } => self.position(graph.phi_merge(node)),
            NodeKind::ValueProxy { .. } => self.position(graph.node(node).inputs()[1]),
            kind if kind.is_fixed() => None,
            _ => {
                let node = graph.node(node);

                node.inputs()
                    .iter()
                    .chain(node.dependencies().iter())
                    .fold(None, |latest, input| max(latest, self.position(*input)))
            }
        };

        self.floating.insert(node, position);
        position
    }
}

impl fmt::Display for BlockSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in self.blocks.iter() {
            let loops: Vec<String> = block.loops.iter().map(|l| l.to_string()).collect();

            write!(f, "B{} @ {}", block.id, block.begin)?;

            if !loops.is_empty() {
                write!(f, " loops [{}]", loops.join(", "))?;
            }

            writeln!(f)?;

            for node in block.nodes.iter() {
                writeln!(f, "    {node}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::graph_builder::GraphBuilder;
    use crate::ir::phases::schedule_floating_reads;
    use crate::location_map::Location;

    #[test]
    fn blocks_follow_control_flow() {
        let mut builder = GraphBuilder::new();
        let p = builder.parameter();
        let c = builder.is_null(p);

        builder.begin_while(c);
        builder.begin_while(c);
        builder.invoke();
        builder.end_while();
        builder.end_while();

        let mut graph = builder.build();
        let schedule = BlockSchedule::compute(&mut graph);

        // start, both headers, both bodies and both exits
        assert_eq!(schedule.len(), 7);
        assert_eq!(schedule[0].begin, graph.start());
        assert!(schedule[0].loops.is_empty());

        let inner_body = schedule
            .blocks()
            .iter()
            .find(|block| block.loops.len() == 2 && graph.kind(block.begin) == NodeKind::Begin)
            .unwrap();
        let outer = *inner_body.loops.last().unwrap();
        let inner = inner_body.innermost_loop().unwrap();

        assert_eq!(graph.kind(outer), NodeKind::LoopBegin);
        assert_eq!(graph.kind(inner), NodeKind::LoopBegin);
        assert_ne!(outer, inner);

        let fixed: usize = schedule.blocks().iter().map(|block| block.nodes.len()).sum();
        assert_eq!(fixed, graph.count(|kind| kind.is_fixed()));
    }

    #[test]
    fn loop_exit_block_is_outside_the_loop() {
        let mut builder = GraphBuilder::new();
        let p = builder.parameter();
        let c = builder.is_null(p);

        builder.begin_while(c);
        builder.end_while();

        let mut graph = builder.build();
        let schedule = BlockSchedule::compute(&mut graph);
        let exit_block = schedule
            .blocks()
            .iter()
            .find(|block| graph.kind(block.begin) == NodeKind::LoopExit)
            .unwrap();

        assert!(exit_block.loops.is_empty());
    }

    #[test]
    fn guard_and_read_follow_their_inputs() {
        let mut builder = GraphBuilder::new();
        let p = builder.parameter();
        let f = builder.location("f");
        builder.invoke();
        let guard = builder.null_guard(p);
        let read = builder.read(p, Location::constant(f, 8));
        builder.return_value(Some(read));

        let mut graph = builder.build();
        schedule_floating_reads(&mut graph);

        let schedule = BlockSchedule::compute(&mut graph);
        let nodes = &schedule[0].nodes;
        let kinds: Vec<&str> = nodes.iter().map(|n| graph.kind(*n).name()).collect();

        assert_eq!(
            kinds,
            vec!["Start", "Guard", "Invoke", "FloatingRead", "ValueAnchor", "Return"]
        );
        assert_eq!(nodes[1], guard);
    }
}
