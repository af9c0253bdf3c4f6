use super::graph::Graph;
use super::logic;
use super::node::{DeoptAction, DeoptReason, NodeId, NodeKind, Probability};
use crate::location_map::{Location, LocationIdentity, LocationMap};

const BRANCH_PROBABILITY: f64 = 0.5;
const LOOP_PROBABILITY: f64 = 0.9;

enum ControlFrame {
    If {
        else_begin: NodeId,
        ends: Vec<NodeId>,
        in_else: bool,
    },
    Loop {
        header: NodeId,
        exit: NodeId,
    },
}

/// Builds structured, well-formed graphs: every `if` joins at a merge,
/// every `while` gets a header, a backedge and an exit, and leaving a loop
/// early passes through its loop exits.
pub struct GraphBuilder {
    graph: Graph,
    locations: LocationMap,
    tail: Option<NodeId>,
    block_begin: NodeId,
    block_guards: Vec<(NodeId, NodeId)>, // (object, guard)
    parameters: u32,
    frames: Vec<ControlFrame>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        let graph = Graph::new();
        let start = graph.start();

        Self {
            graph,
            locations: LocationMap::new(),
            tail: Some(start),
            block_begin: start,
            block_guards: vec![],
            parameters: 0,
            frames: vec![],
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn location(&mut self, name: &str) -> LocationIdentity {
        self.locations.get_id(name)
    }

    pub fn get_locations(&self) -> &LocationMap {
        &self.locations
    }

    /// False once every path has returned or deoptimized.
    pub fn is_reachable(&self) -> bool {
        self.tail.is_some()
    }

    pub fn loop_depth(&self) -> usize {
        self.frames
            .iter()
            .filter(|frame| matches!(frame, ControlFrame::Loop { .. }))
            .count()
    }

    pub fn build(self) -> Graph {
        self.into_parts().0
    }

    pub fn into_parts(mut self) -> (Graph, LocationMap) {
        assert!(self.frames.is_empty(), "unclosed control flow");

        if self.is_reachable() {
            self.return_value(None);
        }

        (self.graph, self.locations)
    }

    pub fn parameter(&mut self) -> NodeId {
        let index = self.parameters;
        self.parameters += 1;

        self.graph.unique(NodeKind::Parameter { index }, vec![])
    }

    pub fn constant(&mut self, value: i64) -> NodeId {
        self.graph.unique(NodeKind::Constant { value }, vec![])
    }

    pub fn null(&mut self) -> NodeId {
        self.graph.unique(NodeKind::NullConstant, vec![])
    }

    pub fn is_null(&mut self, object: NodeId) -> NodeId {
        self.graph.unique(NodeKind::IsNull, vec![object])
    }

    pub fn equals(&mut self, x: NodeId, y: NodeId) -> NodeId {
        self.graph.unique(NodeKind::IntegerEquals, vec![x, y])
    }

    pub fn less_than(&mut self, x: NodeId, y: NodeId) -> NodeId {
        self.graph.unique(NodeKind::IntegerLessThan, vec![x, y])
    }

    pub fn not(&mut self, condition: NodeId) -> NodeId {
        logic::negate(&mut self.graph, condition)
    }

    pub fn and(&mut self, a: NodeId, b: NodeId) -> NodeId {
        logic::and(&mut self.graph, a, b, BRANCH_PROBABILITY)
    }

    pub fn or(&mut self, a: NodeId, b: NodeId) -> NodeId {
        logic::or(&mut self.graph, a, b, BRANCH_PROBABILITY)
    }

    pub fn read(&mut self, object: NodeId, location: Location) -> NodeId {
        let guards = self.guards_of(object);
        let read = self.graph.add_with_dependencies(
            NodeKind::Read {
                location,
                null_check: false,
            },
            vec![object],
            guards,
        );

        self.append(read);
        read
    }

    pub fn write(&mut self, object: NodeId, location: Location, value: NodeId) -> NodeId {
        let guards = self.guards_of(object);
        let write = self.graph.add_with_dependencies(
            NodeKind::Write {
                location,
                null_check: false,
            },
            vec![object, value],
            guards,
        );

        self.append(write);
        write
    }

    pub fn invoke(&mut self) -> NodeId {
        let invoke = self.graph.add(NodeKind::Invoke, vec![]);

        self.append(invoke);
        invoke
    }

    pub fn barrier(&mut self) -> NodeId {
        let barrier = self.graph.add(NodeKind::MemoryBarrier, vec![]);

        self.append(barrier);
        barrier
    }

    /// A guard anchored at the begin of the current block.
    pub fn guard(&mut self, condition: NodeId, reason: DeoptReason, negated: bool) -> NodeId {
        let kind = NodeKind::Guard {
            reason,
            action: DeoptAction::InvalidateReprofile,
            negated,
        };
        let guard = self.graph.add(kind, vec![condition, self.block_begin]);

        if self.graph.kind(condition) == NodeKind::IsNull {
            let object = self.graph.node(condition).inputs()[0];

            self.block_guards.push((object, guard));
        }

        guard
    }

    pub fn null_guard(&mut self, object: NodeId) -> NodeId {
        let is_null = self.is_null(object);

        self.guard(is_null, DeoptReason::NullCheckException, true)
    }

    pub fn begin_if(&mut self, condition: NodeId) {
        let (then_begin, else_begin) = self.split(condition);

        self.frames.push(ControlFrame::If {
            else_begin,
            ends: vec![],
            in_else: false,
        });
        self.start_block(then_begin);
    }

    pub fn begin_else(&mut self) {
        let end = self.close_branch();

        let else_begin = match self.frames.last_mut() {
            Some(ControlFrame::If {
                else_begin,
                ends,
                in_else,
            }) if !*in_else => {
                ends.extend(end);
                *in_else = true;

                *else_begin
            }
            _ => panic!("else without an open if"),
        };

        self.start_block(else_begin);
    }

    pub fn end_if(&mut self) {
        let end = self.close_branch();

        let (else_begin, mut ends, in_else) = match self.frames.pop() {
            Some(ControlFrame::If {
                else_begin,
                ends,
                in_else,
            }) => (else_begin, ends, in_else),
            _ => panic!("end of if without an open if"),
        };

        ends.extend(end);

        if !in_else {
            self.start_block(else_begin);
            ends.extend(self.close_branch());
        }

        if ends.is_empty() {
            self.tail = None;
        } else {
            let merge = self.graph.add(NodeKind::Merge, ends);

            self.start_block(merge);
        }
    }

    pub fn begin_while(&mut self, condition: NodeId) {
        let entry = self.graph.add(NodeKind::End, vec![]);
        self.append(entry);

        let header = self.graph.add(NodeKind::LoopBegin, vec![entry]);
        self.start_block(header);

        let kind = NodeKind::If {
            true_probability: Probability::new(LOOP_PROBABILITY),
        };
        let if_node = self.graph.add(kind, vec![condition]);
        self.append(if_node);

        let body = self.graph.add(NodeKind::Begin, vec![]);
        let exit = self.graph.add(NodeKind::LoopExit, vec![header]);
        self.graph.set_successors(if_node, vec![body, exit]);

        self.frames.push(ControlFrame::Loop { header, exit });
        self.start_block(body);
    }

    pub fn end_while(&mut self) {
        let (header, exit) = match self.frames.pop() {
            Some(ControlFrame::Loop { header, exit }) => (header, exit),
            _ => panic!("end of while without an open while"),
        };

        if self.is_reachable() {
            let end = self.graph.add(NodeKind::LoopEnd, vec![header]);
            self.append(end);
        }

        self.start_block(exit);
    }

    pub fn return_value(&mut self, value: Option<NodeId>) -> NodeId {
        self.exit_loops();

        let ret = self.graph.add(NodeKind::Return, value.into_iter().collect());

        self.append(ret);
        ret
    }

    pub fn deoptimize(&mut self, reason: DeoptReason) -> NodeId {
        self.exit_loops();

        let deopt = self.graph.add(
            NodeKind::Deoptimize {
                action: DeoptAction::InvalidateReprofile,
                reason,
            },
            vec![],
        );

        self.append(deopt);
        deopt
    }

    fn exit_loops(&mut self) {
        let headers: Vec<NodeId> = self
            .frames
            .iter()
            .rev()
            .filter_map(|frame| match frame {
                ControlFrame::Loop { header, .. } => Some(*header),
                ControlFrame::If { .. } => None,
            })
            .collect();

        for header in headers {
            let exit = self.graph.add(NodeKind::LoopExit, vec![header]);

            self.append(exit);
        }
    }

    fn split(&mut self, condition: NodeId) -> (NodeId, NodeId) {
        let kind = NodeKind::If {
            true_probability: Probability::new(BRANCH_PROBABILITY),
        };
        let if_node = self.graph.add(kind, vec![condition]);
        self.append(if_node);

        let true_begin = self.graph.add(NodeKind::Begin, vec![]);
        let false_begin = self.graph.add(NodeKind::Begin, vec![]);
        self.graph.set_successors(if_node, vec![true_begin, false_begin]);

        (true_begin, false_begin)
    }

    fn close_branch(&mut self) -> Option<NodeId> {
        if !self.is_reachable() {
            return None;
        }

        let end = self.graph.add(NodeKind::End, vec![]);
        self.append(end);

        Some(end)
    }

    fn start_block(&mut self, begin: NodeId) {
        self.tail = Some(begin);
        self.block_begin = begin;
        self.block_guards.clear();
    }

    fn guards_of(&self, object: NodeId) -> Vec<NodeId> {
        self.block_guards
            .iter()
            .filter(|(guarded, _)| *guarded == object)
            .map(|(_, guard)| *guard)
            .collect()
    }

    fn append(&mut self, node: NodeId) {
        let tail = self
            .tail
            .unwrap_or_else(|| panic!("{node} appended after control flow ended"));

        self.graph.set_next(tail, node);
        self.tail = if self.graph.kind(node).is_fixed_with_next() {
            Some(node)
        } else {
            None
        };
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_program() {
        let mut builder = GraphBuilder::new();
        let p = builder.parameter();
        let f = builder.location("f");
        let read = builder.read(p, Location::constant(f, 8));
        let ret = builder.return_value(Some(read));
        let graph = builder.build();

        assert_eq!(graph.node(graph.start()).next(), Some(read));
        assert_eq!(graph.node(read).next(), Some(ret));
        assert_eq!(graph.node(ret).inputs(), &[read]);
    }

    #[test]
    fn falling_off_the_end_returns() {
        let builder = GraphBuilder::new();
        let graph = builder.build();
        let next = graph.node(graph.start()).next().unwrap();

        assert_eq!(graph.kind(next), NodeKind::Return);
        assert!(graph.node(next).inputs().is_empty());
    }

    #[test]
    fn if_without_else_still_merges_two_ends() {
        let mut builder = GraphBuilder::new();
        let p = builder.parameter();
        let c = builder.is_null(p);

        builder.begin_if(c);
        builder.invoke();
        builder.end_if();

        let graph = builder.build();
        let merges: Vec<NodeId> = graph
            .node_ids()
            .filter(|n| graph.kind(*n) == NodeKind::Merge)
            .collect();

        assert_eq!(merges.len(), 1);
        assert_eq!(graph.forward_ends(merges[0]).len(), 2);
    }

    #[test]
    fn returning_branches_leave_no_merge() {
        let mut builder = GraphBuilder::new();
        let p = builder.parameter();
        let c = builder.is_null(p);

        builder.begin_if(c);
        builder.return_value(None);
        builder.begin_else();
        builder.deoptimize(DeoptReason::UnreachedCode);
        builder.end_if();

        assert!(!builder.is_reachable());

        let graph = builder.build();

        assert_eq!(graph.count(|k| *k == NodeKind::Merge), 0);
    }

    #[test]
    fn return_inside_nested_loops_exits_innermost_first() {
        let mut builder = GraphBuilder::new();
        let p = builder.parameter();
        let c = builder.is_null(p);

        builder.begin_while(c);
        builder.begin_while(c);
        let ret = builder.return_value(None);
        builder.end_while();
        builder.end_while();

        let graph = builder.build();
        let second = graph.node(ret).predecessor().unwrap();
        let first = graph.node(second).predecessor().unwrap();
        let inner = graph.loop_begin_of(first);
        let outer = graph.loop_begin_of(second);

        assert_eq!(graph.kind(first), NodeKind::LoopExit);
        assert_eq!(graph.kind(second), NodeKind::LoopExit);
        assert_ne!(inner, outer);
        assert!(graph.loop_ends(inner).is_empty());
        assert_eq!(graph.loop_exits(outer).len(), 2);
    }

    #[test]
    fn reads_depend_on_null_guards_of_their_object() {
        let mut builder = GraphBuilder::new();
        let p = builder.parameter();
        let q = builder.parameter();
        let f = builder.location("f");
        let guard = builder.null_guard(p);
        builder.null_guard(q);
        let read = builder.read(p, Location::constant(f, 8));

        assert_eq!(builder.graph().node(read).dependencies(), &[guard]);

        let c = builder.is_null(p);
        builder.begin_if(c);
        let inner = builder.read(p, Location::constant(f, 8));

        assert!(builder.graph().node(inner).dependencies().is_empty());
    }
}
