use super::super::graph::Graph;
use super::super::node::NodeId;

/// Tracks where control is being rebuilt while a block is walked. New fixed
/// nodes are linked after the last fixed node seen, and the next fixed node
/// of the block is reattached to the end of whatever was inserted.
pub struct BlockCursor {
    last_fixed: NodeId,
    reconnect: Option<NodeId>,
    current: Option<NodeId>,
    output: Vec<NodeId>,
}

impl BlockCursor {
    fn new(begin: NodeId, capacity: usize) -> Self {
        Self {
            last_fixed: begin,
            reconnect: None,
            current: None,
            output: Vec::with_capacity(capacity),
        }
    }

    /// Links the run `start..=end` after the last fixed node.
    pub fn insert(&mut self, graph: &mut Graph, start: NodeId, end: NodeId) {
        graph.set_next(self.last_fixed, start);

        self.last_fixed = end;
        self.reconnect = Some(end);
    }

    /// Swaps the floating node being visited for a fixed one in both the
    /// graph and the produced node list.
    pub fn replace_current(&mut self, graph: &mut Graph, new: NodeId) {
        let current = self
            .current
            .take()
            .unwrap_or_else(|| panic!("no node is being visited"));

        assert!(graph.kind(current).is_floating(), "{current} is fixed");

        graph.replace_and_delete(current, new);
        self.insert(graph, new, new);

        if let Some(slot) = self.output.last_mut() {
            *slot = new;
        }

        self.current = Some(new);
    }
}

pub trait ScheduledNodeVisitor: Sized {
    fn node(&mut self, graph: &mut Graph, cursor: &mut BlockCursor, node: NodeId);

    /// Visits `nodes` in order, skipping nodes deleted along the way, and
    /// returns the block's node list as rewritten by the visitor.
    fn process_nodes(&mut self, graph: &mut Graph, nodes: &[NodeId], begin: NodeId) -> Vec<NodeId> {
        assert!(graph.kind(begin).is_fixed_with_next(), "{begin} can not begin a block");

        let mut cursor = BlockCursor::new(begin, nodes.len());

        for node in nodes.iter().copied() {
            if !graph.is_alive(node) {
                continue;
            }

            let kind = graph.kind(node);

            if kind.is_fixed() {
                if let Some(reconnect) = cursor.reconnect.take() {
                    graph.set_next(reconnect, node);
                }
            }

            if kind.is_fixed_with_next() {
                cursor.last_fixed = node;
            }

            cursor.output.push(node);
            cursor.current = Some(node);

            self.node(graph, &mut cursor, node);
        }

        let mut output = cursor.output;
        output.retain(|node| graph.is_alive(*node));

        output
    }
}
