use super::node::{Node, NodeId, NodeKind, PhiType};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeKey {
    kind: NodeKind,
    inputs: Vec<NodeId>,
    dependencies: Vec<NodeId>,
}

/// A program dependency graph. Fixed nodes are threaded on control edges
/// starting at the unique `Start`, floating nodes hang off data edges only.
///
/// Ids are arena indices and are never reused. Every input or dependency
/// edge is mirrored by exactly one entry in the target's usage list.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    start: NodeId,
    unique_table: FxHashMap<NodeKey, NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: vec![],
            start: NodeId::new(0),
            unique_table: FxHashMap::default(),
        };

        graph.start = graph.add(NodeKind::Start, vec![]);
        graph
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn node(&self, id: NodeId) -> &Node {
        match self.nodes.get(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("{id} is not a live node"),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("{id} is not a live node"),
        }
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.index()), Some(Some(_)))
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_some())
            .map(|(i, _)| NodeId::new(i))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn count(&self, pred: impl Fn(&NodeKind) -> bool) -> usize {
        self.nodes
            .iter()
            .flatten()
            .filter(|node| pred(&node.kind))
            .count()
    }

    pub fn add(&mut self, kind: NodeKind, inputs: Vec<NodeId>) -> NodeId {
        self.add_with_dependencies(kind, inputs, vec![])
    }

    pub fn add_with_dependencies(
        &mut self,
        kind: NodeKind,
        inputs: Vec<NodeId>,
        dependencies: Vec<NodeId>,
    ) -> NodeId {
        let id = NodeId::new(self.nodes.len());

        for input in inputs.iter().chain(dependencies.iter()) {
            self.node_mut(*input).usages.push(id);
        }

        self.nodes.push(Some(Node::new(kind, inputs, dependencies)));

        id
    }

    /// Returns an existing floating node of identical shape, or adds a new
    /// one. Phis are never interned since their inputs grow after creation.
    pub fn unique(&mut self, kind: NodeKind, inputs: Vec<NodeId>) -> NodeId {
        self.unique_with_dependencies(kind, inputs, vec![])
    }

    pub fn unique_with_dependencies(
        &mut self,
        kind: NodeKind,
        inputs: Vec<NodeId>,
        dependencies: Vec<NodeId>,
    ) -> NodeId {
        assert!(kind.is_floating(), "only floating nodes can be made unique");
        assert!(!kind.is_phi(), "phis can not be made unique");

        let key = NodeKey {
            kind,
            inputs,
            dependencies,
        };

        // entries go stale when a node is deleted or its inputs are rewritten
        if let Some(existing) = self.unique_table.get(&key) {
            if self.matches_key(*existing, &key) {
                return *existing;
            }
        }

        let id = self.add_with_dependencies(key.kind, key.inputs.clone(), key.dependencies.clone());
        self.unique_table.insert(key, id);

        id
    }

    fn matches_key(&self, id: NodeId, key: &NodeKey) -> bool {
        if !self.is_alive(id) {
            return false;
        }

        let node = self.node(id);

        node.kind == key.kind && node.inputs == key.inputs && node.dependencies == key.dependencies
    }

    /// Only used to flip flags on fixed nodes, interned nodes keep their kind.
    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        let node = self.node_mut(id);

        assert!(node.kind.is_fixed(), "can not change the kind of floating {id}");
        assert_eq!(node.kind.name(), kind.name(), "kind change must keep the variant");

        node.kind = kind;
    }

    pub fn set_next(&mut self, node: NodeId, next: NodeId) {
        assert!(self.kind(node).is_fixed_with_next(), "{node} has no next");

        if let Some(old) = self.node(node).successors.first().copied() {
            if self.node(old).predecessor == Some(node) {
                self.node_mut(old).predecessor = None;
            }
        }

        let pred = self.node(next).predecessor;
        assert!(
            pred.is_none() || pred == Some(node),
            "{next} already follows {}",
            pred.map(|p| p.to_string()).unwrap_or_default()
        );

        self.node_mut(node).successors = vec![next];
        self.node_mut(next).predecessor = Some(node);
    }

    pub fn set_successors(&mut self, split: NodeId, successors: Vec<NodeId>) {
        assert!(self.kind(split).is_control_split(), "{split} is not a control split");

        for succ in successors.iter() {
            assert!(self.node(*succ).predecessor.is_none(), "{succ} already has a predecessor");
            self.node_mut(*succ).predecessor = Some(split);
        }

        self.node_mut(split).successors = successors;
    }

    pub fn add_after_fixed(&mut self, node: NodeId, new: NodeId) {
        assert!(self.kind(new).is_fixed_with_next());
        assert!(self.node(new).predecessor.is_none() && self.node(new).successors.is_empty());

        let next = self.node(node).next();

        if let Some(next) = next {
            self.node_mut(next).predecessor = None;
        }

        self.set_next(node, new);

        if let Some(next) = next {
            self.set_next(new, next);
        }
    }

    pub fn add_before_fixed(&mut self, node: NodeId, new: NodeId) {
        assert!(self.kind(new).is_fixed_with_next());

        let pred = self
            .node(node)
            .predecessor
            .unwrap_or_else(|| panic!("{node} has no predecessor"));

        self.replace_successor(pred, node, new);
        self.node_mut(node).predecessor = None;
        self.set_next(new, node);
    }

    fn replace_successor(&mut self, pred: NodeId, old: NodeId, new: NodeId) {
        let slot = self
            .node(pred)
            .successors
            .iter()
            .position(|succ| *succ == old)
            .unwrap_or_else(|| panic!("{old} is not a successor of {pred}"));

        self.node_mut(pred).successors[slot] = new;
        self.node_mut(new).predecessor = Some(pred);
    }

    /// Swaps a fixed node for a floating equivalent. The predecessor is
    /// relinked to whatever followed the removed node.
    pub fn replace_fixed_with_floating(&mut self, fixed: NodeId, floating: NodeId) {
        assert!(self.kind(fixed).is_fixed_with_next(), "{fixed} is not fixed with next");
        assert!(self.kind(floating).is_floating(), "{floating} is not floating");

        let next = self.node(fixed).next();
        let pred = self.node(fixed).predecessor;

        self.replace_at_usages(fixed, floating);
        self.unlink(fixed);

        match (pred, next) {
            (Some(pred), Some(next)) => self.replace_successor(pred, fixed, next),
            (Some(pred), None) => self.node_mut(pred).successors.retain(|succ| *succ != fixed),
            (None, _) => panic!("{fixed} is not linked into control flow"),
        }

        self.delete(fixed);
    }

    fn unlink(&mut self, node: NodeId) {
        let successors = std::mem::take(&mut self.node_mut(node).successors);

        for succ in successors {
            if self.node(succ).predecessor == Some(node) {
                self.node_mut(succ).predecessor = None;
            }
        }

        self.node_mut(node).predecessor = None;
    }

    pub fn add_input(&mut self, node: NodeId, input: NodeId) {
        self.node_mut(node).inputs.push(input);
        self.node_mut(input).usages.push(node);
    }

    pub fn add_dependency(&mut self, node: NodeId, dependency: NodeId) {
        self.node_mut(node).dependencies.push(dependency);
        self.node_mut(dependency).usages.push(node);
    }

    pub fn remove_dependency(&mut self, node: NodeId, dependency: NodeId) {
        let deps = &mut self.node_mut(node).dependencies;

        if let Some(pos) = deps.iter().position(|d| *d == dependency) {
            deps.remove(pos);
            self.remove_usage(dependency, node);
        }
    }

    fn remove_usage(&mut self, node: NodeId, user: NodeId) {
        let usages = &mut self.node_mut(node).usages;

        if let Some(pos) = usages.iter().position(|u| *u == user) {
            usages.remove(pos);
        }
    }

    pub fn replace_at_usages(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }

        let usages = std::mem::take(&mut self.node_mut(old).usages);
        let mut seen = FxHashSet::default();

        for user in usages {
            if !seen.insert(user) {
                continue;
            }

            let user_node = self.node_mut(user);
            let mut replaced = 0;

            for slot in user_node
                .inputs
                .iter_mut()
                .chain(user_node.dependencies.iter_mut())
            {
                if *slot == old {
                    *slot = new;
                    replaced += 1;
                }
            }

            for _ in 0..replaced {
                self.node_mut(new).usages.push(user);
            }
        }
    }

    /// Moves every usage and the control predecessor of `old` to `new`,
    /// then deletes `old`.
    pub fn replace_and_delete(&mut self, old: NodeId, new: NodeId) {
        self.replace_at_usages(old, new);

        if let Some(pred) = self.node(old).predecessor {
            self.replace_successor(pred, old, new);
            self.node_mut(old).predecessor = None;
        }

        self.unlink(old);
        self.delete(old);
    }

    pub fn delete(&mut self, node: NodeId) {
        assert!(
            self.node(node).usages.is_empty(),
            "{node} is still used by {:?}",
            self.node(node).usages
        );
        assert!(
            self.node(node).predecessor.is_none() && self.node(node).successors.is_empty(),
            "{node} is still linked into control flow"
        );

        let removed = self.nodes[node.index()].take();

        if let Some(removed) = removed {
            for input in removed.inputs.iter().chain(removed.dependencies.iter()) {
                if self.is_alive(*input) {
                    self.remove_usage(*input, node);
                }
            }
        }
    }

    /// Deletes `node` and every floating input left without usages.
    pub fn kill_with_unused_floating_inputs(&mut self, node: NodeId) {
        let mut work_list = vec![node];

        while let Some(node) = work_list.pop() {
            if !self.is_alive(node) || !self.node(node).usages.is_empty() {
                continue;
            }

            let inputs: Vec<NodeId> = self
                .node(node)
                .inputs
                .iter()
                .chain(self.node(node).dependencies.iter())
                .copied()
                .filter(|input| self.kind(*input).is_floating())
                .collect();

            self.delete(node);

            for input in inputs {
                let kind = self.kind(input);

                if !matches!(kind, NodeKind::Parameter { .. }) && self.node(input).usages.is_empty() {
                    work_list.push(input);
                }
            }
        }
    }

    pub fn forward_ends(&self, merge: NodeId) -> &[NodeId] {
        assert!(self.kind(merge).is_merge(), "{merge} is not a merge");

        &self.node(merge).inputs
    }

    pub fn merge_of_end(&self, end: NodeId) -> NodeId {
        self.node(end)
            .usages
            .iter()
            .copied()
            .find(|user| self.kind(*user).is_merge())
            .unwrap_or_else(|| panic!("{end} does not flow into a merge"))
    }

    /// The loop begin a `LoopEnd` or `LoopExit` belongs to.
    pub fn loop_begin_of(&self, node: NodeId) -> NodeId {
        assert!(matches!(self.kind(node), NodeKind::LoopEnd | NodeKind::LoopExit));

        self.node(node).inputs[0]
    }

    /// Loop ends in creation order, which is the backedge order phis use.
    pub fn loop_ends(&self, loop_begin: NodeId) -> Vec<NodeId> {
        self.users_of_kind(loop_begin, |kind| matches!(kind, NodeKind::LoopEnd))
    }

    pub fn loop_exits(&self, loop_begin: NodeId) -> Vec<NodeId> {
        self.users_of_kind(loop_begin, |kind| matches!(kind, NodeKind::LoopExit))
    }

    fn users_of_kind(&self, node: NodeId, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        let mut users: Vec<NodeId> = vec![];

        for user in self.node(node).usages.iter() {
            if pred(&self.node(*user).kind) && !users.contains(user) {
                users.push(*user);
            }
        }

        users
    }

    pub fn add_phi(&mut self, ty: PhiType, merge: NodeId, values: Vec<NodeId>) -> NodeId {
        assert!(self.kind(merge).is_merge(), "{merge} is not a merge");

        let mut inputs = Vec::with_capacity(values.len() + 1);
        inputs.push(merge);
        inputs.extend(values);

        self.add(NodeKind::Phi { ty }, inputs)
    }

    pub fn phis_at(&self, merge: NodeId) -> Vec<NodeId> {
        self.users_of_kind(merge, |kind| kind.is_phi())
            .into_iter()
            .filter(|phi| self.node(*phi).inputs[0] == merge)
            .collect()
    }

    pub fn phi_merge(&self, phi: NodeId) -> NodeId {
        assert!(self.kind(phi).is_phi(), "{phi} is not a phi");

        self.node(phi).inputs[0]
    }

    pub fn phi_values(&self, phi: NodeId) -> &[NodeId] {
        assert!(self.kind(phi).is_phi(), "{phi} is not a phi");

        &self.node(phi).inputs[1..]
    }

    pub fn add_phi_input(&mut self, phi: NodeId, value: NodeId) {
        assert!(self.kind(phi).is_phi(), "{phi} is not a phi");

        self.add_input(phi, value);
    }

    pub fn is_phi_at_merge(&self, node: NodeId, merge: NodeId) -> bool {
        self.kind(node).is_phi() && self.phi_merge(node) == merge
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location_map::{Location, LocationIdentity};

    fn read_kind() -> NodeKind {
        NodeKind::Read {
            location: Location::constant(LocationIdentity::ANY, 8),
            null_check: false,
        }
    }

    #[test]
    fn new_graph_has_only_start() {
        let graph = Graph::new();

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.kind(graph.start()), NodeKind::Start);
    }

    #[test]
    fn unique_deduplicates_floating_nodes() {
        let mut graph = Graph::new();
        let p = graph.unique(NodeKind::Parameter { index: 0 }, vec![]);
        let a = graph.unique(NodeKind::IsNull, vec![p]);
        let b = graph.unique(NodeKind::IsNull, vec![p]);
        let c = graph.add(NodeKind::IsNull, vec![p]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(graph.node(p).usages().len(), 2);
    }

    #[test]
    fn unique_ignores_deleted_entries() {
        let mut graph = Graph::new();
        let p = graph.unique(NodeKind::Parameter { index: 0 }, vec![]);
        let a = graph.unique(NodeKind::IsNull, vec![p]);

        graph.delete(a);

        let b = graph.unique(NodeKind::IsNull, vec![p]);

        assert_ne!(a, b);
        assert!(graph.is_alive(b));
    }

    #[test]
    fn add_after_and_before_fixed() {
        let mut graph = Graph::new();
        let start = graph.start();
        let ret = graph.add(NodeKind::Return, vec![]);
        graph.set_next(start, ret);

        let invoke = graph.add(NodeKind::Invoke, vec![]);
        graph.add_after_fixed(start, invoke);

        assert_eq!(graph.node(start).next(), Some(invoke));
        assert_eq!(graph.node(invoke).next(), Some(ret));
        assert_eq!(graph.node(ret).predecessor(), Some(invoke));

        let barrier = graph.add(NodeKind::MemoryBarrier, vec![]);
        graph.add_before_fixed(ret, barrier);

        assert_eq!(graph.node(invoke).next(), Some(barrier));
        assert_eq!(graph.node(barrier).next(), Some(ret));
        assert_eq!(graph.node(ret).predecessor(), Some(barrier));
    }

    #[test]
    fn replace_fixed_with_floating_relinks_control() {
        let mut graph = Graph::new();
        let start = graph.start();
        let p = graph.unique(NodeKind::Parameter { index: 0 }, vec![]);
        let read = graph.add(read_kind(), vec![p]);
        let ret = graph.add(NodeKind::Return, vec![read]);
        graph.set_next(start, read);
        graph.set_next(read, ret);

        let floating = graph.unique(
            NodeKind::FloatingRead {
                location: Location::constant(LocationIdentity::ANY, 8),
            },
            vec![p, start],
        );
        graph.replace_fixed_with_floating(read, floating);

        assert!(!graph.is_alive(read));
        assert_eq!(graph.node(start).next(), Some(ret));
        assert_eq!(graph.node(ret).predecessor(), Some(start));
        assert_eq!(graph.node(ret).inputs(), &[floating]);
        assert_eq!(graph.node(floating).usages(), &[ret]);
        assert!(!graph.node(p).usages().contains(&read));
    }

    #[test]
    fn kill_removes_unused_floating_inputs() {
        let mut graph = Graph::new();
        let p = graph.unique(NodeKind::Parameter { index: 0 }, vec![]);
        let q = graph.unique(NodeKind::Parameter { index: 1 }, vec![]);
        let is_null = graph.unique(NodeKind::IsNull, vec![p]);
        let eq = graph.unique(NodeKind::IntegerEquals, vec![p, q]);
        let negated = graph.unique(NodeKind::LogicNegation, vec![is_null]);
        let shared = graph.unique(NodeKind::LogicNegation, vec![eq]);
        let or = graph.unique(
            NodeKind::ShortCircuitOr {
                negate_x: false,
                negate_y: false,
                probability: crate::ir::node::Probability::new(0.5),
            },
            vec![negated, shared],
        );
        let keep = graph.add(NodeKind::Return, vec![shared]);

        graph.kill_with_unused_floating_inputs(or);

        assert!(!graph.is_alive(or));
        assert!(!graph.is_alive(negated));
        assert!(!graph.is_alive(is_null));
        assert!(graph.is_alive(shared));
        assert!(graph.is_alive(eq));
        assert!(graph.is_alive(p));
        assert!(graph.is_alive(keep));
    }

    #[test]
    fn replace_at_usages_counts_each_edge() {
        let mut graph = Graph::new();
        let p = graph.unique(NodeKind::Parameter { index: 0 }, vec![]);
        let q = graph.unique(NodeKind::Parameter { index: 1 }, vec![]);
        let eq = graph.add(NodeKind::IntegerEquals, vec![p, p]);

        graph.replace_at_usages(p, q);

        assert_eq!(graph.node(eq).inputs(), &[q, q]);
        assert_eq!(graph.node(q).usages(), &[eq, eq]);
        assert!(graph.node(p).usages().is_empty());
    }

    #[test]
    fn phis_track_their_merge() {
        let mut graph = Graph::new();
        let e0 = graph.add(NodeKind::End, vec![]);
        let e1 = graph.add(NodeKind::End, vec![]);
        let merge = graph.add(NodeKind::Merge, vec![e0, e1]);
        let start = graph.start();
        let phi = graph.add_phi(PhiType::Memory, merge, vec![start]);

        graph.add_phi_input(phi, start);

        assert_eq!(graph.forward_ends(merge), &[e0, e1]);
        assert_eq!(graph.merge_of_end(e1), merge);
        assert_eq!(graph.phis_at(merge), vec![phi]);
        assert_eq!(graph.phi_values(phi), &[start, start]);
        assert!(graph.is_phi_at_merge(phi, merge));
        assert!(!graph.is_phi_at_merge(start, merge));
    }
}
