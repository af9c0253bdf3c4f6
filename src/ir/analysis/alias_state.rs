use super::super::graph::Graph;
use super::super::node::{NodeId, NodeKind, PhiType};
use crate::location_map::LocationIdentity;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

pub type FrameId = usize;

/// The last accessor of every location along one control flow path.
///
/// Indexed by `LocationIdentity`, so cloning at a split is a flat copy.
/// `ANY` is always present once the state has been seeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasState {
    last_access: Vec<Option<NodeId>>,
    loops: SmallVec<[FrameId; 4]>,
}

impl AliasState {
    /// A state where all memory was last touched by `fence`.
    pub fn new(fence: NodeId) -> Self {
        let mut this = Self {
            last_access: vec![],
            loops: SmallVec::new(),
        };

        this.set(LocationIdentity::ANY, fence);
        this
    }

    pub fn get(&self, location: LocationIdentity) -> Option<NodeId> {
        self.last_access.get(location.index()).copied().flatten()
    }

    pub fn any(&self) -> NodeId {
        self.get(LocationIdentity::ANY)
            .unwrap_or_else(|| panic!("alias state lost its ANY entry"))
    }

    pub fn get_or_any(&self, location: LocationIdentity) -> NodeId {
        self.get(location).unwrap_or_else(|| self.any())
    }

    pub fn set(&mut self, location: LocationIdentity, node: NodeId) {
        let index = location.index();

        if index >= self.last_access.len() {
            self.last_access.resize(index + 1, None);
        }

        self.last_access[index] = Some(node);
    }

    pub fn is_tracked(&self, location: LocationIdentity) -> bool {
        self.get(location).is_some()
    }

    /// Tracked locations in identity order, `ANY` first.
    pub fn tracked(&self) -> impl Iterator<Item = (LocationIdentity, NodeId)> + '_ {
        self.last_access
            .iter()
            .enumerate()
            .filter_map(|(i, access)| access.map(|node| (LocationIdentity::from_index(i), node)))
    }

    pub fn loop_depth(&self) -> usize {
        self.loops.len()
    }

    pub fn innermost_loop(&self) -> Option<FrameId> {
        self.loops.last().copied()
    }

    fn clear(&mut self) {
        self.last_access.clear();
    }
}

#[derive(Debug)]
pub struct LoopFrame {
    header: NodeId,
    /// The state reaching the loop from outside, before any header phi.
    entry: AliasState,
    header_any: NodeId,
    phis: Vec<(NodeId, LocationIdentity)>,
    location_phis: FxHashMap<LocationIdentity, NodeId>,
    end_states: Option<Vec<AliasState>>,
}

impl LoopFrame {
    pub fn header(&self) -> NodeId {
        self.header
    }

    pub fn entry(&self) -> &AliasState {
        &self.entry
    }

    /// Phis this loop owns, with the location each one tracks.
    pub fn phis(&self) -> &[(NodeId, LocationIdentity)] {
        &self.phis
    }

    pub fn phi_for(&self, location: LocationIdentity) -> Option<NodeId> {
        self.location_phis.get(&location).copied()
    }

    fn record(&mut self, phi: NodeId, location: LocationIdentity) {
        self.phis.push((phi, location));
        self.location_phis.insert(location, phi);
    }
}

/// Owns the loop frames of one pass invocation and implements every
/// transition of an `AliasState` that creates nodes.
#[derive(Debug, Default)]
pub struct AliasTracker {
    frames: Vec<LoopFrame>,
    frame_of: FxHashMap<NodeId, FrameId>,
}

impl AliasTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self, id: FrameId) -> &LoopFrame {
        &self.frames[id]
    }

    pub fn frame_of(&self, header: NodeId) -> Option<&LoopFrame> {
        self.frame_of.get(&header).map(|id| &self.frames[*id])
    }

    /// Normalizes `state`, the state at forward end 0, against the states at
    /// the remaining ends. A phi is only created where values disagree.
    pub fn merge(&mut self, graph: &mut Graph, merge: NodeId, state: &mut AliasState, others: &[AliasState]) {
        if others.is_empty() {
            return;
        }

        debug_assert!(others.iter().all(|other| other.loops == state.loops));

        let width = others
            .iter()
            .map(|other| other.last_access.len())
            .fold(state.last_access.len(), usize::max);
        let mut updates = vec![];

        for index in 0..width {
            let location = LocationIdentity::from_index(index);
            let tracked = state.is_tracked(location) || others.iter().any(|other| other.is_tracked(location));

            if !tracked {
                continue;
            }

            let local = state.get_or_any(location);

            // `state` comes from forward end 0, so it never holds a phi of this merge yet
            debug_assert!(!graph.is_phi_at_merge(local, merge));

            let incoming: Vec<NodeId> = others.iter().map(|other| other.get_or_any(location)).collect();

            if incoming.iter().all(|value| *value == local) {
                updates.push((location, local));
                continue;
            }

            let mut values = Vec::with_capacity(incoming.len() + 1);
            values.push(local);
            values.extend(incoming);

            let phi = graph.add_phi(PhiType::Memory, merge, values);

            debug!("phi {phi} @ {merge} for {location}");
            updates.push((location, phi));
        }

        for (location, value) in updates {
            state.set(location, value);
        }
    }

    /// Pushes a frame for `header` and gives every tracked location a
    /// single input phi, completed once the backedges are known.
    pub fn loop_begin(&mut self, graph: &mut Graph, header: NodeId, state: &mut AliasState) {
        let entry = state.clone();
        let mut phis = vec![];
        let mut location_phis = FxHashMap::default();
        let tracked: Vec<(LocationIdentity, NodeId)> = state.tracked().collect();

        for (location, value) in tracked {
            let phi = graph.add_phi(PhiType::Memory, header, vec![value]);

            state.set(location, phi);
            phis.push((phi, location));
            location_phis.insert(location, phi);
        }

        let frame = LoopFrame {
            header,
            entry,
            header_any: state.any(),
            phis,
            location_phis,
            end_states: None,
        };

        let id = self.frames.len();

        debug!("loop {header}: frame {id} with {} phis", frame.phis.len());

        self.frames.push(frame);
        self.frame_of.insert(header, id);
        state.loops.push(id);
    }

    /// Records the states at the backedges of `header` and completes every
    /// phi of the loop still waiting for them.
    pub fn loop_ends(&mut self, graph: &mut Graph, header: NodeId, end_states: Vec<AliasState>) {
        let id = *self
            .frame_of
            .get(&header)
            .unwrap_or_else(|| panic!("loop ends of {header} reached before its header"));
        let frame = &mut self.frames[id];

        for (phi, location) in frame.phis.iter() {
            if graph.phi_values(*phi).len() != 1 {
                continue;
            }

            for end in end_states.iter() {
                graph.add_phi_input(*phi, end.get_or_any(*location));
            }

            trace!("completed {phi} for {location} at {header}");
        }

        frame.end_states = Some(end_states);
    }

    /// Wraps every tracked value in a proxy for `exit` and leaves the loop.
    pub fn loop_exit(&mut self, graph: &mut Graph, exit: NodeId, state: &mut AliasState) {
        let tracked: Vec<(LocationIdentity, NodeId)> = state.tracked().collect();

        for (location, value) in tracked {
            let proxy = graph.unique(NodeKind::ValueProxy { ty: PhiType::Memory }, vec![value, exit]);

            state.set(location, proxy);
        }

        let popped = state
            .loops
            .pop()
            .unwrap_or_else(|| panic!("{exit} leaves a loop that was never entered"));
        let header = graph.loop_begin_of(exit);

        assert_eq!(
            self.frames[popped].header, header,
            "{exit} exits {header} but the innermost loop is {}",
            self.frames[popped].header
        );
    }

    pub fn write(&mut self, state: &mut AliasState, location: LocationIdentity, write: NodeId) {
        if location.is_any() {
            state.clear();
        }

        state.set(location, write);
    }

    /// A universal fence: every tracked location and `ANY` now point at
    /// `checkpoint`.
    pub fn checkpoint(&mut self, state: &mut AliasState, checkpoint: NodeId) {
        for access in state.last_access.iter_mut().flatten() {
            *access = checkpoint;
        }

        state.set(LocationIdentity::ANY, checkpoint);
    }

    /// The node a read of `location` must be ordered after, or `None` for
    /// `FINAL`. The answer is memoized into `state`.
    pub fn last_access(
        &mut self,
        graph: &mut Graph,
        state: &mut AliasState,
        location: LocationIdentity,
    ) -> Option<NodeId> {
        if location.is_final() {
            assert!(
                !state.is_tracked(location),
                "read of the final location after a recorded write"
            );

            return None;
        }

        if let Some(access) = state.get(location) {
            trace!("last access of {location} -> directly {access}");
            return Some(access);
        }

        let access = self.resolve_untracked(graph, state, location);

        debug!("last access of {location} -> {access} (depth {})", state.loop_depth());
        state.set(location, access);

        Some(access)
    }

    /// Walks outward over the enclosing loops. A loop needs a phi for
    /// `location` as long as memory was not clobbered in it, which shows as
    /// `ANY` still being the header phi. Phis are created outermost first,
    /// each one seeding the next.
    fn resolve_untracked(&mut self, graph: &mut Graph, state: &AliasState, location: LocationIdentity) -> NodeId {
        let mut pending: Vec<FrameId> = vec![];
        let mut view = state;

        let seed = loop {
            if let Some(access) = view.get(location) {
                break access;
            }

            let any = view.any();
            let Some(id) = view.innermost_loop() else {
                break any;
            };
            let frame = &self.frames[id];

            if any != frame.header_any {
                break any;
            }

            if let Some(phi) = frame.phi_for(location) {
                break phi;
            }

            pending.push(id);
            view = &frame.entry;
        };

        pending
            .into_iter()
            .rev()
            .fold(seed, |value, id| self.add_loop_phi(graph, id, location, value))
    }

    fn add_loop_phi(&mut self, graph: &mut Graph, id: FrameId, location: LocationIdentity, seed: NodeId) -> NodeId {
        let frame = &mut self.frames[id];
        let phi = graph.add_phi(PhiType::Memory, frame.header, vec![seed]);

        frame.record(phi, location);

        if let Some(end_states) = frame.end_states.as_ref() {
            for end in end_states.iter() {
                graph.add_phi_input(phi, end.get_or_any(location));
            }
        }

        debug!("loop phi {phi} @ {} for {location} seeded with {seed}", frame.header);

        phi
    }
}
