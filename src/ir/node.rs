use crate::location_map::Location;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(super) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A branch probability in `[0, 1]`, stored as raw bits so kinds stay
/// hashable for interning.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Probability(u64);

impl Probability {
    pub fn new(p: f64) -> Self {
        assert!((0.0..=1.0).contains(&p), "invalid probability {p}");

        Self(p.to_bits())
    }

    pub fn value(self) -> f64 {
        f64::from_bits(self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PhiType {
    Value,
    Memory,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeoptReason {
    NullCheckException,
    BoundsCheckException,
    ClassCastException,
    ArithmeticException,
    UnreachedCode,
    TypeCheckedInliningViolated,
    RuntimeConstraint,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeoptAction {
    None,
    RecompileIfTooManyDeopts,
    InvalidateReprofile,
    InvalidateRecompile,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // fixed
    Start,
    Begin,
    End,
    Merge,
    LoopBegin,
    LoopEnd,
    LoopExit,
    If { true_probability: Probability },
    Read { location: Location, null_check: bool },
    Write { location: Location, null_check: bool },
    Invoke,
    MemoryBarrier,
    ValueAnchor,
    NullCheck,
    Deoptimize { action: DeoptAction, reason: DeoptReason },
    Return,

    // floating
    Parameter { index: u32 },
    Constant { value: i64 },
    NullConstant,
    IsNull,
    IntegerEquals,
    IntegerLessThan,
    LogicNegation,
    ShortCircuitOr { negate_x: bool, negate_y: bool, probability: Probability },
    Phi { ty: PhiType },
    ValueProxy { ty: PhiType },
    FloatingRead { location: Location },
    Guard { reason: DeoptReason, action: DeoptAction, negated: bool },
}

impl NodeKind {
    pub fn is_fixed(&self) -> bool {
        matches!(
            self,
            NodeKind::Start
                | NodeKind::Begin
                | NodeKind::End
                | NodeKind::Merge
                | NodeKind::LoopBegin
                | NodeKind::LoopEnd
                | NodeKind::LoopExit
                | NodeKind::If { .. }
                | NodeKind::Read { .. }
                | NodeKind::Write { .. }
                | NodeKind::Invoke
                | NodeKind::MemoryBarrier
                | NodeKind::ValueAnchor
                | NodeKind::NullCheck
                | NodeKind::Deoptimize { .. }
                | NodeKind::Return
        )
    }

    pub fn is_floating(&self) -> bool {
        !self.is_fixed()
    }

    /// Fixed nodes with exactly one control successor.
    pub fn is_fixed_with_next(&self) -> bool {
        matches!(
            self,
            NodeKind::Start
                | NodeKind::Begin
                | NodeKind::Merge
                | NodeKind::LoopBegin
                | NodeKind::LoopExit
                | NodeKind::Read { .. }
                | NodeKind::Write { .. }
                | NodeKind::Invoke
                | NodeKind::MemoryBarrier
                | NodeKind::ValueAnchor
                | NodeKind::NullCheck
        )
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, NodeKind::Merge | NodeKind::LoopBegin)
    }

    pub fn is_control_split(&self) -> bool {
        matches!(self, NodeKind::If { .. })
    }

    /// Nodes after which control does not continue in the same block.
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            NodeKind::End
                | NodeKind::LoopEnd
                | NodeKind::If { .. }
                | NodeKind::Return
                | NodeKind::Deoptimize { .. }
        )
    }

    pub fn is_memory_checkpoint(&self) -> bool {
        matches!(self, NodeKind::Invoke | NodeKind::MemoryBarrier)
    }

    /// Nodes that capture the full frame state. A fault after one of these
    /// can no longer be attributed to a guard placed before it.
    pub fn has_state_after(&self) -> bool {
        matches!(self, NodeKind::Invoke)
    }

    pub fn is_access(&self) -> bool {
        matches!(
            self,
            NodeKind::Read { .. } | NodeKind::Write { .. } | NodeKind::FloatingRead { .. }
        )
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            NodeKind::Read { location, .. }
            | NodeKind::Write { location, .. }
            | NodeKind::FloatingRead { location } => Some(*location),
            _ => None,
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, NodeKind::Phi { .. })
    }

    pub fn is_memory_phi(&self) -> bool {
        matches!(self, NodeKind::Phi { ty: PhiType::Memory })
    }

    pub fn is_guard(&self) -> bool {
        matches!(self, NodeKind::Guard { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::Begin => "Begin",
            NodeKind::End => "End",
            NodeKind::Merge => "Merge",
            NodeKind::LoopBegin => "LoopBegin",
            NodeKind::LoopEnd => "LoopEnd",
            NodeKind::LoopExit => "LoopExit",
            NodeKind::If { .. } => "If",
            NodeKind::Read { .. } => "Read",
            NodeKind::Write { .. } => "Write",
            NodeKind::Invoke => "Invoke",
            NodeKind::MemoryBarrier => "MemoryBarrier",
            NodeKind::ValueAnchor => "ValueAnchor",
            NodeKind::NullCheck => "NullCheck",
            NodeKind::Deoptimize { .. } => "Deoptimize",
            NodeKind::Return => "Return",
            NodeKind::Parameter { .. } => "Parameter",
            NodeKind::Constant { .. } => "Constant",
            NodeKind::NullConstant => "Null",
            NodeKind::IsNull => "IsNull",
            NodeKind::IntegerEquals => "IntegerEquals",
            NodeKind::IntegerLessThan => "IntegerLessThan",
            NodeKind::LogicNegation => "LogicNegation",
            NodeKind::ShortCircuitOr { .. } => "ShortCircuitOr",
            NodeKind::Phi { .. } => "Phi",
            NodeKind::ValueProxy { .. } => "ValueProxy",
            NodeKind::FloatingRead { .. } => "FloatingRead",
            NodeKind::Guard { .. } => "Guard",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(super) kind: NodeKind,
    pub(super) inputs: Vec<NodeId>,
    pub(super) dependencies: Vec<NodeId>,
    pub(super) usages: Vec<NodeId>,
    pub(super) predecessor: Option<NodeId>,
    pub(super) successors: Vec<NodeId>,
}

impl Node {
    pub(super) fn new(kind: NodeKind, inputs: Vec<NodeId>, dependencies: Vec<NodeId>) -> Self {
        Self {
            kind,
            inputs,
            dependencies,
            usages: vec![],
            predecessor: None,
            successors: vec![],
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    pub fn usages(&self) -> &[NodeId] {
        &self.usages
    }

    pub fn predecessor(&self) -> Option<NodeId> {
        self.predecessor
    }

    pub fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    pub fn next(&self) -> Option<NodeId> {
        if self.kind.is_fixed_with_next() {
            self.successors.first().copied()
        } else {
            None
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.kind.is_fixed()
    }
}

impl fmt::Display for DeoptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for DeoptAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for DeoptReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reason = match s {
            "NullCheckException" => DeoptReason::NullCheckException,
            "BoundsCheckException" => DeoptReason::BoundsCheckException,
            "ClassCastException" => DeoptReason::ClassCastException,
            "ArithmeticException" => DeoptReason::ArithmeticException,
            "UnreachedCode" => DeoptReason::UnreachedCode,
            "TypeCheckedInliningViolated" => DeoptReason::TypeCheckedInliningViolated,
            "RuntimeConstraint" => DeoptReason::RuntimeConstraint,
            _ => return Err(format!("unknown deoptimization reason '{s}'")),
        };

        Ok(reason)
    }
}
