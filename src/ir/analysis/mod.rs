mod alias_state;
mod postorder;
mod schedule;

pub use alias_state::{AliasState, AliasTracker, FrameId, LoopFrame};
pub use postorder::ControlFlowVisitor;
pub use schedule::{BlockId, BlockSchedule, LoopChain, ScheduledBlock};
