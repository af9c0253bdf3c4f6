mod floating_reads;
mod guard_lowering;
mod scheduled_iter;

pub use floating_reads::schedule_floating_reads;
pub use guard_lowering::{lower_guards, GuardLoweringConfig, GuardLoweringStats, TargetDescription};
pub use scheduled_iter::{BlockCursor, ScheduledNodeVisitor};
