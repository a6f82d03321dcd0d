//! Pipeline scheduler: stage graph, triggering, coalescing and schedules.

mod events;
mod scheduler;
mod stage;

pub use events::{DropReason, SchedulerEvent, StageState, StageStats, TriggerCause};
pub use scheduler::{Scheduler, SchedulerHandle, StageSummary};
pub use stage::{Job, StageHandler, StageId, StageReport};
