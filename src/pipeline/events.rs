//! Scheduler events and per-stage statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::stage::{StageId, StageReport};

/// What caused a job to be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriggerCause {
    /// `run_once` / CLI / startup priming.
    Manual,
    /// Recurring interval tick.
    Schedule,
    /// Successful completion of the named stage.
    Upstream(StageId),
}

/// Why a pending job was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DropReason {
    /// Cleared before a run of the named stage.
    Quiesced(StageId),
    Shutdown,
}

/// Progress events sent on the scheduler's optional channel.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    Queued {
        stage: StageId,
        seq: u64,
        cause: TriggerCause,
    },
    /// A pending job was replaced by a newer trigger.
    Coalesced {
        stage: StageId,
        replaced: u64,
        seq: u64,
    },
    Dropped {
        stage: StageId,
        seq: u64,
        reason: DropReason,
    },
    Started {
        stage: StageId,
        seq: u64,
    },
    Completed {
        stage: StageId,
        seq: u64,
        report: StageReport,
        elapsed: Duration,
    },
    Failed {
        stage: StageId,
        seq: u64,
        error: String,
    },
}

impl SchedulerEvent {
    pub fn stage(&self) -> StageId {
        match self {
            Self::Queued { stage, .. }
            | Self::Coalesced { stage, .. }
            | Self::Dropped { stage, .. }
            | Self::Started { stage, .. }
            | Self::Completed { stage, .. }
            | Self::Failed { stage, .. } => *stage,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum StageState {
    #[default]
    Idle,
    Running,
}

/// Counters kept for each registered stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageStats {
    pub state: StageState,
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub coalesced: u64,
    pub dropped: u64,
    pub last_error: Option<String>,
    pub last_report: Option<StageReport>,
    pub last_finished: Option<DateTime<Utc>>,
}
