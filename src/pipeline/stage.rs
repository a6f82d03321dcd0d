//! Stage identifiers, jobs, and the handler trait.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScrapeResult;

/// The pipeline's stages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum StageId {
    Leagues,
    Teams,
    TeamStats,
    Matches,
    LiveMatches,
}

impl StageId {
    pub const ALL: [StageId; 5] = [
        StageId::Leagues,
        StageId::Teams,
        StageId::TeamStats,
        StageId::Matches,
        StageId::LiveMatches,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leagues => "leagues",
            Self::Teams => "teams",
            Self::TeamStats => "team-stats",
            Self::Matches => "matches",
            Self::LiveMatches => "live-matches",
        }
    }

    /// Parse a stage name. Accepts kebab, snake and camel spellings.
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "leagues" => Some(Self::Leagues),
            "teams" => Some(Self::Teams),
            "teamstats" => Some(Self::TeamStats),
            "matches" => Some(Self::Matches),
            "livematches" => Some(Self::LiveMatches),
            _ => None,
        }
    }

    /// Stages whose pending work (and that of their immediate dependents)
    /// is cleared before each run.
    pub fn quiesces(&self) -> bool {
        matches!(self, Self::Teams | Self::TeamStats | Self::Matches)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation of a stage.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub stage: StageId,
    /// Opaque; empty (`null`) for scheduled and completion-triggered jobs.
    pub payload: serde_json::Value,
    /// Process-wide sequence id for log correlation.
    pub seq: u64,
    pub queued_at: DateTime<Utc>,
    /// Whether success triggers the downstream stages.
    pub cascade: bool,
}

impl Job {
    pub fn new(stage: StageId, payload: serde_json::Value, seq: u64) -> Self {
        Self {
            stage,
            payload,
            seq,
            queued_at: Utc::now(),
            cascade: true,
        }
    }
}

/// Summary a stage returns on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Records handed to the sink.
    pub emitted: usize,
    /// Limiter tasks that finished successfully.
    pub succeeded: usize,
    /// Limiter tasks that failed in isolation.
    pub failed: usize,
}

impl StageReport {
    pub fn emitted(emitted: usize) -> Self {
        Self {
            emitted,
            ..Default::default()
        }
    }
}

/// The work a stage does for one job.
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn run(&self, job: &Job) -> ScrapeResult<StageReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_spellings() {
        assert_eq!(StageId::from_str("team-stats"), Some(StageId::TeamStats));
        assert_eq!(StageId::from_str("team_stats"), Some(StageId::TeamStats));
        assert_eq!(StageId::from_str("TeamStats"), Some(StageId::TeamStats));
        assert_eq!(StageId::from_str("live-matches"), Some(StageId::LiveMatches));
        assert_eq!(StageId::from_str("fixtures"), None);
    }

    #[test]
    fn test_names_round_trip() {
        for id in StageId::ALL {
            assert_eq!(StageId::from_str(id.as_str()), Some(id));
        }
    }

    #[test]
    fn test_quiescing_stages() {
        assert!(!StageId::Leagues.quiesces());
        assert!(StageId::Teams.quiesces());
        assert!(StageId::TeamStats.quiesces());
        assert!(StageId::Matches.quiesces());
        assert!(!StageId::LiveMatches.quiesces());
    }
}
