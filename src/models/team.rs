//! Team and league-table records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub league_id: String,
    #[serde(rename = "sourceURL")]
    pub source_url: String,
}

/// One row of a league table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStats {
    pub position: u32,
    pub team_name: String,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub goal_diff: i32,
    pub points: u32,
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    #[serde(default)]
    pub league_id: String,
}

impl TeamStats {
    /// The team record this table row implies.
    pub fn team(&self) -> Team {
        Team {
            name: self.team_name.clone(),
            league_id: self.league_id.clone(),
            source_url: self.source_url.clone(),
        }
    }
}
