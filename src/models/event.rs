//! Live match events and the notifications built from them.

use serde::{Deserialize, Serialize};

/// Minute label used for the synthesized half-time event.
pub const HALF_TIME_MINUTE: &str = "HT";
/// Minute label used for the synthesized full-time event.
pub const FULL_TIME_MINUTE: &str = "FT";

/// Event kinds, named after the icons the match page renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventKind {
    FootballGoal,
    FootballOwnGoal,
    FootballPenaltyGoal,
    FootballPenaltyMiss,
    FootballYellowCard,
    FootballRedCard,
    FootballYellowRedCard,
    FootballSubstitution,
    FootballVar,
    FootballHalfTime,
    FootballFullTime,
    /// Icon missing or not recognised.
    #[default]
    #[serde(other)]
    Unknown,
}

impl EventKind {
    pub fn from_icon(name: &str) -> Self {
        match name {
            "FootballGoal" => Self::FootballGoal,
            "FootballOwnGoal" => Self::FootballOwnGoal,
            "FootballPenaltyGoal" => Self::FootballPenaltyGoal,
            "FootballPenaltyMiss" => Self::FootballPenaltyMiss,
            "FootballYellowCard" => Self::FootballYellowCard,
            "FootballRedCard" => Self::FootballRedCard,
            "FootballYellowRedCard" => Self::FootballYellowRedCard,
            "FootballSubstitution" => Self::FootballSubstitution,
            "FootballVar" => Self::FootballVar,
            "FootballHalfTime" => Self::FootballHalfTime,
            "FootballFullTime" => Self::FootballFullTime,
            _ => Self::Unknown,
        }
    }
}

/// One row of a match's event timeline.
///
/// Equality is field-wise over all four fields; the dedup cache relies on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub minute: String,
    pub home_actor: String,
    pub away_actor: String,
    pub kind: EventKind,
}

impl MatchEvent {
    pub fn new(
        minute: impl Into<String>,
        home_actor: impl Into<String>,
        away_actor: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            minute: minute.into(),
            home_actor: home_actor.into(),
            away_actor: away_actor.into(),
            kind,
        }
    }

    pub fn half_time() -> Self {
        Self::new(HALF_TIME_MINUTE, "", "", EventKind::FootballHalfTime)
    }

    pub fn full_time() -> Self {
        Self::new(FULL_TIME_MINUTE, "", "", EventKind::FootballFullTime)
    }
}

/// Payload published on `match-event.notify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEventNotification {
    #[serde(rename = "homeTeamURL")]
    pub home_team_url: String,
    #[serde(rename = "awayTeamURL")]
    pub away_team_url: String,
    #[serde(rename = "leagueURL")]
    pub league_url: String,
    #[serde(rename = "matchURL")]
    pub match_url: String,
    pub event: MatchEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_icon() {
        assert_eq!(EventKind::from_icon(""), EventKind::Unknown);
        assert_eq!(EventKind::from_icon("FootballGoal"), EventKind::FootballGoal);
    }

    #[test]
    fn test_unrecognised_kind_deserializes_as_unknown() {
        let event: MatchEvent = serde_json::from_value(serde_json::json!({
            "minute": "12'",
            "homeActor": "Saka",
            "awayActor": "",
            "kind": "FootballCorner"
        }))
        .unwrap();
        assert_eq!(event.kind, EventKind::Unknown);
    }

    #[test]
    fn test_sentinels_compare_like_player_events() {
        assert_eq!(MatchEvent::half_time(), MatchEvent::half_time());
        assert_ne!(MatchEvent::half_time(), MatchEvent::full_time());
    }
}
