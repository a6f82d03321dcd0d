//! Topics records are published on, one per entity kind.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    LeaguesCreated,
    TeamsCreated,
    MatchesCreated,
    TeamStatsUpdated,
    MatchEventNotify,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeaguesCreated => "leagues.created",
            Self::TeamsCreated => "teams.created",
            Self::MatchesCreated => "matches.created",
            Self::TeamStatsUpdated => "team-stats.updated",
            Self::MatchEventNotify => "match-event.notify",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "leagues.created" => Some(Self::LeaguesCreated),
            "teams.created" => Some(Self::TeamsCreated),
            "matches.created" => Some(Self::MatchesCreated),
            "team-stats.updated" => Some(Self::TeamStatsUpdated),
            "match-event.notify" => Some(Self::MatchEventNotify),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
