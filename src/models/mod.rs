//! Records emitted by the scraping stages.

mod event;
mod fixture;
mod league;
mod team;
mod topic;

pub use event::{EventKind, MatchEvent, MatchEventNotification, FULL_TIME_MINUTE, HALF_TIME_MINUTE};
pub use fixture::{current_year, parse_listing_date, Fixture, MatchResult};
pub use league::League;
pub use team::{Team, TeamStats};
pub use topic::Topic;
