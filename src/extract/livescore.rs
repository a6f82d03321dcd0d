//! DOM bindings for livescore.com pages.
//!
//! Scripts only collect raw strings; parsing and validation happen here in
//! Rust so malformed rows can be skipped with a log line.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{evaluate_as, Extract};
use crate::browser::PageHandle;
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::{EventKind, Fixture, League, MatchEvent, MatchResult, TeamStats};

/// Selector for the rendered rows of a virtualized match list.
pub const MATCH_ROW_INDEX_SELECTOR: &str = "[id$=\"__match-row\"][data-index]";

const LEAGUE_LINKS_SCRIPT: &str = r#"
Array.from(document.querySelectorAll('a[id*="category-header__link"]'))
    .map((a) => a.getAttribute('href'))
    .filter((href) => !!href)
"#;

const MATCH_ROWS_SCRIPT: &str = r#"
Array.from(document.querySelectorAll('[id$="__match-row"]')).map((row) => {
    const text = (sel) => {
        const el = row.querySelector(sel);
        return el ? el.textContent.trim() : null;
    };
    const status = row.querySelector('[id$="__match-row__status-or-time"]');
    const link = row.querySelector('a');
    return {
        homeTeam: text('[id$="__match-row__home-team-name"]'),
        awayTeam: text('[id$="__match-row__away-team-name"]'),
        date: status && status.previousElementSibling
            ? status.previousElementSibling.textContent.trim()
            : '',
        time: status ? status.textContent.trim() : '',
        homeScore: text('[id$="__match-row__home-team-score"]'),
        awayScore: text('[id$="__match-row__away-team-score"]'),
        href: link ? link.getAttribute('href') : null,
    };
})
"#;

const LEAGUE_TABLE_SCRIPT: &str = r#"
(() => {
    const table = document.getElementById('league-table');
    if (!table) return [];
    const rows = [];
    table.querySelectorAll('tbody tr').forEach((row) => {
        const name = row.querySelector('[id$="__league-column__name"] a');
        if (!name) return;
        const col = (key) => {
            const el = row.querySelector('[id$="__league-column__' + key + '"]');
            return el ? el.textContent.trim() : '';
        };
        rows.push({
            position: col('position'),
            teamName: name.textContent.trim(),
            played: col('played'),
            wins: col('wins'),
            draws: col('draws'),
            losses: col('losses'),
            goalsFor: col('goalsFor'),
            goalsAgainst: col('goalsAgainst'),
            goalDiff: col('goalsDiff'),
            points: col('points'),
            href: name.getAttribute('href'),
        });
    });
    return rows;
})()
"#;

const LIVE_MATCH_LINKS_SCRIPT: &str = r#"
Array.from(document.querySelectorAll('[id$="__match-row__live"]'))
    .map((row) => {
        const link = row.querySelector('a');
        return link ? link.getAttribute('href') : null;
    })
    .filter((href) => !!href)
"#;

const MATCH_DETAIL_SCRIPT: &str = r#"
(() => {
    const text = (root, sel) => {
        const el = root.querySelector(sel);
        return el ? el.textContent.trim() : '';
    };
    const href = (sel) => {
        const el = document.querySelector(sel);
        return el ? el.getAttribute('href') : null;
    };
    const events = Array.from(document.querySelectorAll('[id^="match-detail__event__"]'))
        .map((el) => {
            const icon = el.querySelector('.Vq svg');
            return {
                minute: text(el, '.ys'),
                homeActor: text(el, '.homePlayer .vs'),
                awayActor: text(el, '.awayPlayer .vs'),
                icon: icon ? icon.getAttribute('name') || '' : '',
            };
        });
    return {
        events,
        halfTime: !!document.querySelector('[id$="halfTimeShort"]'),
        fullTime: !!document.querySelector('[id$="fullTimeShort"]'),
        homeTeamUrl: href('[id$="match-detail_team-name_home-link"]'),
        awayTeamUrl: href('[id$="match-detail_team-name_away-link"]'),
        leagueUrl: href('[id$="category-header__link"]'),
    };
})()
"#;

/// League header links on the competitions landing page.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeagueLinks;

#[async_trait]
impl Extract<League> for LeagueLinks {
    async fn extract(&self, page: &dyn PageHandle) -> ScrapeResult<Vec<League>> {
        let hrefs: Vec<String> = evaluate_as(page, LEAGUE_LINKS_SCRIPT).await?;
        Ok(hrefs
            .iter()
            .filter_map(|href| {
                let league = League::from_href(href);
                if league.is_none() {
                    debug!(href, "Skipping league link with unexpected shape");
                }
                league
            })
            .collect())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMatchRow {
    home_team: Option<String>,
    away_team: Option<String>,
    #[serde(default)]
    date: String,
    #[serde(default)]
    time: String,
    home_score: Option<String>,
    away_score: Option<String>,
    href: Option<String>,
}

impl RawMatchRow {
    fn into_fixture(self, with_scores: bool) -> Option<Fixture> {
        let result = if with_scores {
            match (&self.home_score, &self.away_score) {
                (Some(home), Some(away)) => match (home.parse(), away.parse()) {
                    (Ok(home_score), Ok(away_score)) => Some(MatchResult {
                        home_score,
                        away_score,
                    }),
                    _ => None,
                },
                _ => None,
            }
        } else {
            None
        };

        Some(Fixture {
            home_team: self.home_team?,
            away_team: self.away_team?,
            date: self.date,
            time: self.time,
            utc_date: None,
            result,
            source_url: self.href?,
            league_id: String::new(),
        })
    }
}

/// Match rows on a league's fixtures or results page.
///
/// Rows come back unresolved: `league_id` and `utc_date` are filled in by
/// [`Fixture::resolve`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchRows {
    with_scores: bool,
}

impl MatchRows {
    pub fn fixtures() -> Self {
        Self { with_scores: false }
    }

    pub fn results() -> Self {
        Self { with_scores: true }
    }
}

#[async_trait]
impl Extract<Fixture> for MatchRows {
    async fn extract(&self, page: &dyn PageHandle) -> ScrapeResult<Vec<Fixture>> {
        let rows: Vec<RawMatchRow> = evaluate_as(page, MATCH_ROWS_SCRIPT).await?;
        let total = rows.len();
        let fixtures: Vec<Fixture> = rows
            .into_iter()
            .filter_map(|row| row.into_fixture(self.with_scores))
            .collect();
        if fixtures.len() < total {
            debug!(
                skipped = total - fixtures.len(),
                "Skipped match rows missing teams or link"
            );
        }
        Ok(fixtures)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTableRow {
    position: String,
    team_name: String,
    played: String,
    wins: String,
    draws: String,
    losses: String,
    goals_for: String,
    goals_against: String,
    goal_diff: String,
    points: String,
    href: Option<String>,
}

impl RawTableRow {
    fn parse(self) -> Result<TeamStats, String> {
        fn num<N: std::str::FromStr>(field: &str, value: &str) -> Result<N, String> {
            value
                .trim()
                .trim_start_matches('+')
                .parse()
                .map_err(|_| format!("{} is not a number: {:?}", field, value))
        }

        Ok(TeamStats {
            position: num("position", &self.position)?,
            played: num("played", &self.played)?,
            wins: num("wins", &self.wins)?,
            draws: num("draws", &self.draws)?,
            losses: num("losses", &self.losses)?,
            goals_for: num("goalsFor", &self.goals_for)?,
            goals_against: num("goalsAgainst", &self.goals_against)?,
            goal_diff: num("goalDiff", &self.goal_diff)?,
            points: num("points", &self.points)?,
            source_url: self.href.ok_or_else(|| "missing team link".to_string())?,
            team_name: self.team_name,
            league_id: String::new(),
        })
    }
}

/// Rows of `#league-table` on a league's table page.
///
/// A page without the table is an extraction failure; the source is known
/// to drop it on slow loads and the task should be reported, not silently
/// treated as an empty league.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeagueTableRows;

#[async_trait]
impl Extract<TeamStats> for LeagueTableRows {
    async fn extract(&self, page: &dyn PageHandle) -> ScrapeResult<Vec<TeamStats>> {
        let rows: Option<Vec<RawTableRow>> = evaluate_as(page, LEAGUE_TABLE_SCRIPT).await?;
        let rows = rows.unwrap_or_default();
        if rows.is_empty() {
            return Err(ScrapeError::extraction(
                page.url().await,
                "league table missing or empty",
            ));
        }

        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            let team = row.team_name.clone();
            match row.parse() {
                Ok(parsed) => stats.push(parsed),
                Err(reason) => warn!(team, "Skipping table row: {}", reason),
            }
        }
        Ok(stats)
    }
}

/// Match links on the live listing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveMatchLinks;

#[async_trait]
impl Extract<String> for LiveMatchLinks {
    async fn extract(&self, page: &dyn PageHandle) -> ScrapeResult<Vec<String>> {
        evaluate_as(page, LIVE_MATCH_LINKS_SCRIPT).await
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    minute: String,
    home_actor: String,
    away_actor: String,
    icon: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMatchDetail {
    #[serde(default)]
    events: Vec<RawEvent>,
    #[serde(default)]
    half_time: bool,
    #[serde(default)]
    full_time: bool,
    home_team_url: Option<String>,
    away_team_url: Option<String>,
    league_url: Option<String>,
}

/// Everything the live stage needs from one match page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSnapshot {
    /// Timeline in page order, with HT/FT markers appended.
    pub events: Vec<MatchEvent>,
    pub home_team_url: String,
    pub away_team_url: String,
    pub league_url: String,
}

impl From<RawMatchDetail> for MatchSnapshot {
    fn from(raw: RawMatchDetail) -> Self {
        let mut events: Vec<MatchEvent> = raw
            .events
            .into_iter()
            .map(|e| {
                MatchEvent::new(e.minute, e.home_actor, e.away_actor, EventKind::from_icon(&e.icon))
            })
            .collect();
        if raw.half_time {
            events.push(MatchEvent::half_time());
        }
        if raw.full_time {
            events.push(MatchEvent::full_time());
        }

        Self {
            events,
            home_team_url: raw.home_team_url.unwrap_or_default(),
            away_team_url: raw.away_team_url.unwrap_or_default(),
            league_url: raw.league_url.unwrap_or_default(),
        }
    }
}

/// The events tab of a single match page.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchDetail;

#[async_trait]
impl Extract<MatchSnapshot> for MatchDetail {
    async fn extract(&self, page: &dyn PageHandle) -> ScrapeResult<Vec<MatchSnapshot>> {
        let raw: RawMatchDetail = evaluate_as(page, MATCH_DETAIL_SCRIPT).await?;
        Ok(vec![raw.into()])
    }
}
