//! Reference-data query for the league list.
//!
//! Teams, TeamStats and Matches cannot run without it; any failure here is
//! reported as [`ScrapeError::UpstreamQuery`] and fails the stage run.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ScrapeError, ScrapeResult};
use crate::models::League;

/// Filter passed to the directory. Empty means every league.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeagueCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl LeagueCriteria {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, league: &League) -> bool {
        self.country
            .as_deref()
            .map_or(true, |country| league.country.eq_ignore_ascii_case(country))
    }
}

/// Request/reply source of known leagues.
#[async_trait]
pub trait LeagueDirectory: Send + Sync {
    async fn get_leagues(&self, criteria: &LeagueCriteria) -> ScrapeResult<Vec<League>>;
}

/// Fixed league list from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticLeagueDirectory {
    leagues: Vec<League>,
}

impl StaticLeagueDirectory {
    pub fn new(leagues: Vec<League>) -> Self {
        Self { leagues }
    }
}

#[async_trait]
impl LeagueDirectory for StaticLeagueDirectory {
    async fn get_leagues(&self, criteria: &LeagueCriteria) -> ScrapeResult<Vec<League>> {
        Ok(self
            .leagues
            .iter()
            .filter(|league| criteria.matches(league))
            .cloned()
            .collect())
    }
}

/// Queries a competitions service over HTTP: `GET <url>?country=..` → `[League]`.
pub struct HttpLeagueDirectory {
    client: reqwest::Client,
    url: String,
}

impl HttpLeagueDirectory {
    pub fn new(url: impl Into<String>, timeout: Duration) -> ScrapeResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("scorewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ScrapeError::Configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LeagueDirectory for HttpLeagueDirectory {
    async fn get_leagues(&self, criteria: &LeagueCriteria) -> ScrapeResult<Vec<League>> {
        debug!(url = %self.url, ?criteria, "Querying league directory");

        let response = self
            .client
            .get(&self.url)
            .query(criteria)
            .send()
            .await
            .map_err(|e| ScrapeError::UpstreamQuery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::UpstreamQuery(format!(
                "{} returned {}",
                self.url, status
            )));
        }

        let leagues: Vec<League> = response
            .json()
            .await
            .map_err(|e| ScrapeError::UpstreamQuery(format!("Invalid league list: {}", e)))?;

        debug!(count = leagues.len(), "League directory answered");
        Ok(leagues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leagues() -> Vec<League> {
        vec![
            League::new("premier-league", "/en/football/england/premier-league/", "england"),
            League::new("laliga", "/en/football/spain/laliga/", "spain"),
        ]
    }

    #[tokio::test]
    async fn test_static_directory_returns_all() {
        let directory = StaticLeagueDirectory::new(leagues());
        let all = directory.get_leagues(&LeagueCriteria::all()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_static_directory_filters_by_country() {
        let directory = StaticLeagueDirectory::new(leagues());
        let criteria = LeagueCriteria {
            country: Some("Spain".to_string()),
        };
        let spain = directory.get_leagues(&criteria).await.unwrap();
        assert_eq!(spain.len(), 1);
        assert_eq!(spain[0].name, "laliga");
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_upstream_error() {
        let directory =
            HttpLeagueDirectory::new("http://127.0.0.1:9/leagues", Duration::from_secs(2)).unwrap();
        let err = directory
            .get_leagues(&LeagueCriteria::all())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::UpstreamQuery(_)));
    }
}
