//! Configuration for scorewatch.
//!
//! Loaded from a TOML, YAML or JSON file (discovered with prefer or given
//! explicitly), then overridden from the environment.

pub mod browser;
mod loader;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crawl::{
    CrawlOptions, CrawlStrategy, DEFAULT_MAX_ITERATIONS, DEFAULT_REPEAT_THRESHOLD,
    DEFAULT_SCROLL_STEP,
};
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::livescore::MATCH_ROW_INDEX_SELECTOR;
use crate::models::League;
use crate::pipeline::StageId;

pub use browser::BrowserConfig;

/// Default source site.
pub const DEFAULT_BASE_URL: &str = "https://www.livescore.com";

/// Default pages open at once per browser session.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default AMQP exchange.
pub const DEFAULT_EXCHANGE: &str = "scorewatch";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Max concurrent pages per browser session.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Stages run once at startup.
    #[serde(default = "default_prime")]
    pub prime: Vec<String>,

    /// Stage name to interval in seconds. 0 disables the schedule.
    #[serde(default = "default_schedule")]
    pub schedule: BTreeMap<String, u64>,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub crawl: CrawlConfig,

    #[serde(default)]
    pub sink: SinkConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Path the config was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_prime() -> Vec<String> {
    vec![StageId::Leagues.as_str().to_string()]
}

fn default_schedule() -> BTreeMap<String, u64> {
    let mut schedule = BTreeMap::new();
    schedule.insert(StageId::Leagues.as_str().to_string(), 1800);
    schedule.insert(StageId::LiveMatches.as_str().to_string(), 60);
    schedule
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            concurrency: default_concurrency(),
            prime: default_prime(),
            schedule: default_schedule(),
            browser: BrowserConfig::default(),
            crawl: CrawlConfig::default(),
            sink: SinkConfig::default(),
            directory: DirectoryConfig::default(),
            source_path: None,
        }
    }
}

impl Config {
    /// Apply environment variable overrides.
    ///
    /// - `SCOREWATCH_BASE_URL` - Source site
    /// - `BROWSER_URL`, `CHROME_EXECUTABLE` - see [`BrowserConfig::with_env_overrides`]
    /// - `AMQP_URL` - Publish to this broker instead of the configured sink
    /// - `LEAGUES_URL` - Query this league directory over HTTP
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("SCOREWATCH_BASE_URL") {
            if !val.is_empty() {
                self.base_url = val;
            }
        }
        if let Ok(val) = std::env::var("AMQP_URL") {
            if !val.is_empty() {
                let exchange = match self.sink {
                    SinkConfig::Amqp { ref exchange, .. } => exchange.clone(),
                    SinkConfig::Log => DEFAULT_EXCHANGE.to_string(),
                };
                self.sink = SinkConfig::Amqp { url: val, exchange };
            }
        }
        if let Ok(val) = std::env::var("LEAGUES_URL") {
            if !val.is_empty() {
                let timeout_secs = match self.directory {
                    DirectoryConfig::Http { timeout_secs, .. } => timeout_secs,
                    DirectoryConfig::Static { .. } => default_directory_timeout(),
                };
                self.directory = DirectoryConfig::Http {
                    url: val,
                    timeout_secs,
                };
            }
        }
        self.browser = self.browser.with_env_overrides();
        self
    }

    /// Reject values that would only fail later at runtime.
    pub fn validate(&self) -> ScrapeResult<()> {
        url::Url::parse(&self.base_url).map_err(|e| {
            ScrapeError::Configuration(format!("invalid base_url {:?}: {}", self.base_url, e))
        })?;
        if self.concurrency == 0 {
            return Err(ScrapeError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.crawl.max_iterations == 0 {
            return Err(ScrapeError::Configuration(
                "crawl.max_iterations must be at least 1".to_string(),
            ));
        }
        self.intervals()?;
        self.prime_stages()?;
        Ok(())
    }

    /// Enabled schedules.
    pub fn intervals(&self) -> ScrapeResult<Vec<(StageId, Duration)>> {
        let mut intervals = Vec::new();
        for (name, secs) in &self.schedule {
            let id = parse_stage(name)?;
            if *secs > 0 {
                intervals.push((id, Duration::from_secs(*secs)));
            }
        }
        Ok(intervals)
    }

    pub fn prime_stages(&self) -> ScrapeResult<Vec<StageId>> {
        self.prime.iter().map(|name| parse_stage(name)).collect()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn parse_stage(name: &str) -> ScrapeResult<StageId> {
    StageId::from_str(name)
        .ok_or_else(|| ScrapeError::Configuration(format!("unknown stage {:?}", name)))
}

/// Scroll loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrawlConfig {
    #[serde(default = "default_scroll_step")]
    pub scroll_step: u32,

    /// Wait after each scroll before measuring, in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// The competitions landing page loads slower.
    #[serde(default = "default_leagues_settle_delay_ms")]
    pub leagues_settle_delay_ms: u64,

    #[serde(default = "default_repeat_threshold")]
    pub repeat_threshold: u32,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Termination policy for fixtures/results lists.
    #[serde(default)]
    pub matches_strategy: CrawlStrategy,

    /// Rendered-row selector for the index policy.
    #[serde(default = "default_index_selector")]
    pub index_selector: String,
}

fn default_scroll_step() -> u32 {
    DEFAULT_SCROLL_STEP
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_leagues_settle_delay_ms() -> u64 {
    1500
}

fn default_repeat_threshold() -> u32 {
    DEFAULT_REPEAT_THRESHOLD
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_index_selector() -> String {
    MATCH_ROW_INDEX_SELECTOR.to_string()
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            scroll_step: default_scroll_step(),
            settle_delay_ms: default_settle_delay_ms(),
            leagues_settle_delay_ms: default_leagues_settle_delay_ms(),
            repeat_threshold: default_repeat_threshold(),
            max_iterations: default_max_iterations(),
            matches_strategy: CrawlStrategy::default(),
            index_selector: default_index_selector(),
        }
    }
}

impl CrawlConfig {
    pub fn options(&self) -> CrawlOptions {
        CrawlOptions {
            scroll_step: self.scroll_step,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            max_iterations: self.max_iterations,
        }
    }

    pub fn leagues_options(&self) -> CrawlOptions {
        CrawlOptions {
            settle_delay: Duration::from_millis(self.leagues_settle_delay_ms),
            ..self.options()
        }
    }
}

/// Where records go.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    #[default]
    Log,
    Amqp {
        url: String,
        #[serde(default = "default_exchange")]
        exchange: String,
    },
}

fn default_exchange() -> String {
    DEFAULT_EXCHANGE.to_string()
}

/// Where the league list comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DirectoryConfig {
    Http {
        url: String,
        #[serde(default = "default_directory_timeout")]
        timeout_secs: u64,
    },
    Static {
        #[serde(default)]
        leagues: Vec<League>,
    },
}

fn default_directory_timeout() -> u64 {
    30
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        DirectoryConfig::Static {
            leagues: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_url(), "https://www.livescore.com");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.browser.navigation_timeout, 120);
        assert_eq!(config.browser.viewport_width, 1920);
        assert_eq!(config.crawl.repeat_threshold, 2);
        assert_eq!(config.prime_stages().unwrap(), vec![StageId::Leagues]);

        let intervals = config.intervals().unwrap();
        assert!(intervals.contains(&(StageId::Leagues, Duration::from_secs(1800))));
        assert!(intervals.contains(&(StageId::LiveMatches, Duration::from_secs(60))));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_stage_is_configuration_error() {
        let mut config = Config::default();
        config.schedule.insert("fixtures".to_string(), 60);
        assert!(matches!(
            config.validate(),
            Err(ScrapeError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_interval_disables_schedule() {
        let mut config = Config::default();
        config.schedule.insert("live-matches".to_string(), 0);
        let intervals = config.intervals().unwrap();
        assert_eq!(intervals, vec![(StageId::Leagues, Duration::from_secs(1800))]);
    }

    #[test]
    fn test_leagues_settle_delay() {
        let crawl = CrawlConfig::default();
        assert_eq!(crawl.options().settle_delay, Duration::from_millis(1000));
        assert_eq!(crawl.leagues_options().settle_delay, Duration::from_millis(1500));
    }
}
