//! Config file discovery and parsing.

use std::path::Path;

use tracing::{debug, warn};

use super::Config;
use crate::error::{ScrapeError, ScrapeResult};

impl Config {
    /// Load configuration using prefer for discovery.
    ///
    /// Falls back to defaults when no file is found or the discovered file
    /// does not parse. Environment overrides are always applied.
    pub async fn load() -> Self {
        match prefer::load("scorewatch").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => return config,
                        Err(e) => warn!("Ignoring config at {}: {}", path.display(), e),
                    }
                }
            }
            Err(e) => debug!("No config file discovered: {}", e),
        }
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file.
    ///
    /// The format follows the extension: `.toml`, `.yaml`/`.yml`, else JSON.
    pub async fn load_from_path(path: &Path) -> ScrapeResult<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            ScrapeError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;

        if let Some(ref exe) = config.browser.chrome_executable {
            let expanded = shellexpand::tilde(&exe.to_string_lossy()).into_owned();
            config.browser.chrome_executable = Some(expanded.into());
        }

        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    /// Parse config text in the given format (`toml`, `yaml`/`yml`, anything else as JSON).
    pub fn parse(contents: &str, format: &str) -> ScrapeResult<Self> {
        match format {
            "toml" => toml::from_str(contents)
                .map_err(|e| ScrapeError::Configuration(format!("Failed to parse TOML config: {}", e))),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| ScrapeError::Configuration(format!("Failed to parse YAML config: {}", e))),
            _ => serde_json::from_str(contents)
                .map_err(|e| ScrapeError::Configuration(format!("Failed to parse JSON config: {}", e))),
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> ScrapeResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ScrapeError::Configuration(format!("Failed to render config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DirectoryConfig, SinkConfig};
    use crate::crawl::CrawlStrategy;

    #[test]
    fn test_parse_toml_sections() {
        let config = Config::parse(
            r#"
            base_url = "https://example.com"
            concurrency = 2
            prime = ["leagues", "live-matches"]

            [schedule]
            leagues = 600

            [crawl]
            matches_strategy = "index"

            [sink]
            kind = "amqp"
            url = "amqp://localhost:5672/%2f"

            [directory]
            kind = "static"

            [[directory.leagues]]
            id = "pl"
            name = "premier-league"
            sourceURL = "/en/football/england/premier-league/"
            country = "england"
            "#,
            "toml",
        )
        .unwrap();

        assert_eq!(config.concurrency, 2);
        assert_eq!(config.schedule.get("leagues"), Some(&600));
        assert!(config.schedule.get("live-matches").is_none());
        assert_eq!(config.crawl.matches_strategy, CrawlStrategy::Index);
        assert_eq!(config.crawl.settle_delay_ms, 1000);
        assert!(matches!(config.sink, SinkConfig::Amqp { ref exchange, .. } if exchange == "scorewatch"));
        match config.directory {
            DirectoryConfig::Static { ref leagues } => {
                assert_eq!(leagues[0].id.as_deref(), Some("pl"));
            }
            _ => panic!("expected static directory"),
        }
    }

    #[test]
    fn test_parse_yaml() {
        let config = Config::parse(
            "base_url: https://example.com\ndirectory:\n  kind: http\n  url: http://localhost:3000/leagues\n",
            "yml",
        )
        .unwrap();
        assert!(matches!(
            config.directory,
            DirectoryConfig::Http { timeout_secs: 30, .. }
        ));
    }

    #[test]
    fn test_bad_json_is_configuration_error() {
        let err = Config::parse("{ not json", "json").unwrap_err();
        assert!(matches!(err, ScrapeError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_load_from_path_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scorewatch.toml");
        std::fs::write(&path, "concurrency = 3\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_toml_round_trip() {
        let rendered = Config::default().to_toml().unwrap();
        let parsed = Config::parse(&rendered, "toml").unwrap();
        assert_eq!(parsed, Config::default());
    }
}
