//! Error taxonomy for stage runs and the tasks inside them.

use thiserror::Error;

/// Result type used across the scraping pipeline.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Bad stage graph, duplicate stage ids, invalid config. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Reference-data query failed. Fatal to the dependent stage run.
    #[error("Upstream query failed: {0}")]
    UpstreamQuery(String),
    /// A page failed to load or its markup did not match. Isolated to one task.
    #[error("Extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },
    /// Navigation or evaluation exceeded its time bound. Isolated to one task.
    #[error("Timed out after {seconds}s: {url}")]
    Timeout { url: String, seconds: u64 },
    /// Browser session failed to start. Fatal to the whole stage run.
    #[error("Browser session error: {0}")]
    Session(String),
    /// Event dedup store failed.
    #[error("Event store error: {0}")]
    Store(String),
    /// Publishing to the result sink failed.
    #[error("Sink error: {0}")]
    Sink(String),
}

impl ScrapeError {
    pub fn extraction(url: impl Into<String>, message: impl ToString) -> Self {
        ScrapeError::Extraction {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Whether this failure stays inside one limiter task instead of
    /// failing the stage run.
    pub fn is_task_local(&self) -> bool {
        matches!(
            self,
            ScrapeError::Extraction { .. } | ScrapeError::Timeout { .. }
        )
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(e: serde_json::Error) -> Self {
        ScrapeError::extraction("<payload>", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_local_classification() {
        assert!(ScrapeError::extraction("https://x", "no table").is_task_local());
        assert!(ScrapeError::Timeout {
            url: "https://x".to_string(),
            seconds: 120
        }
        .is_task_local());
        assert!(!ScrapeError::Session("launch".to_string()).is_task_local());
        assert!(!ScrapeError::UpstreamQuery("down".to_string()).is_task_local());
    }

    #[test]
    fn test_extraction_display_includes_url() {
        let err = ScrapeError::extraction("https://example.com/table", "missing #league-table");
        assert_eq!(
            err.to_string(),
            "Extraction failed for https://example.com/table: missing #league-table"
        );
    }
}
