//! Extraction boundary.
//!
//! An [`Extract`] turns a loaded page into typed records. The crawler and
//! the single-pass stages only see this trait; the DOM binding for the
//! livescore markup lives in [`livescore`].

pub mod livescore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::browser::PageHandle;
use crate::error::{ScrapeError, ScrapeResult};

pub use livescore::{
    LeagueLinks, LeagueTableRows, LiveMatchLinks, MatchDetail, MatchRows, MatchSnapshot,
};

/// Reads the records currently visible on a page.
#[async_trait]
pub trait Extract<T>: Send + Sync {
    async fn extract(&self, page: &dyn PageHandle) -> ScrapeResult<Vec<T>>;
}

/// Evaluate `script` and deserialize its result.
///
/// A `null`/`undefined` result deserializes as `R::default()`, so a page
/// where the container is missing reads as empty rather than failing.
pub async fn evaluate_as<R>(page: &dyn PageHandle, script: &str) -> ScrapeResult<R>
where
    R: DeserializeOwned + Default,
{
    let value = page.evaluate(script).await?;
    if value.is_null() {
        return Ok(R::default());
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ScrapeError::extraction(page.url().await, e)),
    }
}
