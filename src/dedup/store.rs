//! Pluggable storage for the live event dedup cache.
//!
//! The in-memory store covers a single process; an external store can be
//! substituted without touching the live stage.

use async_trait::async_trait;

use crate::error::ScrapeResult;
use crate::models::MatchEvent;

/// Capability the dedup cache needs from its state.
///
/// Implementations must be thread-safe and report backend failures as
/// [`ScrapeError::Store`](crate::error::ScrapeError::Store). Entries for
/// different keys are independent; the baseline flag is process-wide.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Last stored snapshot for a match, if the key has been seen.
    async fn get(&self, key: &str) -> ScrapeResult<Option<Vec<MatchEvent>>>;

    /// Replace the stored snapshot for a match.
    async fn put(&self, key: &str, events: Vec<MatchEvent>) -> ScrapeResult<()>;

    /// True until the first complete poll has been recorded.
    async fn is_baseline(&self) -> ScrapeResult<bool>;

    async fn mark_baselined(&self) -> ScrapeResult<()>;

    /// Number of tracked match keys.
    async fn tracked_keys(&self) -> ScrapeResult<usize>;
}
