//! Event dedup cache.
//!
//! Turns repeated full-snapshot polls of a match page into the events that
//! appeared since the previous poll.

mod memory;
mod store;

use std::sync::Arc;

use tracing::debug;

use crate::error::ScrapeResult;
use crate::models::MatchEvent;

pub use memory::InMemoryEventStore;
pub use store::EventStore;

/// Classifies polled events as seen or new.
///
/// While the store is in baseline mode every observation is stored and
/// nothing is reported. A key observed for the first time after that is
/// also treated as a baseline, so a match never reports its history on the
/// poll that discovers it.
#[derive(Clone)]
pub struct EventDedupCache {
    store: Arc<dyn EventStore>,
}

impl EventDedupCache {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryEventStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Record `current` as the snapshot for `key` and return the events not
    /// present in the previous snapshot.
    ///
    /// The stored snapshot is replaced, not merged.
    pub async fn observe(&self, key: &str, current: Vec<MatchEvent>) -> ScrapeResult<Vec<MatchEvent>> {
        let baseline = self.store.is_baseline().await?;
        let previous = self.store.get(key).await?;

        let fresh = match (baseline, previous.as_deref()) {
            (false, Some(previous)) => current
                .iter()
                .filter(|event| !previous.contains(event))
                .cloned()
                .collect(),
            _ => {
                debug!(key, events = current.len(), baseline, "Storing baseline snapshot");
                Vec::new()
            }
        };

        self.store.put(key, current).await?;
        Ok(fresh)
    }

    /// Leave baseline mode. Call once every key of a poll has been observed.
    pub async fn complete_poll(&self) -> ScrapeResult<()> {
        if self.store.is_baseline().await? {
            self.store.mark_baselined().await?;
            debug!("Event dedup baseline complete");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;

    fn goal() -> MatchEvent {
        MatchEvent::new("1'", "A", "B", EventKind::FootballGoal)
    }

    fn card() -> MatchEvent {
        MatchEvent::new("10'", "C", "D", EventKind::FootballYellowCard)
    }

    #[tokio::test]
    async fn test_baseline_then_new_event() {
        let cache = EventDedupCache::in_memory();

        let first = cache.observe("m1", vec![goal()]).await.unwrap();
        assert!(first.is_empty());
        cache.complete_poll().await.unwrap();

        let second = cache.observe("m1", vec![goal(), card()]).await.unwrap();
        assert_eq!(second, vec![card()]);
    }

    #[tokio::test]
    async fn test_identical_snapshot_is_idempotent() {
        let cache = EventDedupCache::in_memory();
        cache.observe("m1", vec![goal(), card()]).await.unwrap();
        cache.complete_poll().await.unwrap();

        assert!(cache.observe("m1", vec![goal(), card()]).await.unwrap().is_empty());
        assert!(cache.observe("m1", vec![goal(), card()]).await.unwrap().is_empty());

        let stored = cache.store().get("m1").await.unwrap().unwrap();
        assert_eq!(stored, vec![goal(), card()]);
    }

    #[tokio::test]
    async fn test_baseline_holds_until_poll_completes() {
        let cache = EventDedupCache::in_memory();
        cache.observe("m1", vec![goal()]).await.unwrap();

        // Same poll, still baseline
        assert!(cache.observe("m2", vec![goal(), card()]).await.unwrap().is_empty());
        assert!(cache.store().is_baseline().await.unwrap());
        assert_eq!(cache.store().tracked_keys().await.unwrap(), 2);

        cache.complete_poll().await.unwrap();
        assert!(!cache.store().is_baseline().await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_replaced_not_merged() {
        let cache = EventDedupCache::in_memory();
        cache.observe("m1", vec![goal()]).await.unwrap();
        cache.complete_poll().await.unwrap();

        // Goal disappears (e.g. overturned), then reappears
        assert_eq!(cache.observe("m1", vec![card()]).await.unwrap(), vec![card()]);
        let back = cache.observe("m1", vec![goal(), card()]).await.unwrap();
        assert_eq!(back, vec![goal()]);
    }

    #[tokio::test]
    async fn test_key_first_seen_after_baseline_reports_nothing() {
        let cache = EventDedupCache::in_memory();
        cache.complete_poll().await.unwrap();

        assert!(cache.observe("late", vec![goal()]).await.unwrap().is_empty());
        assert_eq!(cache.observe("late", vec![goal(), card()]).await.unwrap(), vec![card()]);
    }

    #[tokio::test]
    async fn test_half_time_sentinel_is_deduplicated() {
        let cache = EventDedupCache::in_memory();
        cache.observe("m1", vec![goal()]).await.unwrap();
        cache.complete_poll().await.unwrap();

        let first = cache
            .observe("m1", vec![goal(), MatchEvent::half_time()])
            .await
            .unwrap();
        assert_eq!(first, vec![MatchEvent::half_time()]);

        let again = cache
            .observe("m1", vec![goal(), MatchEvent::half_time()])
            .await
            .unwrap();
        assert!(again.is_empty());
    }
}
