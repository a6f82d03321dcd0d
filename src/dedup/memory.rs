//! In-memory event store for single-process use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::EventStore;
use crate::error::ScrapeResult;
use crate::models::MatchEvent;

/// Snapshots keyed by match URL. Entries are never evicted.
#[derive(Debug)]
pub struct InMemoryEventStore {
    snapshots: RwLock<HashMap<String, Vec<MatchEvent>>>,
    baseline: AtomicBool,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            baseline: AtomicBool::new(true),
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get(&self, key: &str) -> ScrapeResult<Option<Vec<MatchEvent>>> {
        Ok(self.snapshots.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, events: Vec<MatchEvent>) -> ScrapeResult<()> {
        self.snapshots
            .write()
            .await
            .insert(key.to_string(), events);
        Ok(())
    }

    async fn is_baseline(&self) -> ScrapeResult<bool> {
        Ok(self.baseline.load(Ordering::Acquire))
    }

    async fn mark_baselined(&self) -> ScrapeResult<()> {
        self.baseline.store(false, Ordering::Release);
        Ok(())
    }

    async fn tracked_keys(&self) -> ScrapeResult<usize> {
        Ok(self.snapshots.read().await.len())
    }
}
