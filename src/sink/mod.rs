//! Result sink seam.
//!
//! Stages hand records to a [`Publisher`], which serializes them and
//! forwards them to a [`RecordSink`]. Emission is fire-and-forget: a failed
//! publish is logged and never fails the stage.

#[cfg(feature = "amqp-broker")]
mod amqp;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{ScrapeError, ScrapeResult};
use crate::models::Topic;

#[cfg(feature = "amqp-broker")]
pub use amqp::AmqpSink;

/// Destination for emitted records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, topic: Topic, payload: serde_json::Value) -> ScrapeResult<()>;
}

/// One emitted record.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: Topic,
    pub payload: serde_json::Value,
}

/// Writes every record to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl RecordSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, topic: Topic, payload: serde_json::Value) -> ScrapeResult<()> {
        info!(topic = %topic, payload = %payload, "Record");
        Ok(())
    }
}

/// Forwards records into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Published>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Published>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RecordSink for ChannelSink {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn publish(&self, topic: Topic, payload: serde_json::Value) -> ScrapeResult<()> {
        self.tx
            .send(Published { topic, payload })
            .map_err(|_| ScrapeError::Sink("receiver dropped".to_string()))
    }
}

/// Serializes records and publishes them without propagating failures.
#[derive(Clone)]
pub struct Publisher {
    sink: Arc<dyn RecordSink>,
}

impl Publisher {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self { sink }
    }

    /// Publish one record. Returns whether it was handed off.
    pub async fn emit<T: Serialize + ?Sized>(&self, topic: Topic, record: &T) -> bool {
        let payload = match serde_json::to_value(record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(topic = %topic, "Failed to serialize record: {}", e);
                return false;
            }
        };

        match self.sink.publish(topic, payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!(topic = %topic, sink = self.sink.name(), "Publish failed: {}", e);
                false
            }
        }
    }

    /// Publish each record in order. Returns how many were handed off.
    pub async fn emit_all<T: Serialize>(&self, topic: Topic, records: &[T]) -> usize {
        let mut sent = 0;
        for record in records {
            if self.emit(topic, record).await {
                sent += 1;
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::League;

    struct FailingSink;

    #[async_trait]
    impl RecordSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn publish(&self, _topic: Topic, _payload: serde_json::Value) -> ScrapeResult<()> {
            Err(ScrapeError::Sink("broker down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_channel_sink_receives_payload() {
        let (sink, mut rx) = ChannelSink::new();
        let publisher = Publisher::new(Arc::new(sink));
        let league = League::new("premier-league", "/en/football/england/premier-league/", "england");

        assert!(publisher.emit(Topic::LeaguesCreated, &league).await);

        let published = rx.recv().await.unwrap();
        assert_eq!(published.topic, Topic::LeaguesCreated);
        assert_eq!(published.payload["sourceURL"], "/en/football/england/premier-league/");
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let publisher = Publisher::new(Arc::new(FailingSink));
        let sent = publisher
            .emit_all(Topic::TeamsCreated, &["a".to_string(), "b".to_string()])
            .await;
        assert_eq!(sent, 0);
    }
}
