//! AMQP (RabbitMQ) sink: JSON records on a topic exchange, routed by topic.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{debug, info};

use super::RecordSink;
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::Topic;

pub struct AmqpSink {
    // Held so the connection outlives the channel.
    _connection: Connection,
    channel: Channel,
    exchange: String,
}

impl AmqpSink {
    /// Connect and declare the (durable) topic exchange.
    pub async fn connect(url: &str, exchange: &str) -> ScrapeResult<Self> {
        info!(exchange, "Connecting to AMQP broker");

        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| ScrapeError::Sink(format!("Failed to connect to broker: {}", e)))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| ScrapeError::Sink(format!("Failed to open channel: {}", e)))?;

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ScrapeError::Sink(format!("Failed to declare exchange: {}", e)))?;

        Ok(Self {
            _connection: connection,
            channel,
            exchange: exchange.to_string(),
        })
    }
}

#[async_trait]
impl RecordSink for AmqpSink {
    fn name(&self) -> &'static str {
        "amqp"
    }

    async fn publish(&self, topic: Topic, payload: serde_json::Value) -> ScrapeResult<()> {
        let body = serde_json::to_vec(&payload).map_err(|e| ScrapeError::Sink(e.to_string()))?;

        self.channel
            .basic_publish(
                &self.exchange,
                topic.as_str(),
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| ScrapeError::Sink(e.to_string()))?
            .await
            .map_err(|e| ScrapeError::Sink(e.to_string()))?;

        debug!(topic = %topic, bytes = body.len(), "Published to broker");
        Ok(())
    }
}
