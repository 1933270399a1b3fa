use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};

use crate::{
    error::{AppError, Result},
    events::EventPublisher,
};

/// Produces straight to the Kafka brokers and waits for the delivery report.
pub struct KafkaPublisher {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl std::fmt::Debug for KafkaPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaPublisher")
            .field("queue_timeout", &self.queue_timeout)
            .finish()
    }
}

impl KafkaPublisher {
    /// `message_timeout` bounds both the local queue wait and the broker acknowledgement.
    pub fn new(brokers: &str, message_timeout: Duration) -> Result<Self> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", message_timeout.as_millis().to_string())
            .create::<FutureProducer>()
            .map_err(|e| AppError::Publish(format!("Failed to create Kafka producer: {}", e)))?;

        Ok(Self {
            producer,
            queue_timeout: message_timeout,
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn produce(&self, topic: &str, message: &[u8]) -> Result<()> {
        tracing::info!("Publishing event to Kafka: topic={}", topic);

        let record: FutureRecord<'_, (), [u8]> = FutureRecord::to(topic)
            .payload(message)
            .timestamp(Utc::now().timestamp_millis());

        match self
            .producer
            .send(record, Timeout::After(self.queue_timeout))
            .await
        {
            Ok((partition, offset)) => {
                tracing::debug!("Delivered to {} partition {} offset {}", topic, partition, offset);
                Ok(())
            }
            Err((e, _)) => Err(AppError::Publish(format!("Kafka delivery to {} failed: {}", topic, e))),
        }
    }
}
