use async_trait::async_trait;

use crate::error::Result;

pub mod kafka;

pub use kafka::KafkaPublisher;

/// Sink for payment status events. Delivery is at-most-once from the
/// caller's point of view: a failed produce is reported, never retried.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn produce(&self, topic: &str, message: &[u8]) -> Result<()>;
}
