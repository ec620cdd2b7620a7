use crate::message::{Message, TopicPartition};

use std::error::Error;
use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

/// Marker trait for consumer transport errors
pub trait ConsumerError: Error + Send + Sync + 'static {}

/// A trait representing the subscribe/poll side of a message bus client.
#[async_trait]
pub trait ConsumerTransport
where
    Self: Debug + Send + Sync + 'static,
{
    /// The error type for the consumer.
    type Error: ConsumerError;

    /// Subscribes to the given topics, replacing any previous subscription.
    async fn subscribe(&self, topics: &[String]) -> Result<(), Self::Error>;

    /// Waits up to `timeout` for the next poll result.
    ///
    /// A returned message may carry a per-record error such as an
    /// end-of-partition marker.
    async fn poll(&self, timeout: Duration) -> Result<Option<Message>, Self::Error>;

    /// Returns the partitions currently assigned to this consumer.
    async fn assignment(&self) -> Result<Vec<TopicPartition>, Self::Error>;

    /// Releases the subscription. Later calls fail.
    async fn close(&self) -> Result<(), Self::Error>;
}
