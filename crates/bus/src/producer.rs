use crate::record::Record;

use std::error::Error;
use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

/// Marker trait for producer transport errors
pub trait ProducerError: Error + Send + Sync + 'static {}

/// A trait representing the send side of a message bus client.
#[async_trait]
pub trait ProducerTransport
where
    Self: Debug + Send + Sync + 'static,
{
    /// The error type for the producer.
    type Error: ProducerError;

    /// Queues a record for delivery.
    async fn send(&self, record: Record) -> Result<(), Self::Error>;

    /// Waits until every queued record has been delivered or failed.
    async fn flush(&self, timeout: Duration) -> Result<(), Self::Error>;
}
