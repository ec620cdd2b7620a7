use rdkafka::error::KafkaError;
use tessera_bus::consumer::ConsumerError;
use thiserror::Error;

/// Errors that can occur in a Kafka consumer.
#[derive(Debug, Error)]
pub enum Error {
    /// Fetching the partition assignment failed.
    #[error("Failed to get assignment: {0}")]
    Assignment(KafkaError),

    /// The consumer was closed.
    #[error("Consumer is closed")]
    Closed,

    /// Creating the underlying consumer failed.
    #[error("Failed to create consumer: {0}")]
    Create(KafkaError),

    /// An unrecoverable client error, e.g. an authentication failure.
    #[error("Fatal consumer error: {0}")]
    Fatal(KafkaError),

    /// Subscribing failed.
    #[error("Failed to subscribe: {0}")]
    Subscribe(KafkaError),
}

impl ConsumerError for Error {}
