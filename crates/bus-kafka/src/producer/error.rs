use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use tessera_bus::producer::ProducerError;
use thiserror::Error;

/// Errors that can occur in a Kafka producer.
#[derive(Debug, Error)]
pub enum Error {
    /// The delivery report was dropped before it arrived.
    #[error("Delivery report canceled")]
    Canceled,

    /// Creating the underlying producer failed.
    #[error("Failed to create producer: {0}")]
    Create(KafkaError),

    /// The broker rejected a record.
    #[error("Failed to deliver record: {0}")]
    Delivery(KafkaError),

    /// Flushing timed out or failed.
    #[error("Failed to flush producer: {0}")]
    Flush(KafkaError),

    /// The blocking flush task panicked or was cancelled.
    #[error("Flush task failed: {0}")]
    FlushTask(tokio::task::JoinError),

    /// The record uses a feature the client does not support.
    #[error("Not implemented: {0}")]
    NotImplemented(KafkaError),

    /// The local queue is full.
    #[error("Producer queue is full: {0}")]
    QueueFull(KafkaError),

    /// Enqueueing the record failed.
    #[error("Failed to send record: {0}")]
    Send(KafkaError),
}

impl Error {
    pub(crate) fn from_send(error: KafkaError) -> Self {
        match error.rdkafka_error_code() {
            Some(RDKafkaErrorCode::QueueFull) => Self::QueueFull(error),
            Some(RDKafkaErrorCode::NotImplemented) => Self::NotImplemented(error),
            _ => Self::Send(error),
        }
    }
}

impl ProducerError for Error {}
