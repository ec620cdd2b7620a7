use tessera_bus::producer::ProducerError;
use thiserror::Error;

/// Errors that can occur in a memory producer.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// The topic name is not usable.
    #[error("Invalid topic name: {0:?}")]
    InvalidTopic(String),

    /// The local buffer is full.
    #[error("Producer queue is full ({0} records)")]
    QueueFull(usize),

    /// The broker refused the record.
    #[error("Broker rejected record for topic {0}")]
    Rejected(String),

    /// The record named a partition the topic does not have.
    #[error("Unknown partition {partition} for topic {topic}")]
    UnknownPartition {
        /// Destination topic.
        topic: String,

        /// Requested partition.
        partition: i32,
    },
}

impl ProducerError for Error {}
