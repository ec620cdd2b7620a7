use tessera_bus::consumer::ConsumerError;
use thiserror::Error;

/// Errors that can occur in a memory consumer.
#[derive(Debug, Error)]
pub enum Error {
    /// The consumer was closed.
    #[error("Consumer is closed")]
    Closed,

    /// Subscription to an empty topic list.
    #[error("No topics to subscribe to")]
    EmptySubscription,

    /// The broker was told to fail its consumers.
    #[error("Fatal consumer error: {0}")]
    Fatal(String),
}

impl ConsumerError for Error {}
