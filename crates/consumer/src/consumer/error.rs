use std::time::Duration;

use tessera_bus::consumer::ConsumerError;
use thiserror::Error;

/// Errors returned by a [`BoundedConsumer`](super::BoundedConsumer).
#[derive(Debug, Error)]
pub enum Error<E>
where
    E: ConsumerError,
{
    /// The transport did not assign and catch up within the handshake limit.
    #[error("Partition assignment did not complete within {0:?}")]
    AssignmentTimedOut(Duration),

    /// The consumer was closed.
    #[error("Consumer is closed")]
    Closed,

    /// Explicit subscription to nothing.
    #[error("Subscription target is empty")]
    EmptyTarget,

    /// Retrieval before a completed subscription.
    #[error("Consumer is not subscribed")]
    NotSubscribed,

    /// Transport failure.
    #[error("Transport error: {0}")]
    Transport(#[source] E),
}

impl<E> Error<E>
where
    E: ConsumerError,
{
    /// Whether the error was caused by calling the consumer incorrectly
    /// rather than by the bus.
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::Closed | Self::EmptyTarget | Self::NotSubscribed)
    }
}
