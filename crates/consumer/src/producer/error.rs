use tessera_bus::producer::ProducerError;
use thiserror::Error;

/// Errors returned by a [`MessageProducer`](super::MessageProducer).
#[derive(Debug, Error)]
pub enum Error<E>
where
    E: ProducerError,
{
    /// The value could not be encoded as JSON.
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The transport refused the record or failed to deliver it.
    #[error("Transport error: {0}")]
    Transport(#[source] E),
}
