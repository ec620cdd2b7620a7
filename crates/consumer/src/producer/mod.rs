mod error;

pub use error::Error;

use crate::options::MessageProducerOptions;

use serde::Serialize;
use tessera_bus::producer::ProducerTransport;
use tessera_bus::Record;
use tracing::{debug, info};

/// Produces records one at a time, flushing after each so the record is
/// on the bus when the call returns.
#[derive(Debug)]
pub struct MessageProducer<P>
where
    P: ProducerTransport,
{
    options: MessageProducerOptions,
    transport: P,
}

impl<P> MessageProducer<P>
where
    P: ProducerTransport,
{
    /// Wraps `transport`.
    pub const fn new(transport: P, options: MessageProducerOptions) -> Self {
        Self { options, transport }
    }

    /// Sends `record` and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the send is refused or the flush
    /// reports a failed delivery.
    pub async fn produce(&self, record: Record) -> Result<(), Error<P::Error>> {
        let topic = record.topic.clone();

        self.transport.send(record).await.map_err(Error::Transport)?;

        info!("Flushing message to {topic}");
        self.transport
            .flush(self.options.flush_timeout)
            .await
            .map_err(Error::Transport)?;
        debug!("Flushed message to {topic}");

        Ok(())
    }

    /// Encodes `value` as JSON and produces it to `topic` without key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if `value` cannot be encoded, otherwise
    /// see [`produce`](Self::produce).
    pub async fn produce_json<T>(
        &self,
        topic: impl Into<String>,
        value: &T,
    ) -> Result<(), Error<P::Error>>
    where
        T: Serialize + ?Sized + Sync,
    {
        let payload = serde_json::to_vec(value).map_err(Error::Encode)?;
        self.produce(Record::to(topic).value(payload)).await
    }

    /// The options in use.
    pub const fn options(&self) -> &MessageProducerOptions {
        &self.options
    }

    /// The wrapped transport.
    pub const fn transport(&self) -> &P {
        &self.transport
    }
}
