mod error;

pub use error::Error;

use crate::{AppendError, MemoryBroker};

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tessera_bus::producer::ProducerTransport;
use tessera_bus::Record;
use tracing::{debug, trace};

/// Options for the memory producer.
#[derive(Clone, Debug)]
pub struct MemoryProducerOptions {
    /// Maximum number of records buffered between flushes.
    pub queue_capacity: usize,
}

impl Default for MemoryProducerOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 100_000,
        }
    }
}

impl MemoryProducerOptions {
    /// Sets the buffer capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// A producer writing to a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryProducer {
    broker: MemoryBroker,
    options: MemoryProducerOptions,
    queue: Mutex<Vec<Record>>,
}

impl MemoryProducer {
    pub(crate) fn new(broker: MemoryBroker, options: MemoryProducerOptions) -> Self {
        Self {
            broker,
            options,
            queue: Mutex::new(Vec::new()),
        }
    }

    /// Number of records waiting for the next flush.
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }
}

#[async_trait]
impl ProducerTransport for MemoryProducer {
    type Error = Error;

    async fn send(&self, record: Record) -> Result<(), Self::Error> {
        if record.topic.is_empty() {
            return Err(Error::InvalidTopic(record.topic));
        }

        let mut queue = self.queue.lock();
        if queue.len() >= self.options.queue_capacity {
            return Err(Error::QueueFull(queue.len()));
        }

        trace!("Queued record for {}", record.topic);
        queue.push(record);

        Ok(())
    }

    async fn flush(&self, _timeout: Duration) -> Result<(), Self::Error> {
        let records = std::mem::take(&mut *self.queue.lock());
        let mut first_error = None;

        for record in records {
            let topic = record.topic.clone();
            match self.broker.append(record) {
                Ok((partition, offset)) => {
                    debug!("Delivered record to {topic} [{partition}] at offset {offset}");
                }
                Err(error) => {
                    let error = match error {
                        AppendError::Rejected => Error::Rejected(topic),
                        AppendError::UnknownPartition(partition) => {
                            Error::UnknownPartition { topic, partition }
                        }
                    };
                    debug!("Delivery failed: {error}");
                    first_error.get_or_insert(error);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
