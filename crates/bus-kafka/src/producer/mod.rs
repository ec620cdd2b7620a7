mod error;

pub use error::Error;

use crate::config::KafkaProducerConfig;

use std::fmt::{self, Debug};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use tessera_bus::producer::ProducerTransport;
use tessera_bus::Record;
use tracing::debug;

/// A Kafka producer.
pub struct KafkaProducer {
    bootstrap_servers: String,
    pending: Mutex<Vec<DeliveryFuture>>,
    producer: FutureProducer,
}

impl Debug for KafkaProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaProducer")
            .field("bootstrap_servers", &self.bootstrap_servers)
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl KafkaProducer {
    /// Creates a producer.
    ///
    /// # Errors
    ///
    /// Returns an error if librdkafka rejects the configuration.
    pub fn new(config: &KafkaProducerConfig) -> Result<Self, Error> {
        let producer: FutureProducer = config.client_config().create().map_err(Error::Create)?;

        Ok(Self {
            bootstrap_servers: config.bootstrap_servers.clone(),
            pending: Mutex::new(Vec::new()),
            producer,
        })
    }

    fn headers(record: &Record) -> Option<OwnedHeaders> {
        if record.headers.is_empty() {
            return None;
        }

        Some(
            record
                .headers
                .iter()
                .fold(OwnedHeaders::new(), |headers, (key, value)| {
                    headers.insert(Header {
                        key: key.as_str(),
                        value: Some(&value[..]),
                    })
                }),
        )
    }
}

#[async_trait]
impl ProducerTransport for KafkaProducer {
    type Error = Error;

    async fn send(&self, record: Record) -> Result<(), Self::Error> {
        let future_record: FutureRecord<'_, [u8], [u8]> = FutureRecord {
            topic: &record.topic,
            partition: record.partition,
            payload: record.value.as_deref(),
            key: record.key.as_deref(),
            timestamp: record.timestamp,
            headers: Self::headers(&record),
        };

        let delivery = self
            .producer
            .send_result(future_record)
            .map_err(|(error, _)| Error::from_send(error))?;
        self.pending.lock().push(delivery);

        Ok(())
    }

    async fn flush(&self, timeout: Duration) -> Result<(), Self::Error> {
        let pending = std::mem::take(&mut *self.pending.lock());
        debug!("Flushing {} record(s) to {}", pending.len(), self.bootstrap_servers);

        // librdkafka's flush blocks the calling thread.
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(Error::FlushTask)?
            .map_err(Error::Flush)?;

        let mut first_error = None;
        for delivery in pending {
            match delivery.await {
                Ok(Ok(_)) => {}
                Ok(Err((error, _))) => {
                    first_error.get_or_insert(Error::Delivery(error));
                }
                Err(_) => {
                    first_error.get_or_insert(Error::Canceled);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rdkafka::message::Headers as _;

    #[test]
    fn test_headers_preserve_order() {
        let record = Record::to("orders")
            .header("trace", "a")
            .header("tenant", "b");

        let headers = KafkaProducer::headers(&record).unwrap();

        assert_eq!(headers.count(), 2);
        assert_eq!(headers.get(0).key, "trace");
        assert_eq!(headers.get(0).value, Some(&b"a"[..]));
        assert_eq!(headers.get(1).key, "tenant");
    }

    #[test]
    fn test_no_headers() {
        assert!(KafkaProducer::headers(&Record::to("orders")).is_none());
    }

    #[tokio::test]
    async fn test_flush_leaves_the_runtime_free() {
        let config = KafkaProducerConfig::default()
            .with_bootstrap_servers("127.0.0.1:1")
            .with_override("message.timeout.ms", "60000");
        let producer = KafkaProducer::new(&config).unwrap();
        producer
            .send(Record::to("orders").value("pending"))
            .await
            .unwrap();

        let ticker = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            std::time::Instant::now()
        });
        let result = producer.flush(Duration::from_millis(500)).await;
        let flushed = std::time::Instant::now();

        assert!(matches!(result, Err(Error::Flush(_))));
        assert!(ticker.await.unwrap() < flushed);
    }
}
