mod error;

pub use error::Error;

use crate::config::KafkaConsumerConfig;

use std::fmt::{self, Debug};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{BorrowedMessage, Headers as _, Message as _};
use tessera_bus::consumer::ConsumerTransport;
use tessera_bus::{Headers, Message, RecordError, TopicPartition};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A Kafka consumer.
pub struct KafkaConsumer {
    bootstrap_servers: String,
    consumer: Mutex<Option<StreamConsumer>>,
}

impl Debug for KafkaConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaConsumer")
            .field("bootstrap_servers", &self.bootstrap_servers)
            .finish_non_exhaustive()
    }
}

impl KafkaConsumer {
    /// Creates a consumer. Nothing is subscribed yet.
    ///
    /// # Errors
    ///
    /// Returns an error if librdkafka rejects the configuration.
    pub fn new(config: &KafkaConsumerConfig) -> Result<Self, Error> {
        let consumer: StreamConsumer = config.client_config().create().map_err(Error::Create)?;

        Ok(Self {
            bootstrap_servers: config.bootstrap_servers.clone(),
            consumer: Mutex::new(Some(consumer)),
        })
    }

    fn is_fatal(error: &KafkaError) -> bool {
        matches!(
            error.rdkafka_error_code(),
            Some(
                RDKafkaErrorCode::Fatal
                    | RDKafkaErrorCode::Authentication
                    | RDKafkaErrorCode::SaslAuthenticationFailed
                    | RDKafkaErrorCode::ClusterAuthorizationFailed
                    | RDKafkaErrorCode::GroupAuthorizationFailed
                    | RDKafkaErrorCode::TopicAuthorizationFailed
            )
        )
    }

    // librdkafka reports only the partition number for EOF events.
    fn eof_topic(consumer: &StreamConsumer, partition: i32) -> String {
        let Ok(assignment) = consumer.assignment() else {
            return String::new();
        };

        let mut topics = assignment
            .elements()
            .into_iter()
            .filter(|element| element.partition() == partition)
            .map(|element| element.topic().to_string());

        match (topics.next(), topics.next()) {
            (Some(topic), None) => topic,
            _ => String::new(),
        }
    }

    fn convert(message: &BorrowedMessage<'_>) -> Message {
        let headers: Headers = message
            .headers()
            .map(|headers| {
                headers
                    .iter()
                    .map(|header| {
                        (
                            header.key.to_string(),
                            header.value.map(Bytes::copy_from_slice).unwrap_or_default(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        Message::new(
            message.topic(),
            message.partition(),
            message.offset(),
            message.payload().map(Bytes::copy_from_slice),
        )
        .with_key(message.key().map(Bytes::copy_from_slice))
        .with_timestamp(message.timestamp().to_millis())
        .with_headers(headers)
    }
}

#[async_trait]
impl ConsumerTransport for KafkaConsumer {
    type Error = Error;

    async fn subscribe(&self, topics: &[String]) -> Result<(), Self::Error> {
        let guard = self.consumer.lock().await;
        let consumer = guard.as_ref().ok_or(Error::Closed)?;

        let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
        debug!("Subscribing to {topics:?} on {}", self.bootstrap_servers);
        consumer.subscribe(&topics).map_err(Error::Subscribe)
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<Message>, Self::Error> {
        let guard = self.consumer.lock().await;
        let consumer = guard.as_ref().ok_or(Error::Closed)?;

        match tokio::time::timeout(timeout, consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(message)) => Ok(Some(Self::convert(&message))),
            Ok(Err(KafkaError::PartitionEOF(partition))) => Ok(Some(Message::partition_eof(
                Self::eof_topic(consumer, partition),
                partition,
                -1,
            ))),
            Ok(Err(error)) if Self::is_fatal(&error) => {
                warn!("Fatal consumer error: {error}");
                Err(Error::Fatal(error))
            }
            Ok(Err(error)) => Ok(Some(Message::from_error(
                "",
                -1,
                -1,
                RecordError::Transient(error.to_string()),
            ))),
        }
    }

    async fn assignment(&self) -> Result<Vec<TopicPartition>, Self::Error> {
        let guard = self.consumer.lock().await;
        let consumer = guard.as_ref().ok_or(Error::Closed)?;

        let assignment = consumer.assignment().map_err(Error::Assignment)?;
        Ok(assignment
            .elements()
            .into_iter()
            .map(|element| TopicPartition::new(element.topic(), element.partition()))
            .collect())
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let consumer = self.consumer.lock().await.take().ok_or(Error::Closed)?;

        debug!("Closing consumer on {}", self.bootstrap_servers);
        consumer.unsubscribe();

        Ok(())
    }
}
