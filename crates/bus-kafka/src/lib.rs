//! Kafka implementation of the bus crate, built on `rdkafka`.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Client configuration with test-friendly defaults.
pub mod config;

/// Consumers wrap an `rdkafka` stream consumer.
pub mod consumer;

/// Producers wrap an `rdkafka` future producer.
pub mod producer;

pub use config::{KafkaConsumerConfig, KafkaProducerConfig};
pub use consumer::KafkaConsumer;
pub use producer::KafkaProducer;
