//! Abstract interface for the message bus used by tessera test harnesses.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Consumers subscribe to topics and poll for messages.
pub mod consumer;

/// Messages as delivered to consumers.
pub mod message;

/// Producers send records to topics.
pub mod producer;

/// Records as handed to producers.
pub mod record;

pub use message::{Headers, Message, RecordError, TopicPartition};
pub use record::Record;
