//! Bounded-time consumption harness for integration tests against a message bus.
//!
//! A [`BoundedConsumer`] subscribes to topics and only returns once the
//! transport has assigned every partition and caught up with it, so records
//! produced afterwards are never missed. Retrieval then gives up after a
//! caller supplied time budget instead of blocking indefinitely, and can
//! copy each message into a per-topic [`TopicQueue`].
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Deadline-bounded consumer with optional demultiplexing.
pub mod consumer;

/// Consumer and producer options.
pub mod options;

/// Send-and-flush producer.
pub mod producer;

/// Subscription targets and per-topic queues.
pub mod target;

pub use consumer::{BoundedConsumer, State};
pub use options::{BoundedConsumerOptions, MessageProducerOptions};
pub use producer::MessageProducer;
pub use target::{SubscriptionTarget, TopicQueue};
