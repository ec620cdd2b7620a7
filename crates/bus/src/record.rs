use crate::message::Headers;

use bytes::Bytes;

/// An outbound record handed to a producer transport.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    /// Destination topic.
    pub topic: String,

    /// Optional key, also used for partitioning.
    pub key: Option<Bytes>,

    /// Optional payload.
    pub value: Option<Bytes>,

    /// Explicit partition. `None` lets the transport choose.
    pub partition: Option<i32>,

    /// Timestamp in milliseconds since the epoch. `None` lets the transport stamp it.
    pub timestamp: Option<i64>,

    /// Record headers.
    pub headers: Headers,
}

impl Record {
    /// Creates a record for `topic` with no key, value or headers.
    pub fn to(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            value: None,
            partition: None,
            timestamp: None,
            headers: Headers::new(),
        }
    }

    /// Sets the key.
    #[must_use]
    pub fn key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Pins the record to a partition.
    #[must_use]
    pub const fn partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}
