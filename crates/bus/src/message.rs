use bytes::Bytes;
use thiserror::Error;

/// Ordered key/value headers attached to a message.
pub type Headers = Vec<(String, Bytes)>;

/// A topic and one of its partitions.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TopicPartition {
    /// Topic name.
    pub topic: String,

    /// Partition number.
    pub partition: i32,
}

impl TopicPartition {
    /// Creates a new topic partition.
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

/// A per-record error reported by the transport while polling.
///
/// These describe the poll result itself rather than the health of the
/// consumer. Unrecoverable conditions are returned as errors from `poll`
/// instead.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RecordError {
    /// The consumer reached the end of a partition.
    #[error("Reached end of partition at offset {offset}")]
    PartitionEof {
        /// Offset one past the last record in the partition, or -1 if unknown.
        offset: i64,
    },

    /// Any other recoverable per-record condition.
    #[error("Transient record error: {0}")]
    Transient(String),
}

/// A message delivered by a consumer transport.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    topic: String,
    partition: i32,
    offset: i64,
    key: Option<Bytes>,
    value: Option<Bytes>,
    timestamp: Option<i64>,
    headers: Headers,
    error: Option<RecordError>,
}

impl Message {
    /// Creates a message carrying a value.
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, value: Option<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            value,
            timestamp: None,
            headers: Headers::new(),
            error: None,
        }
    }

    /// Creates a message that only carries a per-record error.
    ///
    /// `topic` may be empty when the transport cannot attribute the error.
    pub fn from_error(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        error: RecordError,
    ) -> Self {
        Self {
            error: Some(error),
            ..Self::new(topic, partition, offset, None)
        }
    }

    /// Creates an end-of-partition marker.
    pub fn partition_eof(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self::from_error(topic, partition, offset, RecordError::PartitionEof { offset })
    }

    /// Sets the key.
    #[must_use]
    pub fn with_key(mut self, key: Option<Bytes>) -> Self {
        self.key = key;
        self
    }

    /// Sets the timestamp (milliseconds since the epoch).
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: Option<i64>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// The topic the message was read from. Empty if unknown.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The partition the message was read from.
    pub const fn partition(&self) -> i32 {
        self.partition
    }

    /// The offset of the message within its partition.
    pub const fn offset(&self) -> i64 {
        self.offset
    }

    /// The message key.
    pub const fn key(&self) -> Option<&Bytes> {
        self.key.as_ref()
    }

    /// The message payload.
    pub const fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }

    /// The message timestamp in milliseconds since the epoch.
    pub const fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// The message headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Looks up the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&Bytes> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// The per-record error, if any.
    pub const fn error(&self) -> Option<&RecordError> {
        self.error.as_ref()
    }

    /// Whether this is an end-of-partition marker.
    pub const fn is_partition_eof(&self) -> bool {
        matches!(self.error, Some(RecordError::PartitionEof { .. }))
    }
}
