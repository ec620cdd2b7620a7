use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options for a [`BoundedConsumer`](crate::BoundedConsumer).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct BoundedConsumerOptions {
    /// Poll granularity of the assignment handshake
    pub assignment_poll_interval: Duration,

    /// Upper bound on the assignment handshake. `None` waits forever.
    pub assignment_timeout: Option<Duration>,

    /// Timeout used by the `*_default` retrieval methods
    pub default_timeout: Duration,

    /// Longest single transport poll during retrieval
    pub poll_interval: Duration,
}

impl Default for BoundedConsumerOptions {
    fn default() -> Self {
        Self {
            assignment_poll_interval: Duration::from_millis(200),
            assignment_timeout: Some(Duration::from_secs(60)),
            default_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl BoundedConsumerOptions {
    /// Sets the assignment handshake poll granularity.
    #[must_use]
    pub const fn with_assignment_poll_interval(mut self, interval: Duration) -> Self {
        self.assignment_poll_interval = interval;
        self
    }

    /// Sets (or removes, with `None`) the assignment handshake limit.
    #[must_use]
    pub const fn with_assignment_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.assignment_timeout = timeout;
        self
    }

    /// Sets the default retrieval timeout.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the retrieval poll granularity.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Options for a [`MessageProducer`](crate::MessageProducer).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct MessageProducerOptions {
    /// Longest wait for buffered records to leave the client
    pub flush_timeout: Duration,
}

impl Default for MessageProducerOptions {
    fn default() -> Self {
        Self {
            flush_timeout: Duration::from_secs(30),
        }
    }
}

impl MessageProducerOptions {
    /// Sets the flush timeout.
    #[must_use]
    pub const fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_options_fill_defaults() {
        let options: BoundedConsumerOptions =
            serde_json::from_str(r#"{"assignment_timeout": null}"#).unwrap();

        assert_eq!(options.assignment_timeout, None);
        assert_eq!(options.poll_interval, Duration::from_secs(1));
        assert_eq!(options.assignment_poll_interval, Duration::from_millis(200));
    }
}
