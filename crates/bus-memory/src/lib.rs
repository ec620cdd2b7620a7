//! In-memory implementation of the bus crate.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Consumers read assigned partitions of the broker starting at the log end.
pub mod consumer;

/// Producers buffer records and append them to the broker on flush.
pub mod producer;

pub use consumer::{MemoryConsumer, MemoryConsumerOptions};
pub use producer::{MemoryProducer, MemoryProducerOptions};

use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, MutexGuard};
use tessera_bus::{Message, Record, RecordError};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::{debug, warn};

#[derive(Debug)]
struct Entry {
    seq: u64,
    message: Message,
}

#[derive(Debug)]
struct TopicLog {
    partitions: Vec<Vec<Entry>>,
    next_partition: usize,
}

impl TopicLog {
    fn new(partitions: usize) -> Self {
        Self {
            partitions: (0..partitions).map(|_| Vec::new()).collect(),
            next_partition: 0,
        }
    }
}

#[derive(Debug)]
struct BrokerState {
    default_partitions: usize,
    fatal: Option<String>,
    next_seq: u64,
    rejected_topics: HashSet<String>,
    topics: HashMap<String, TopicLog>,
}

impl BrokerState {
    fn topic_mut(&mut self, topic: &str) -> &mut TopicLog {
        let partitions = self.default_partitions;
        self.topics.entry(topic.to_string()).or_insert_with(|| {
            debug!("Auto-creating topic {topic} with {partitions} partition(s)");
            TopicLog::new(partitions)
        })
    }

    fn push(&mut self, topic: &str, partition: usize, build: impl FnOnce(i64) -> Message) -> i64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        let log = &mut self.topic_mut(topic).partitions[partition];
        let offset = i64::try_from(log.len()).unwrap_or(i64::MAX);
        log.push(Entry {
            seq,
            message: build(offset),
        });

        offset
    }
}

/// Reasons the broker refuses to append a record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum AppendError {
    Rejected,
    UnknownPartition(i32),
}

/// An in-memory broker shared by memory consumers and producers.
///
/// Every consumer behaves as the only member of a fresh consumer group: it
/// is assigned every partition of the topics it subscribes to and starts
/// reading at the end of each partition.
#[derive(Clone, Debug)]
pub struct MemoryBroker {
    notify: Arc<Notify>,
    state: Arc<Mutex<BrokerState>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// Creates a broker whose auto-created topics have a single partition.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_partitions(1)
    }

    /// Creates a broker whose auto-created topics have `partitions` partitions.
    #[must_use]
    pub fn with_default_partitions(partitions: usize) -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            state: Arc::new(Mutex::new(BrokerState {
                default_partitions: partitions.max(1),
                fatal: None,
                next_seq: 0,
                rejected_topics: HashSet::new(),
                topics: HashMap::new(),
            })),
        }
    }

    /// Creates a topic with an explicit partition count.
    ///
    /// Returns `false` if the topic already exists.
    pub fn create_topic(&self, topic: impl Into<String>, partitions: usize) -> bool {
        let topic = topic.into();
        let mut state = self.state.lock();
        if state.topics.contains_key(&topic) {
            return false;
        }

        state.topics.insert(topic, TopicLog::new(partitions.max(1)));
        true
    }

    /// Number of partitions of `topic`, if it exists.
    pub fn partitions(&self, topic: &str) -> Option<usize> {
        self.state
            .lock()
            .topics
            .get(topic)
            .map(|log| log.partitions.len())
    }

    /// Creates a consumer attached to this broker.
    #[must_use]
    pub fn consumer(&self, options: MemoryConsumerOptions) -> MemoryConsumer {
        MemoryConsumer::new(self.clone(), options)
    }

    /// Creates a producer attached to this broker.
    #[must_use]
    pub fn producer(&self, options: MemoryProducerOptions) -> MemoryProducer {
        MemoryProducer::new(self.clone(), options)
    }

    /// Returns every delivered record of `topic` in arrival order.
    ///
    /// Injected record errors are not included.
    pub fn messages(&self, topic: &str) -> Vec<Message> {
        let state = self.state.lock();
        let Some(log) = state.topics.get(topic) else {
            return Vec::new();
        };

        let mut entries: Vec<&Entry> = log
            .partitions
            .iter()
            .flatten()
            .filter(|entry| entry.message.error().is_none())
            .collect();
        entries.sort_by_key(|entry| entry.seq);

        entries.into_iter().map(|entry| entry.message.clone()).collect()
    }

    /// Appends a per-record error to a partition log.
    ///
    /// Assigned consumers see it in order with the surrounding records.
    ///
    /// # Panics
    ///
    /// Panics if `partition` does not exist.
    pub fn inject_record_error(&self, topic: &str, partition: i32, error: RecordError) {
        {
            let mut state = self.state.lock();
            let index = Self::partition_index(state.topic_mut(topic), partition)
                .unwrap_or_else(|| panic!("{topic} has no partition {partition}"));
            state.push(topic, index, |offset| {
                Message::from_error(topic, partition, offset, error)
            });
        }

        self.notify.notify_waiters();
    }

    /// Makes every subsequent consumer poll fail with `reason`.
    pub fn fail_consumers(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Failing memory consumers: {reason}");
        self.state.lock().fatal = Some(reason);
        self.notify.notify_waiters();
    }

    /// Makes the broker reject every record sent to `topic`.
    pub fn reject_topic(&self, topic: impl Into<String>) {
        self.state.lock().rejected_topics.insert(topic.into());
    }

    pub(crate) fn append(&self, record: Record) -> Result<(i32, i64), AppendError> {
        let result = {
            let mut state = self.state.lock();
            if state.rejected_topics.contains(&record.topic) {
                return Err(AppendError::Rejected);
            }

            let log = state.topic_mut(&record.topic);
            let index = match record.partition {
                Some(partition) => Self::partition_index(log, partition)
                    .ok_or(AppendError::UnknownPartition(partition))?,
                None => Self::choose_partition(log, &record),
            };
            let partition = i32::try_from(index).unwrap_or(i32::MAX);
            let timestamp = record.timestamp.unwrap_or_else(now_millis);
            let topic = record.topic.clone();

            let offset = state.push(&topic, index, |offset| {
                Message::new(record.topic, partition, offset, record.value)
                    .with_key(record.key)
                    .with_timestamp(Some(timestamp))
                    .with_headers(record.headers)
            });

            (partition, offset)
        };

        self.notify.notify_waiters();
        Ok(result)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock()
    }

    pub(crate) fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }

    fn partition_index(log: &TopicLog, partition: i32) -> Option<usize> {
        usize::try_from(partition)
            .ok()
            .filter(|index| *index < log.partitions.len())
    }

    fn choose_partition(log: &mut TopicLog, record: &Record) -> usize {
        let count = log.partitions.len();
        if let Some(key) = &record.key {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            let buckets = u64::try_from(count).unwrap_or(u64::MAX);
            return usize::try_from(hasher.finish() % buckets).unwrap_or(0);
        }

        let index = log.next_partition % count;
        log.next_partition = log.next_partition.wrapping_add(1);
        index
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use assert_matches::assert_matches;
    use bytes::Bytes;
    use tessera_bus::consumer::ConsumerTransport;
    use tessera_bus::producer::ProducerTransport;
    use tessera_bus::TopicPartition;

    async fn produce(broker: &MemoryBroker, record: Record) {
        let producer = broker.producer(MemoryProducerOptions::default());
        producer.send(record).await.unwrap();
        producer.flush(Duration::from_secs(1)).await.unwrap();
    }

    async fn next(consumer: &MemoryConsumer) -> Message {
        consumer
            .poll(Duration::from_secs(1))
            .await
            .unwrap()
            .expect("poll timed out")
    }

    #[tokio::test(start_paused = true)]
    async fn test_assignment_emits_eof_per_partition() {
        let broker = MemoryBroker::with_default_partitions(3);
        let consumer = broker.consumer(MemoryConsumerOptions::default());

        consumer.subscribe(&["orders".to_string()]).await.unwrap();

        let mut partitions = Vec::new();
        for _ in 0..3 {
            let marker = next(&consumer).await;
            assert!(marker.is_partition_eof());
            assert_eq!(marker.topic(), "orders");
            partitions.push(marker.partition());
        }
        partitions.sort_unstable();

        assert_eq!(partitions, vec![0, 1, 2]);
        assert_eq!(
            consumer.assignment().await.unwrap(),
            vec![
                TopicPartition::new("orders", 0),
                TopicPartition::new("orders", 1),
                TopicPartition::new("orders", 2),
            ]
        );
        assert_eq!(consumer.poll(Duration::from_secs(1)).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_assignment_starts_at_log_end() {
        let broker = MemoryBroker::new();
        produce(&broker, Record::to("orders").value("before")).await;

        let consumer = broker.consumer(MemoryConsumerOptions::default());
        consumer.subscribe(&["orders".to_string()]).await.unwrap();
        assert!(next(&consumer).await.is_partition_eof());

        produce(&broker, Record::to("orders").value("after")).await;

        let message = next(&consumer).await;
        assert_eq!(message.value(), Some(&Bytes::from("after")));
        assert_eq!(message.offset(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_assignment_delay_counts_polls() {
        let broker = MemoryBroker::new();
        let consumer = broker.consumer(MemoryConsumerOptions::default().with_assignment_delay(2));
        consumer.subscribe(&["orders".to_string()]).await.unwrap();

        assert_eq!(consumer.poll(Duration::from_millis(200)).await.unwrap(), None);
        assert!(consumer.assignment().await.unwrap().is_empty());
        assert_eq!(consumer.poll(Duration::from_millis(200)).await.unwrap(), None);

        assert!(next(&consumer).await.is_partition_eof());
        assert_eq!(consumer.assignment().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eof_after_catching_up() {
        let broker = MemoryBroker::new();
        let consumer = broker.consumer(MemoryConsumerOptions::default());
        consumer.subscribe(&["orders".to_string()]).await.unwrap();
        assert!(next(&consumer).await.is_partition_eof());

        produce(&broker, Record::to("orders").value("one")).await;
        produce(&broker, Record::to("orders").value("two")).await;

        assert_eq!(next(&consumer).await.value(), Some(&Bytes::from("one")));
        assert_eq!(next(&consumer).await.value(), Some(&Bytes::from("two")));

        let marker = next(&consumer).await;
        assert_eq!(marker.error(), Some(&RecordError::PartitionEof { offset: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_wakes_on_produce() {
        let broker = MemoryBroker::new();
        let consumer = broker.consumer(MemoryConsumerOptions::default());
        consumer.subscribe(&["orders".to_string()]).await.unwrap();
        assert!(next(&consumer).await.is_partition_eof());

        let background = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            produce(&background, Record::to("orders").value("late")).await;
        });

        let started = tokio::time::Instant::now();
        let message = consumer
            .poll(Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(message.value(), Some(&Bytes::from("late")));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_follows_arrival_order_across_topics() {
        let broker = MemoryBroker::new();
        let consumer = broker.consumer(MemoryConsumerOptions::default());
        consumer
            .subscribe(&["orders".to_string(), "payments".to_string()])
            .await
            .unwrap();
        assert!(next(&consumer).await.is_partition_eof());
        assert!(next(&consumer).await.is_partition_eof());

        produce(&broker, Record::to("payments").value("p1")).await;
        produce(&broker, Record::to("orders").value("o1")).await;
        produce(&broker, Record::to("payments").value("p2")).await;

        let topics: Vec<String> = vec![
            next(&consumer).await.topic().to_string(),
            next(&consumer).await.topic().to_string(),
            next(&consumer).await.topic().to_string(),
        ];
        assert_eq!(topics, vec!["payments", "orders", "payments"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_record_error_is_delivered_in_order() {
        let broker = MemoryBroker::new();
        let consumer = broker.consumer(MemoryConsumerOptions::default());
        consumer.subscribe(&["orders".to_string()]).await.unwrap();
        assert!(next(&consumer).await.is_partition_eof());

        broker.inject_record_error("orders", 0, RecordError::Transient("hiccup".into()));
        produce(&broker, Record::to("orders").value("real")).await;

        assert_eq!(
            next(&consumer).await.error(),
            Some(&RecordError::Transient("hiccup".into()))
        );
        assert_eq!(next(&consumer).await.value(), Some(&Bytes::from("real")));
        assert_eq!(broker.messages("orders").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failure_and_close() {
        let broker = MemoryBroker::new();
        let consumer = broker.consumer(MemoryConsumerOptions::default());
        consumer.subscribe(&["orders".to_string()]).await.unwrap();

        broker.fail_consumers("authentication failed");
        assert_matches!(
            consumer.poll(Duration::from_secs(1)).await,
            Err(consumer::Error::Fatal(reason)) if reason == "authentication failed"
        );

        consumer.close().await.unwrap();
        assert_matches!(
            consumer.poll(Duration::from_secs(1)).await,
            Err(consumer::Error::Closed)
        );
        assert_matches!(consumer.close().await, Err(consumer::Error::Closed));
    }

    #[tokio::test]
    async fn test_keyed_records_share_a_partition() {
        let broker = MemoryBroker::with_default_partitions(4);

        for value in ["a", "b", "c"] {
            produce(&broker, Record::to("orders").key("customer-7").value(value)).await;
        }

        let messages = broker.messages("orders");
        assert_eq!(messages.len(), 3);
        assert!(messages
            .iter()
            .all(|message| message.partition() == messages[0].partition()));
        assert_eq!(
            messages
                .iter()
                .map(|message| message.offset())
                .collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_unkeyed_records_round_robin() {
        let broker = MemoryBroker::new();
        assert!(broker.create_topic("orders", 2));
        assert!(!broker.create_topic("orders", 5));

        for value in ["a", "b", "c", "d"] {
            produce(&broker, Record::to("orders").value(value)).await;
        }

        let partitions: Vec<i32> = broker
            .messages("orders")
            .iter()
            .map(Message::partition)
            .collect();
        assert_eq!(partitions, vec![0, 1, 0, 1]);
        assert_eq!(broker.partitions("orders"), Some(2));
    }
}
