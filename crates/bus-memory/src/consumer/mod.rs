mod error;

pub use error::Error;

use crate::MemoryBroker;

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tessera_bus::consumer::ConsumerTransport;
use tessera_bus::{Message, TopicPartition};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

/// Options for the memory consumer.
#[derive(Clone, Debug, Default)]
pub struct MemoryConsumerOptions {
    /// Number of polls after subscribing before partitions are assigned.
    pub assignment_delay: u32,
}

impl MemoryConsumerOptions {
    /// Delays partition assignment by `polls` polls, simulating a rebalance.
    #[must_use]
    pub const fn with_assignment_delay(mut self, polls: u32) -> Self {
        self.assignment_delay = polls;
        self
    }
}

#[derive(Debug)]
struct Assigned {
    partition: TopicPartition,
    position: usize,
    eof_pending: bool,
}

#[derive(Debug, Default)]
struct State {
    assigned: Option<Vec<Assigned>>,
    closed: bool,
    remaining_delay: u32,
    topics: Vec<String>,
}

/// A consumer reading from a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryConsumer {
    broker: MemoryBroker,
    options: MemoryConsumerOptions,
    state: Mutex<State>,
}

impl MemoryConsumer {
    pub(crate) fn new(broker: MemoryBroker, options: MemoryConsumerOptions) -> Self {
        Self {
            broker,
            options,
            state: Mutex::new(State::default()),
        }
    }

    /// The broker this consumer reads from.
    pub const fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    fn try_next(&self) -> Result<Option<Message>, Error> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }

        let mut broker = self.broker.lock();
        if let Some(reason) = &broker.fatal {
            return Err(Error::Fatal(reason.clone()));
        }

        if state.topics.is_empty() {
            return Ok(None);
        }

        if state.assigned.is_none() {
            if state.remaining_delay > 0 {
                state.remaining_delay -= 1;
                trace!("Assignment pending, {} poll(s) left", state.remaining_delay);
                return Ok(None);
            }

            let mut assigned = Vec::new();
            for topic in &state.topics {
                let log = broker.topic_mut(topic);
                for (index, entries) in log.partitions.iter().enumerate() {
                    assigned.push(Assigned {
                        partition: TopicPartition::new(
                            topic.clone(),
                            i32::try_from(index).unwrap_or(i32::MAX),
                        ),
                        position: entries.len(),
                        eof_pending: true,
                    });
                }
            }
            debug!("Assigned {} partition(s)", assigned.len());
            state.assigned = Some(assigned);
        }

        let Some(assigned) = state.assigned.as_mut() else {
            return Ok(None);
        };

        let log_len = |tp: &TopicPartition| -> usize {
            broker
                .topics
                .get(&tp.topic)
                .and_then(|log| log.partitions.get(usize::try_from(tp.partition).ok()?))
                .map_or(0, Vec::len)
        };

        for slot in assigned.iter_mut() {
            if !slot.eof_pending {
                continue;
            }

            slot.eof_pending = false;
            let len = log_len(&slot.partition);
            if slot.position == len {
                return Ok(Some(Message::partition_eof(
                    slot.partition.topic.clone(),
                    slot.partition.partition,
                    i64::try_from(len).unwrap_or(i64::MAX),
                )));
            }
        }

        let next = assigned
            .iter_mut()
            .filter_map(|slot| {
                let entry = broker
                    .topics
                    .get(&slot.partition.topic)?
                    .partitions
                    .get(usize::try_from(slot.partition.partition).ok()?)?
                    .get(slot.position)?;
                Some((entry.seq, slot))
            })
            .min_by_key(|(seq, _)| *seq);

        let Some((_, slot)) = next else {
            return Ok(None);
        };

        let partition = usize::try_from(slot.partition.partition).unwrap_or(usize::MAX);
        let entries = &broker.topics[&slot.partition.topic].partitions[partition];
        let message = entries[slot.position].message.clone();
        slot.position += 1;
        slot.eof_pending = slot.position == entries.len();

        Ok(Some(message))
    }
}

#[async_trait]
impl ConsumerTransport for MemoryConsumer {
    type Error = Error;

    async fn subscribe(&self, topics: &[String]) -> Result<(), Self::Error> {
        if topics.is_empty() {
            return Err(Error::EmptySubscription);
        }

        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }

        debug!("Subscribing to {topics:?}");
        state.topics = topics.to_vec();
        state.assigned = None;
        state.remaining_delay = self.options.assignment_delay;

        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<Message>, Self::Error> {
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.broker.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_next()? {
                return Ok(Some(message));
            }

            if timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn assignment(&self) -> Result<Vec<TopicPartition>, Self::Error> {
        let state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }

        Ok(state
            .assigned
            .iter()
            .flatten()
            .map(|slot| slot.partition.clone())
            .collect())
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }

        debug!("Closing consumer of {:?}", state.topics);
        state.closed = true;
        state.assigned = None;
        state.topics.clear();

        Ok(())
    }
}
