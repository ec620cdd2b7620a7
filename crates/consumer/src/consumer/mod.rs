mod error;

pub use error::Error;

use crate::options::BoundedConsumerOptions;
use crate::target::{SubscriptionTarget, TopicQueue};

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use indexmap::IndexMap;
use tessera_bus::consumer::ConsumerTransport;
use tessera_bus::{Message, RecordError, TopicPartition};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Lifecycle state of a [`BoundedConsumer`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// No completed subscription yet.
    Unsubscribed,

    /// Every partition is assigned and the consumer has caught up with it.
    Assigned,

    /// Terminal.
    Closed,
}

/// A consumer that waits for partition assignment on subscribe and bounds
/// every retrieval by a deadline.
///
/// Messages are returned oldest first. When subscribed through a
/// [`SubscriptionTarget::TopicQueueMap`], each returned message is also
/// appended to the queue of its topic.
#[derive(Debug)]
pub struct BoundedConsumer<C>
where
    C: ConsumerTransport,
{
    backlog: VecDeque<Message>,
    options: BoundedConsumerOptions,
    queues: Option<IndexMap<String, TopicQueue>>,
    state: State,
    topics: Vec<String>,
    transport: C,
}

impl<C> BoundedConsumer<C>
where
    C: ConsumerTransport,
{
    /// Wraps `transport` without subscribing.
    pub const fn new(transport: C, options: BoundedConsumerOptions) -> Self {
        Self {
            backlog: VecDeque::new(),
            options,
            queues: None,
            state: State::Unsubscribed,
            topics: Vec::new(),
            transport,
        }
    }

    /// Wraps `transport` and subscribes to `target` unless it is empty.
    ///
    /// # Errors
    ///
    /// Returns any error of [`subscribe`](Self::subscribe).
    pub async fn with_target(
        transport: C,
        target: impl Into<SubscriptionTarget>,
        options: BoundedConsumerOptions,
    ) -> Result<Self, Error<C::Error>> {
        let mut consumer = Self::new(transport, options);
        let target = target.into();
        if !target.is_empty() {
            consumer.subscribe(target).await?;
        }

        Ok(consumer)
    }

    /// Subscribes to `target` and waits until every partition is assigned
    /// and caught up.
    ///
    /// Replaces any previous subscription. Records that arrive while
    /// waiting are kept and returned first by the next retrieval.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyTarget`] if `target` names no topic.
    /// - [`Error::Closed`] if the consumer was closed.
    /// - [`Error::AssignmentTimedOut`] if the handshake exceeds
    ///   [`BoundedConsumerOptions::assignment_timeout`].
    /// - [`Error::Transport`] on transport failure.
    pub async fn subscribe(
        &mut self,
        target: impl Into<SubscriptionTarget>,
    ) -> Result<(), Error<C::Error>> {
        self.ensure_open()?;

        let target = target.into();
        if target.is_empty() {
            return Err(Error::EmptyTarget);
        }

        let (topics, queues) = target.into_parts();
        info!("Subscribing to {topics:?}");

        self.state = State::Unsubscribed;
        self.backlog.clear();
        self.transport
            .subscribe(&topics)
            .await
            .map_err(Error::Transport)?;
        self.topics = topics;
        self.queues = queues;

        self.await_assignment().await?;
        self.state = State::Assigned;

        Ok(())
    }

    /// Returns the next message, or `None` if none arrives within `timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotSubscribed`] or [`Error::Closed`] on misuse.
    /// - [`Error::Transport`] on a fatal transport failure.
    pub async fn consume_one(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<Message>, Error<C::Error>> {
        self.ensure_assigned()?;

        let deadline = Instant::now().checked_add(timeout);
        while !is_expired(deadline) {
            if let Some(message) = self.next_message(deadline).await? {
                return Ok(Some(message));
            }
        }

        debug!("No message within {timeout:?}");
        Ok(None)
    }

    /// [`consume_one`](Self::consume_one) with the configured default timeout.
    ///
    /// # Errors
    ///
    /// See [`consume_one`](Self::consume_one).
    pub async fn consume_one_default(&mut self) -> Result<Option<Message>, Error<C::Error>> {
        self.consume_one(self.options.default_timeout).await
    }

    /// Returns up to `count` messages, stopping early when `timeout` expires.
    ///
    /// # Errors
    ///
    /// See [`consume_one`](Self::consume_one).
    pub async fn consume_many(
        &mut self,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<Message>, Error<C::Error>> {
        self.ensure_assigned()?;

        let deadline = Instant::now().checked_add(timeout);
        let mut messages = Vec::new();
        while messages.len() < count && !is_expired(deadline) {
            if let Some(message) = self.next_message(deadline).await? {
                messages.push(message);
            }
        }

        if messages.len() < count {
            debug!(
                "Received {} of {count} message(s) within {timeout:?}",
                messages.len()
            );
        }

        Ok(messages)
    }

    /// [`consume_many`](Self::consume_many) with the configured default timeout.
    ///
    /// # Errors
    ///
    /// See [`consume_one`](Self::consume_one).
    pub async fn consume_many_default(
        &mut self,
        count: usize,
    ) -> Result<Vec<Message>, Error<C::Error>> {
        self.consume_many(count, self.options.default_timeout).await
    }

    /// Releases the transport. The consumer cannot be used afterwards.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] if already closed.
    /// - [`Error::Transport`] if the transport fails to close.
    pub async fn close(&mut self) -> Result<(), Error<C::Error>> {
        self.ensure_open()?;

        info!("Closing consumer of {:?}", self.topics);
        self.state = State::Closed;
        self.backlog.clear();
        self.transport.close().await.map_err(Error::Transport)
    }

    /// Topics of the current subscription.
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// The queue of `topic`, if subscribed through a queue map.
    pub fn queue(&self, topic: &str) -> Option<&TopicQueue> {
        self.queues.as_ref()?.get(topic)
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> State {
        self.state
    }

    /// Whether the last subscription completed its handshake.
    pub fn is_assigned(&self) -> bool {
        self.state == State::Assigned
    }

    /// The options in use.
    pub const fn options(&self) -> &BoundedConsumerOptions {
        &self.options
    }

    /// The wrapped transport.
    pub const fn transport(&self) -> &C {
        &self.transport
    }

    fn ensure_open(&self) -> Result<(), Error<C::Error>> {
        match self.state {
            State::Closed => Err(Error::Closed),
            State::Unsubscribed | State::Assigned => Ok(()),
        }
    }

    fn ensure_assigned(&self) -> Result<(), Error<C::Error>> {
        match self.state {
            State::Assigned => Ok(()),
            State::Closed => Err(Error::Closed),
            State::Unsubscribed => Err(Error::NotSubscribed),
        }
    }

    async fn await_assignment(&mut self) -> Result<(), Error<C::Error>> {
        let started = Instant::now();
        let deadline = self
            .options
            .assignment_timeout
            .and_then(|limit| started.checked_add(limit));

        let mut caught_up = HashSet::new();
        // End-of-partition markers whose topic the transport could not name,
        // counted per partition number.
        let mut caught_up_anonymous: HashMap<i32, usize> = HashMap::new();

        loop {
            let mut wait = self.options.assignment_poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    warn!("Assignment of {:?} timed out", self.topics);
                    return Err(Error::AssignmentTimedOut(deadline - started));
                }
                wait = wait.min(deadline - now);
            }

            trace!("Polling for assignment");
            let polled = self.transport.poll(wait).await.map_err(Error::Transport)?;
            if let Some(message) = polled {
                match message.error().cloned() {
                    Some(RecordError::PartitionEof { .. }) => {
                        if message.topic().is_empty() {
                            *caught_up_anonymous.entry(message.partition()).or_default() += 1;
                        } else {
                            caught_up.insert(TopicPartition::new(
                                message.topic(),
                                message.partition(),
                            ));
                        }
                    }
                    Some(error) => debug!("Ignoring record error during assignment: {error}"),
                    None => {
                        trace!(
                            "Holding message {}/{}@{} until retrieval",
                            message.topic(),
                            message.partition(),
                            message.offset()
                        );
                        self.backlog.push_back(message);
                    }
                }
            }

            let assignment = self
                .transport
                .assignment()
                .await
                .map_err(Error::Transport)?;
            if self.is_caught_up(&assignment, &caught_up, &caught_up_anonymous) {
                info!(
                    "Assigned {} partition(s) of {:?} in {:?}",
                    assignment.len(),
                    self.topics,
                    started.elapsed()
                );
                return Ok(());
            }
        }
    }

    fn is_caught_up(
        &self,
        assignment: &[TopicPartition],
        caught_up: &HashSet<TopicPartition>,
        caught_up_anonymous: &HashMap<i32, usize>,
    ) -> bool {
        if assignment.is_empty()
            || !self
                .topics
                .iter()
                .all(|topic| assignment.iter().any(|tp| &tp.topic == topic))
        {
            return false;
        }

        // Each unnamed marker accounts for one assigned partition with its number.
        let mut unresolved: HashMap<i32, usize> = HashMap::new();
        for tp in assignment.iter().filter(|tp| !caught_up.contains(*tp)) {
            *unresolved.entry(tp.partition).or_default() += 1;
        }

        unresolved.iter().all(|(partition, pending)| {
            caught_up_anonymous.get(partition).copied().unwrap_or_default() >= *pending
        })
    }

    async fn next_message(
        &mut self,
        deadline: Option<Instant>,
    ) -> Result<Option<Message>, Error<C::Error>> {
        let message = match self.backlog.pop_front() {
            Some(message) => message,
            None => {
                let wait = deadline.map_or(self.options.poll_interval, |deadline| {
                    self.options
                        .poll_interval
                        .min(deadline.saturating_duration_since(Instant::now()))
                });
                match self.transport.poll(wait).await.map_err(Error::Transport)? {
                    Some(message) => message,
                    None => return Ok(None),
                }
            }
        };

        if let Some(error) = message.error() {
            debug!(
                "Discarding record error on {}/{}: {error}",
                message.topic(),
                message.partition()
            );
            return Ok(None);
        }

        if let Some(queue) = self.queue(message.topic()) {
            queue.push(message.clone());
        }

        Ok(Some(message))
    }
}

/// `None` is a deadline too far out to represent, which never expires.
fn is_expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}
