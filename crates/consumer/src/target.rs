use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tessera_bus::Message;

/// Messages received for one topic, oldest first.
///
/// Handles are cheap to clone and all observe the same queue. Only the
/// consumer that owns the queue appends to it. Holders of a handle read it
/// and may drain what they have checked, through [`pop_front`](Self::pop_front)
/// or [`clear`](Self::clear). Draining never affects what retrieval returns.
#[derive(Clone, Debug, Default)]
pub struct TopicQueue {
    messages: Arc<Mutex<VecDeque<Message>>>,
}

impl TopicQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// The oldest queued message.
    pub fn front(&self) -> Option<Message> {
        self.messages.lock().front().cloned()
    }

    /// The message at `index`, counting from the oldest.
    pub fn get(&self, index: usize) -> Option<Message> {
        self.messages.lock().get(index).cloned()
    }

    /// Removes and returns the oldest message.
    pub fn pop_front(&self) -> Option<Message> {
        self.messages.lock().pop_front()
    }

    /// Copies the queued messages, oldest first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().iter().cloned().collect()
    }

    /// Removes every queued message.
    pub fn clear(&self) {
        self.messages.lock().clear();
    }

    pub(crate) fn push(&self, message: Message) {
        self.messages.lock().push_back(message);
    }
}

/// What a consumer subscribes to.
#[derive(Clone, Debug)]
pub enum SubscriptionTarget {
    /// Plain topic list.
    Topics(Vec<String>),

    /// Topics whose messages are also appended to the mapped queue.
    TopicQueueMap(IndexMap<String, TopicQueue>),
}

impl SubscriptionTarget {
    /// Subscribes to `topics` without demultiplexing.
    pub fn topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Topics(topics.into_iter().map(Into::into).collect())
    }

    /// Subscribes to `topics`, each with a fresh queue.
    ///
    /// The queues are reachable through
    /// [`BoundedConsumer::queue`](crate::BoundedConsumer::queue).
    pub fn with_queues<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::TopicQueueMap(
            topics
                .into_iter()
                .map(|topic| (topic.into(), TopicQueue::new()))
                .collect(),
        )
    }

    /// Whether there is nothing to subscribe to.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Topics(topics) => topics.is_empty(),
            Self::TopicQueueMap(queues) => queues.is_empty(),
        }
    }

    /// The topic names in subscription order.
    pub fn topic_names(&self) -> Vec<String> {
        match self {
            Self::Topics(topics) => topics.clone(),
            Self::TopicQueueMap(queues) => queues.keys().cloned().collect(),
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Option<IndexMap<String, TopicQueue>>) {
        match self {
            Self::Topics(topics) => (topics, None),
            Self::TopicQueueMap(queues) => (queues.keys().cloned().collect(), Some(queues)),
        }
    }
}

impl From<Vec<String>> for SubscriptionTarget {
    fn from(topics: Vec<String>) -> Self {
        Self::Topics(topics)
    }
}

impl From<&[&str]> for SubscriptionTarget {
    fn from(topics: &[&str]) -> Self {
        Self::topics(topics.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for SubscriptionTarget {
    fn from(topics: [&str; N]) -> Self {
        Self::topics(topics)
    }
}

impl From<IndexMap<String, TopicQueue>> for SubscriptionTarget {
    fn from(queues: IndexMap<String, TopicQueue>) -> Self {
        Self::TopicQueueMap(queues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_handles_share_contents() {
        let queue = TopicQueue::new();
        let reader = queue.clone();

        queue.push(Message::new("orders", 0, 0, None));
        queue.push(Message::new("orders", 0, 1, None));

        assert_eq!(reader.len(), 2);
        assert_eq!(reader.front().map(|message| message.offset()), Some(0));
        assert_eq!(reader.pop_front().map(|message| message.offset()), Some(0));
        assert_eq!(queue.snapshot().len(), 1);
        assert_eq!(queue.get(0).map(|message| message.offset()), Some(1));

        reader.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_map_target_keeps_insertion_order() {
        let target = SubscriptionTarget::with_queues(["payments", "orders", "audit"]);

        assert_eq!(target.topic_names(), vec!["payments", "orders", "audit"]);
        let (topics, queues) = target.into_parts();
        assert_eq!(topics.len(), 3);
        assert_eq!(queues.map(|queues| queues.len()), Some(3));
    }

    #[test]
    fn test_empty_targets() {
        assert!(SubscriptionTarget::topics(Vec::<String>::new()).is_empty());
        assert!(SubscriptionTarget::from(IndexMap::new()).is_empty());
        assert!(!SubscriptionTarget::from(["orders"]).is_empty());
    }
}
