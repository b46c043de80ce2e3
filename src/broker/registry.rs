//! Topic registry
//!
//! Tracks which connections are subscribed to which search term. A topic
//! entry exists only while it has at least one subscriber: it is inserted on
//! the first join and erased on the last leave. Each subscriber holds at most
//! one topic at a time.
//!
//! Every operation is total; there are no error cases.

use std::collections::HashMap;

use crate::broker::topic::{SubscriberId, Topic};

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: HashMap<String, Topic>,
    memberships: HashMap<SubscriberId, String>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `subscriber` to `topic`, creating the topic if needed, and
    /// returns the topic's resulting subscriber count.
    ///
    /// A subscriber already holding a different topic is moved out of it.
    pub fn join(&mut self, topic: &str, subscriber: SubscriberId) -> usize {
        if let Some(previous) = self.memberships.get(&subscriber).cloned() {
            if previous != topic {
                self.leave(&previous, &subscriber);
            }
        }

        self.memberships.insert(subscriber.clone(), topic.to_string());
        let entry = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic));
        entry.subscribe(subscriber);
        entry.len()
    }

    /// Removes `subscriber` from `topic` and returns the remaining count
    /// (0 when the topic no longer exists).
    pub fn leave(&mut self, topic: &str, subscriber: &SubscriberId) -> usize {
        let Some(entry) = self.topics.get_mut(topic) else {
            return 0;
        };
        entry.unsubscribe(subscriber);
        if self.memberships.get(subscriber).is_some_and(|t| t == topic) {
            self.memberships.remove(subscriber);
        }

        let remaining = entry.len();
        if remaining == 0 {
            self.topics.remove(topic);
        }
        remaining
    }

    pub fn subscriber_count_of(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, Topic::len)
    }

    pub fn total_subscribers(&self) -> usize {
        self.topics.values().map(Topic::len).sum()
    }

    pub fn total_topics(&self) -> usize {
        self.topics.len()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    /// The topic `subscriber` currently belongs to, if any.
    pub fn topic_of(&self, subscriber: &SubscriberId) -> Option<&str> {
        self.memberships.get(subscriber).map(String::as_str)
    }

    /// Snapshot of the topic's subscribers at this instant.
    pub fn subscribers_of(&self, topic: &str) -> Vec<SubscriberId> {
        self.topics
            .get(topic)
            .map(|t| t.subscribers.iter().cloned().collect())
            .unwrap_or_default()
    }
}
