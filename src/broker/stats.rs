//! Point-in-time counts derived from the registry. Nothing here is stored;
//! every snapshot is recomputed at the instant it is requested.

use serde::{Deserialize, Serialize};

use crate::broker::registry::TopicRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub clients_count: usize,
    pub rooms_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicStats {
    pub topic: String,
    pub clients_count: usize,
}

/// `connected_clients` is the number of live gateway connections, whether or
/// not they have joined a topic.
pub fn global_stats(registry: &TopicRegistry, connected_clients: usize) -> GlobalStats {
    GlobalStats {
        clients_count: connected_clients,
        rooms_count: registry.total_topics(),
    }
}

/// Stats for `topic`; unknown topics report a count of 0.
pub fn topic_stats(registry: &TopicRegistry, topic: &str) -> TopicStats {
    TopicStats {
        topic: topic.to_string(),
        clients_count: registry.subscriber_count_of(topic),
    }
}

/// Like [`topic_stats`], but `None` for a topic nobody is subscribed to, so
/// callers can answer "not found" instead of an ambiguous zero.
pub fn lookup_topic_stats(registry: &TopicRegistry, topic: &str) -> Option<TopicStats> {
    registry
        .contains(topic)
        .then(|| topic_stats(registry, topic))
}
