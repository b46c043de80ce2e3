//! Relay engine
//!
//! The relay owns the topic registry, the connected clients and at most one
//! upstream stream per topic. It keeps "stream open ⇔ topic has subscribers"
//! true across joins and leaves, and fans every upstream event out to the
//! topic's subscribers at the moment the event arrives.
//!
//! Concurrency and usage notes:
//! - The API is synchronous and is held behind `Arc<Mutex<Relay>>` by the
//!   gateway. Each call is one serialized step; the lock is never held across
//!   an `.await`.
//! - Upstream streams report through a channel drained by
//!   [`Relay::start_signal_loop`], so stream events are applied in arrival
//!   order alongside gateway callbacks.
//! - There is no reconnect. A stream that ends, errors or fails delivery is
//!   closed; the next join for the topic opens a fresh one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, trace, warn};

use crate::broker::event::{NormalizedEvent, RawEvent};
use crate::broker::registry::TopicRegistry;
use crate::broker::stats::{self, GlobalStats, TopicStats};
use crate::broker::topic::SubscriberId;
use crate::client::Client;
use crate::transport::message::ServerMessage;
use crate::upstream::{
    SignalSender, StreamEvent, StreamHandle, StreamId, StreamSignal, Upstream,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    /// Close requested; waiting for the stream's terminal signal.
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    NoSubscribers,
    UpstreamEnded,
    UpstreamError,
    DeliveryFailed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::NoSubscribers => "no subscribers",
            Self::UpstreamEnded => "upstream ended",
            Self::UpstreamError => "upstream error",
            Self::DeliveryFailed => "delivery failed",
        };
        f.write_str(reason)
    }
}

#[derive(Debug)]
struct StreamEntry {
    id: StreamId,
    state: StreamState,
    handle: Box<dyn StreamHandle>,
}

pub struct Relay {
    registry: TopicRegistry,
    clients: HashMap<SubscriberId, Client>,
    streams: HashMap<String, StreamEntry>,
    upstream: Arc<dyn Upstream>,
    signals: SignalSender,
    next_stream_id: StreamId,
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("registry", &self.registry)
            .field("clients", &self.clients.len())
            .field("streams", &self.streams)
            .finish()
    }
}

impl Relay {
    /// `signals` is the sending half of the channel passed to
    /// [`Relay::start_signal_loop`]; every opened stream reports into it.
    pub fn new(upstream: Arc<dyn Upstream>, signals: SignalSender) -> Self {
        Self {
            registry: TopicRegistry::new(),
            clients: HashMap::new(),
            streams: HashMap::new(),
            upstream,
            signals,
            next_stream_id: 1,
        }
    }

    pub fn register_client(&mut self, client: Client) {
        debug!(client_id = %client.id, "client registered");
        self.clients.insert(client.id.clone(), client);
    }

    pub fn client(&self, client_id: &SubscriberId) -> Option<&Client> {
        self.clients.get(client_id)
    }

    pub fn connected_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// Subscribes `subscriber` to `topic`, opening the topic's upstream stream
    /// if none is open. A subscriber holding another topic leaves it first.
    /// Returns the topic's subscriber count.
    pub fn join(&mut self, topic: &str, subscriber: SubscriberId) -> usize {
        if let Some(previous) = self.registry.topic_of(&subscriber).map(str::to_string) {
            if previous != topic {
                self.leave(&previous, &subscriber);
            }
        }

        let count = self.registry.join(topic, subscriber.clone());
        info!(topic, client_id = %subscriber, subscribers = count, "joined topic");
        self.ensure_stream(topic);

        self.broadcast_topic_stats(topic);
        self.broadcast_global_stats();
        count
    }

    /// Removes `subscriber` from `topic`; a no-op when it is not a member.
    /// The stream is closed when the topic drops to zero subscribers.
    pub fn leave(&mut self, topic: &str, subscriber: &SubscriberId) -> usize {
        let count = self.registry.leave(topic, subscriber);
        info!(topic, client_id = %subscriber, subscribers = count, "left topic");
        if count == 0 {
            self.close_stream(topic, CloseReason::NoSubscribers);
        }

        self.broadcast_topic_stats(topic);
        self.broadcast_global_stats();
        count
    }

    /// Drops the client and leaves whatever topic it held.
    pub fn disconnect(&mut self, client_id: &SubscriberId) {
        self.clients.remove(client_id);

        match self.registry.topic_of(client_id).map(str::to_string) {
            Some(topic) => {
                self.leave(&topic, client_id);
            }
            None => self.broadcast_global_stats(),
        }
        info!(client_id = %client_id, "client disconnected");
    }

    pub fn global_stats(&self) -> GlobalStats {
        stats::global_stats(&self.registry, self.clients.len())
    }

    /// `None` when nobody is subscribed to `topic`.
    pub fn topic_stats(&self, topic: &str) -> Option<TopicStats> {
        stats::lookup_topic_stats(&self.registry, topic)
    }

    pub fn stream_state(&self, topic: &str) -> Option<StreamState> {
        self.streams.get(topic).map(|entry| entry.state)
    }

    pub fn is_streaming(&self, topic: &str) -> bool {
        self.stream_state(topic) == Some(StreamState::Open)
    }

    /// Applies one signal from an upstream stream. Signals from a stream that
    /// is no longer the topic's current one are ignored.
    pub fn handle_signal(&mut self, signal: StreamSignal) {
        let StreamSignal {
            topic,
            stream_id,
            event,
        } = signal;
        let topic = topic.as_str();

        let Some(entry) = self.streams.get(topic) else {
            trace!(topic, stream_id, "signal for topic without a stream");
            return;
        };
        if entry.id != stream_id {
            debug!(topic, stream_id, current = entry.id, "ignoring signal from stale stream");
            return;
        }

        match event {
            StreamEvent::Data(raw) => {
                if entry.state == StreamState::Open {
                    self.on_event(topic, raw);
                }
            }
            StreamEvent::Error(e) => {
                warn!(topic, stream_id, error = %e, "upstream stream error");
                self.close_stream(topic, CloseReason::UpstreamError);
                self.finish_stream(topic);
            }
            StreamEvent::End => {
                info!(topic, stream_id, "upstream stream ended");
                self.close_stream(topic, CloseReason::UpstreamEnded);
                self.finish_stream(topic);
            }
        }
    }

    /// Drains upstream signals into the relay until every sender is gone.
    pub async fn start_signal_loop(
        relay: Arc<Mutex<Relay>>,
        mut signals: UnboundedReceiver<StreamSignal>,
    ) {
        while let Some(signal) = signals.recv().await {
            lock(&relay).handle_signal(signal);
        }
        debug!("signal loop finished");
    }

    fn ensure_stream(&mut self, topic: &str) {
        if self.is_streaming(topic) {
            return;
        }

        let id = self.next_stream_id;
        self.next_stream_id += 1;

        let handle = self
            .upstream
            .open_filtered_stream(topic, id, self.signals.clone());
        let replaced = self.streams.insert(
            topic.to_string(),
            StreamEntry {
                id,
                state: StreamState::Open,
                handle,
            },
        );
        if let Some(mut old) = replaced {
            // still closing; its late signals carry the old id
            old.handle.close();
        }
        info!(topic, stream_id = id, "upstream stream opened");
    }

    /// Open → Closing. Safe to call in any state.
    fn close_stream(&mut self, topic: &str, reason: CloseReason) {
        let Some(entry) = self.streams.get_mut(topic) else {
            return;
        };
        if entry.state == StreamState::Open {
            info!(topic, stream_id = entry.id, %reason, "closing upstream stream");
            entry.state = StreamState::Closing;
        }
        entry.handle.close();
    }

    /// Closing → Closed: the stream has confirmed teardown.
    fn finish_stream(&mut self, topic: &str) {
        if let Some(entry) = self.streams.remove(topic) {
            debug!(topic, stream_id = entry.id, "upstream stream closed");
        }
    }

    fn on_event(&mut self, topic: &str, raw: RawEvent) {
        let Some(event) = NormalizedEvent::from_raw(topic, raw) else {
            trace!(topic, "discarding event without author");
            return;
        };

        if self.registry.subscriber_count_of(topic) == 0 {
            self.close_stream(topic, CloseReason::NoSubscribers);
            return;
        }

        let Some(text) = encode(&ServerMessage::NewEvent(event)) else {
            return;
        };

        for subscriber in self.registry.subscribers_of(topic) {
            if self.registry.subscriber_count_of(topic) == 0 {
                self.close_stream(topic, CloseReason::NoSubscribers);
                return;
            }

            let delivered = self
                .clients
                .get(&subscriber)
                .is_some_and(|client| client.send_text(text.clone()).is_ok());
            if !delivered {
                warn!(topic, client_id = %subscriber, "failed to deliver event");
                self.close_stream(topic, CloseReason::DeliveryFailed);
                return;
            }
        }
        trace!(topic, "event delivered");
    }

    fn broadcast_topic_stats(&self, topic: &str) {
        let update = ServerMessage::QueryUpdate(stats::topic_stats(&self.registry, topic));
        let Some(text) = encode(&update) else {
            return;
        };
        for subscriber in self.registry.subscribers_of(topic) {
            if let Some(client) = self.clients.get(&subscriber) {
                let _ = client.send_text(text.clone());
            }
        }
    }

    fn broadcast_global_stats(&self) {
        let Some(text) = encode(&ServerMessage::StatsUpdate(self.global_stats())) else {
            return;
        };
        for client in self.clients.values() {
            let _ = client.send_text(text.clone());
        }
    }
}

/// Locks the relay, recovering the guard if a previous holder panicked.
pub fn lock(relay: &Mutex<Relay>) -> MutexGuard<'_, Relay> {
    relay.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn encode<T: Serialize>(message: &T) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("Failed to serialize message: {e}");
            None
        }
    }
}
