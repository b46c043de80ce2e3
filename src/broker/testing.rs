//! Recording upstream used by the relay and gateway tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Relay;
use crate::broker::event::{RawAuthor, RawEvent};
use crate::client::Client;
use crate::upstream::{
    SearchOutcome, SignalSender, StreamHandle, StreamId, StreamSignal, Upstream, UpstreamError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedStream {
    pub term: String,
    pub stream_id: StreamId,
}

#[derive(Debug, Default)]
pub struct MockUpstream {
    pub opened: Mutex<Vec<OpenedStream>>,
    pub close_calls: Arc<AtomicUsize>,
    pub search_result: Mutex<Option<Result<SearchOutcome, UpstreamError>>>,
}

impl MockUpstream {
    pub fn opened(&self) -> Vec<OpenedStream> {
        self.opened.lock().unwrap().clone()
    }

    pub fn opens_for(&self, term: &str) -> usize {
        self.opened().iter().filter(|s| s.term == term).count()
    }

    pub fn last_stream_id(&self, term: &str) -> StreamId {
        self.opened()
            .iter()
            .rev()
            .find(|s| s.term == term)
            .map(|s| s.stream_id)
            .expect("no stream opened for term")
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn set_search_result(&self, result: Result<SearchOutcome, UpstreamError>) {
        *self.search_result.lock().unwrap() = Some(result);
    }
}

#[derive(Debug)]
struct MockHandle {
    close_calls: Arc<AtomicUsize>,
}

impl StreamHandle for MockHandle {
    fn close(&mut self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    fn open_filtered_stream(
        &self,
        term: &str,
        stream_id: StreamId,
        _signals: SignalSender,
    ) -> Box<dyn StreamHandle> {
        self.opened.lock().unwrap().push(OpenedStream {
            term: term.to_string(),
            stream_id,
        });
        Box::new(MockHandle {
            close_calls: self.close_calls.clone(),
        })
    }

    async fn search(&self, _term: &str) -> Result<SearchOutcome, UpstreamError> {
        self.search_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Ok(SearchOutcome::NoData))
    }
}

pub fn relay_with_mock() -> (
    Relay,
    Arc<MockUpstream>,
    mpsc::UnboundedReceiver<StreamSignal>,
) {
    let upstream = Arc::new(MockUpstream::default());
    let (tx, rx) = mpsc::unbounded_channel();
    (Relay::new(upstream.clone(), tx), upstream, rx)
}

pub fn connect(relay: &mut Relay) -> (String, mpsc::UnboundedReceiver<WsMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = Client::new(tx);
    let id = client.id.clone();
    relay.register_client(client);
    (id, rx)
}

pub fn raw_event(id: u64, handle: &str, name: &str) -> RawEvent {
    RawEvent {
        id: Some(id),
        text: Some(format!("event {id}")),
        user: Some(RawAuthor {
            profile_image_url: Some(format!("https://img.example/{handle}.png")),
            screen_name: Some(handle.to_string()),
            name: Some(name.to_string()),
        }),
    }
}

/// Drains every queued frame as parsed JSON.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<WsMessage>) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let WsMessage::Text(text) = msg {
            frames.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    frames
}

pub fn frames_of_type<'a>(
    frames: &'a [serde_json::Value],
    kind: &str,
) -> Vec<&'a serde_json::Value> {
    frames.iter().filter(|f| f["type"] == kind).collect()
}
