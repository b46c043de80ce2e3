//! The `upstream` module is the contract between the relay and the external
//! event source, plus the HTTP implementation against the Twitter v1.1 API.
//!
//! A filtered stream is opened synchronously and reports back asynchronously:
//! the implementation pushes [`StreamSignal`]s into the channel it was given,
//! tagged with the topic and the [`StreamId`] the relay assigned. Every stream
//! ends with exactly one terminal signal (`End` or `Error`), including streams
//! that were closed through their [`StreamHandle`].

pub mod search;
pub mod twitter;

use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::broker::event::RawEvent;

pub use search::{SearchOutcome, search_once};
pub use twitter::{OAuthCredentials, TwitterUpstream};

/// Identifies one opened upstream stream. Ids are never reused, so a signal
/// from a stream that has since been replaced can be told apart.
pub type StreamId = u64;

pub type SignalSender = UnboundedSender<StreamSignal>;

#[derive(Debug, Clone)]
pub struct StreamSignal {
    pub topic: String,
    pub stream_id: StreamId,
    pub event: StreamEvent,
}

impl StreamSignal {
    pub fn new(topic: impl Into<String>, stream_id: StreamId, event: StreamEvent) -> Self {
        Self {
            topic: topic.into(),
            stream_id,
            event,
        }
    }
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Data(RawEvent),
    Error(String),
    End,
}

/// Owned handle to a live upstream stream.
///
/// `close` must be safe to call any number of times. Teardown is confirmed
/// later by the stream's terminal signal, not by the return of `close`.
pub trait StreamHandle: Send + Debug {
    fn close(&mut self);
}

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Start a stream of events matching `term`. Signals for it are sent on
    /// `signals` tagged with `stream_id`.
    fn open_filtered_stream(
        &self,
        term: &str,
        stream_id: StreamId,
        signals: SignalSender,
    ) -> Box<dyn StreamHandle>;

    /// One-shot search for `term`.
    async fn search(&self, term: &str) -> Result<SearchOutcome, UpstreamError>;
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream OAuth credentials are not configured (missing {0})")]
    MissingCredentials(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("upstream sent a line longer than {limit} bytes")]
    LineTooLong { limit: usize },
}
