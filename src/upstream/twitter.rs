//! Twitter v1.1 upstream
//!
//! Filtered streams are long-lived `statuses/filter` requests whose body is a
//! sequence of newline-delimited JSON objects interleaved with blank
//! keep-alive lines. Each opened stream runs in its own task and is stopped
//! through a `CancellationToken`.
//!
//! `statuses/filter` only accepts user-context requests, so streams are
//! signed with OAuth 1.0a (HMAC-SHA1). Search may use an app bearer token.

use std::fmt;

use futures_util::StreamExt;
use oauth1_request::{HMAC_SHA1, Token};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use async_trait::async_trait;

use crate::broker::event::RawEvent;
use crate::config::UpstreamSettings;
use crate::upstream::{
    SearchOutcome, SignalSender, StreamEvent, StreamHandle, StreamId, StreamSignal, Upstream,
    UpstreamError,
};

const FILTER_PATH: &str = "/1.1/statuses/filter.json";
const SEARCH_PATH: &str = "/1.1/search/tweets.json";

/// Longest line kept while waiting for its newline.
pub(crate) const MAX_LINE_BYTES: usize = 1024 * 1024;

/// User-context OAuth 1.0a credentials used to sign upstream requests.
#[derive(Clone)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl OAuthCredentials {
    pub fn from_settings(settings: &UpstreamSettings) -> Result<Self, UpstreamError> {
        fn required(value: &Option<String>, key: &'static str) -> Result<String, UpstreamError> {
            value.clone().ok_or(UpstreamError::MissingCredentials(key))
        }

        Ok(Self {
            consumer_key: required(&settings.consumer_key, "upstream.consumer_key")?,
            consumer_secret: required(&settings.consumer_secret, "upstream.consumer_secret")?,
            access_token: required(&settings.access_token, "upstream.access_token")?,
            access_token_secret: required(
                &settings.access_token_secret,
                "upstream.access_token_secret",
            )?,
        })
    }

    fn token(&self) -> Token<&str, &str> {
        Token::from_parts(
            self.consumer_key.as_str(),
            self.consumer_secret.as_str(),
            self.access_token.as_str(),
            self.access_token_secret.as_str(),
        )
    }
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

#[derive(oauth1_request::Request)]
struct FilterParams<'a> {
    track: &'a str,
}

#[derive(oauth1_request::Request)]
struct SearchParams<'a> {
    q: &'a str,
}

#[derive(Clone)]
pub struct TwitterUpstream {
    client: reqwest::Client,
    api_url: String,
    stream_url: String,
    oauth: OAuthCredentials,
    bearer_token: Option<String>,
}

impl fmt::Debug for TwitterUpstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterUpstream")
            .field("api_url", &self.api_url)
            .field("stream_url", &self.stream_url)
            .field("oauth", &self.oauth)
            .field("bearer_token", &self.bearer_token.is_some())
            .finish()
    }
}

impl TwitterUpstream {
    pub fn new(
        api_url: impl Into<String>,
        stream_url: impl Into<String>,
        oauth: OAuthCredentials,
        bearer_token: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            stream_url: stream_url.into().trim_end_matches('/').to_string(),
            oauth,
            bearer_token,
        }
    }

    pub fn from_settings(settings: &UpstreamSettings) -> Result<Self, UpstreamError> {
        let oauth = OAuthCredentials::from_settings(settings)?;
        Ok(Self::new(
            &settings.api_url,
            &settings.stream_url,
            oauth,
            settings.bearer_token.clone(),
        ))
    }

    async fn pump(
        &self,
        term: &str,
        stream_id: StreamId,
        signals: &SignalSender,
    ) -> Result<(), UpstreamError> {
        let url = format!("{}{FILTER_PATH}", self.stream_url);
        let params = FilterParams { track: term };
        let authorization = oauth1_request::post(&url, &params, &self.oauth.token(), HMAC_SHA1);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(oauth1_request::to_form(&params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }
        info!(term, stream_id, "upstream stream connected");

        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::default();
        while let Some(chunk) = body.next().await {
            for line in lines.push(&chunk?)? {
                let raw = match serde_json::from_str::<RawEvent>(&line) {
                    Ok(raw) => raw,
                    Err(e) => {
                        debug!(term, stream_id, error = %e, "skipping unparseable stream line");
                        continue;
                    }
                };
                let signal = StreamSignal::new(term, stream_id, StreamEvent::Data(raw));
                if signals.send(signal).is_err() {
                    // relay is gone; nobody is listening any more
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    statuses: Option<Vec<RawEvent>>,
}

#[async_trait]
impl Upstream for TwitterUpstream {
    fn open_filtered_stream(
        &self,
        term: &str,
        stream_id: StreamId,
        signals: SignalSender,
    ) -> Box<dyn StreamHandle> {
        let cancel = CancellationToken::new();
        let upstream = self.clone();
        let term = term.to_string();
        let token = cancel.clone();

        tokio::spawn(async move {
            let terminal = tokio::select! {
                biased;
                _ = token.cancelled() => StreamEvent::End,
                result = upstream.pump(&term, stream_id, &signals) => match result {
                    Ok(()) => StreamEvent::End,
                    Err(e) => {
                        warn!(term = %term, stream_id, error = %e, "upstream stream failed");
                        StreamEvent::Error(e.to_string())
                    }
                },
            };
            let _ = signals.send(StreamSignal::new(term, stream_id, terminal));
        });

        Box::new(TwitterStreamHandle { cancel })
    }

    async fn search(&self, term: &str) -> Result<SearchOutcome, UpstreamError> {
        let url = format!("{}{SEARCH_PATH}", self.api_url);
        let request = match &self.bearer_token {
            Some(token) => self.client.get(&url).query(&[("q", term)]).bearer_auth(token),
            None => {
                let params = SearchParams { q: term };
                let authorization =
                    oauth1_request::get(&url, &params, &self.oauth.token(), HMAC_SHA1);
                self.client
                    .get(oauth1_request::to_query(url, &params))
                    .header(AUTHORIZATION, authorization)
            }
        };
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let body: SearchResponse = response.json().await?;
        Ok(match body.statuses {
            Some(statuses) => SearchOutcome::Found(statuses),
            None => SearchOutcome::NoData,
        })
    }
}

#[derive(Debug)]
struct TwitterStreamHandle {
    cancel: CancellationToken,
}

impl StreamHandle for TwitterStreamHandle {
    fn close(&mut self) {
        self.cancel.cancel();
    }
}

/// Reassembles newline-delimited records from arbitrarily split chunks.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends `chunk` and returns every complete, non-blank line. Fails once
    /// an unterminated line grows past [`MAX_LINE_BYTES`].
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, UpstreamError> {
        // everything already pending has been scanned and holds no newline
        let mut from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            let text = String::from_utf8_lossy(&self.pending[start..end]);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
            start = end + 1;
            from = start;
        }
        self.pending.drain(..start);

        if self.pending.len() > MAX_LINE_BYTES {
            self.pending.clear();
            return Err(UpstreamError::LineTooLong {
                limit: MAX_LINE_BYTES,
            });
        }
        Ok(lines)
    }
}
