//! # streamrelay
//!
//! `streamrelay` relays a live upstream event stream to WebSocket clients
//! grouped by topic. Clients join a topic (a search term); the first join
//! opens one upstream filtered stream for the topic and the last leave
//! closes it. Every event is fanned out to the topic's current subscribers.
//!
//! ## Core Modules
//!
//! - `broker`: the relay engine, topic registry, event shapes and stats.
//! - `client`: a connected WebSocket client.
//! - `config`: layered configuration (defaults, file, environment).
//! - `transport`: the WebSocket gateway and the read-only HTTP API.
//! - `upstream`: the upstream contract and the Twitter implementation.
//! - `utils`: error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod upstream;
pub mod utils;
