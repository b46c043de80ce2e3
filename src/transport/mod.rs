//! The `transport` module is the gateway in front of the relay.
//!
//! It defines the JSON protocol spoken over WebSockets, runs the WebSocket
//! server that turns client frames into relay joins and leaves, and serves
//! the read-only HTTP API (health, stats, one-shot search).

pub mod http;
pub mod message;
pub mod websocket;
