//! The broker: topic registry, stats derivation, event shapes and the relay
//! engine that supervises one upstream stream per subscribed topic.

pub mod engine;
pub mod event;
pub mod registry;
pub mod stats;
pub mod topic;

pub use engine::{CloseReason, Relay, StreamState};

#[cfg(test)]
pub(crate) mod testing;
