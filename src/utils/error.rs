//! The `error` module defines the process-level error type for `streamrelay`.
//!
//! The relay core never fails: every fault inside it degrades to "stop
//! streaming this topic". What can fail is everything around it, such as
//! loading configuration, binding sockets and talking to the upstream API.

use thiserror::Error;

use crate::upstream::UpstreamError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
