use serde::Deserialize;

use crate::upstream::search::DEFAULT_SEARCH_LIMIT;

/// Top-level configuration settings for the application.
///
/// Includes settings for the gateway servers, the upstream API and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub upstream: UpstreamSettings,
    pub log: LogSettings,
}

/// Configuration settings for the gateway.
///
/// `port` serves the WebSocket gateway, `http_port` the read-only HTTP API.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub http_port: u16,
    pub hostname: String,
}

/// Configuration settings for the upstream event source.
///
/// Filtered streams need user-context OAuth 1.0a credentials. Search uses
/// `bearer_token` when one is set and the OAuth credentials otherwise.
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    pub api_url: String,
    pub stream_url: String,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
    pub bearer_token: Option<String>,
    pub search_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub upstream: Option<PartialUpstreamSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub http_port: Option<u16>,
    pub hostname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialUpstreamSettings {
    pub api_url: Option<String>,
    pub stream_url: Option<String>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
    pub bearer_token: Option<String>,
    pub search_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// Everything except the upstream credentials has a usable default.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 3003,
                http_port: 3004,
                hostname: machine_hostname(),
            },
            upstream: UpstreamSettings {
                api_url: "https://api.twitter.com".to_string(),
                stream_url: "https://stream.twitter.com".to_string(),
                consumer_key: None,
                consumer_secret: None,
                access_token: None,
                access_token_secret: None,
                bearer_token: None,
                search_limit: DEFAULT_SEARCH_LIMIT,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    pub fn ws_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}

fn machine_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
