use serde::{Deserialize, Serialize};

use crate::broker::event::NormalizedEvent;
use crate::broker::stats::{GlobalStats, TopicStats};

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join")]
    Join { query: String },
    #[serde(rename = "leave")]
    Leave { query: String },
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "host")]
    Host { hostname: String },
    #[serde(rename = "new_event")]
    NewEvent(NormalizedEvent),
    #[serde(rename = "query_update")]
    QueryUpdate(TopicStats),
    #[serde(rename = "stats_update")]
    StatsUpdate(GlobalStats),
    #[serde(rename = "error")]
    Error { message: String },
}
