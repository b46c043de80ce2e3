//! Event shapes
//!
//! `RawEvent` mirrors the upstream payload loosely: every field is optional
//! so a malformed payload still deserializes and can be rejected by
//! validation instead of failing the whole stream. `NormalizedEvent` and
//! `SearchItem` are the stable records handed to clients.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEvent {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user: Option<RawAuthor>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub topic: String,
    pub id: Option<u64>,
    pub text: String,
    pub author_image: Option<String>,
    pub author_handle: String,
    pub author_name: String,
}

impl NormalizedEvent {
    /// Re-shapes a raw event for `topic`. Returns `None` when the event lacks
    /// a non-empty author handle or author name.
    pub fn from_raw(topic: &str, raw: RawEvent) -> Option<Self> {
        let user = raw.user?;
        let author_handle = user.screen_name.filter(|s| !s.is_empty())?;
        let author_name = user.name.filter(|s| !s.is_empty())?;

        Some(Self {
            topic: topic.to_string(),
            id: raw.id,
            text: raw.text.unwrap_or_default(),
            author_image: user.profile_image_url,
            author_handle,
            author_name,
        })
    }
}

/// One entry of a one-shot search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub id: Option<u64>,
    pub text: String,
    pub author_image: Option<String>,
    pub author_handle: Option<String>,
}

impl From<RawEvent> for SearchItem {
    fn from(raw: RawEvent) -> Self {
        let (author_image, author_handle) = match raw.user {
            Some(user) => (user.profile_image_url, user.screen_name),
            None => (None, None),
        };
        Self {
            id: raw.id,
            text: raw.text.unwrap_or_default(),
            author_image,
            author_handle,
        }
    }
}
