//! Upstream payload schema and the validated `Payload` value
//!
//! The schema mirrors the YouTube Data API `search.list` response. A body only
//! becomes a `Payload` after it has been deserialized into `SearchListResponse`
//! and serialized back out, so anything stored in the cache is well-formed JSON
//! of the expected shape rather than a raw upstream body.

pub mod fetcher;
pub mod youtube;

pub use fetcher::{FetchError, Fetcher};
pub use youtube::YouTubeClient;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// `kind` value of a search listing
pub const SEARCH_LIST_KIND: &str = "youtube#searchListResponse";

/// Top-level search listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchListResponse {
    pub kind: String,
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub next_page_token: String,
    #[serde(default)]
    pub region_code: String,
    #[serde(default)]
    pub page_info: PageInfo,
    pub items: Vec<SearchResult>,
}

/// Paging information for a listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    pub total_results: i64,
    pub results_per_page: i64,
}

/// A single search hit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResult {
    pub kind: String,
    pub etag: String,
    pub id: ResourceId,
    pub snippet: Snippet,
}

/// Identifies the video a search hit refers to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceId {
    pub kind: String,
    pub video_id: String,
}

/// Descriptive metadata for a search hit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snippet {
    pub published_at: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub thumbnails: Thumbnails,
    pub channel_title: String,
    pub live_broadcast_content: String,
    pub publish_time: String,
}

/// Thumbnail set at the three standard sizes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thumbnails {
    pub default: Thumbnail,
    pub medium: Thumbnail,
    pub high: Thumbnail,
}

/// A single thumbnail image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thumbnail {
    pub url: String,
    pub width: i64,
    pub height: i64,
}

impl SearchListResponse {
    /// Deserializes and checks an upstream body
    ///
    /// # Returns
    /// * `Ok(SearchListResponse)` if the body has the expected shape
    /// * `Err(FetchError::Validation)` if it is malformed or of another kind
    pub fn from_slice(body: &[u8]) -> Result<Self, FetchError> {
        let response: SearchListResponse = serde_json::from_slice(body)
            .map_err(|e| FetchError::Validation(e.to_string()))?;

        if response.kind != SEARCH_LIST_KIND {
            return Err(FetchError::Validation(format!(
                "unexpected kind '{}', expected '{}'",
                response.kind, SEARCH_LIST_KIND
            )));
        }

        Ok(response)
    }

    /// Serializes the validated listing into its canonical payload
    pub fn into_payload(self) -> Result<Payload, FetchError> {
        let json =
            serde_json::to_string(&self).map_err(|e| FetchError::Validation(e.to_string()))?;
        Ok(Payload(Arc::from(json)))
    }
}

/// Canonical JSON string of a validated search listing
///
/// Cloning is cheap; every caller served from the cache shares one buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Payload(Arc<str>);

impl Payload {
    /// Validates `body` against the schema and re-encodes it canonically
    pub fn from_upstream(body: &[u8]) -> Result<Self, FetchError> {
        SearchListResponse::from_slice(body)?.into_payload()
    }

    /// Returns the JSON text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the payload back into the schema
    pub fn parse(&self) -> Result<SearchListResponse, FetchError> {
        SearchListResponse::from_slice(self.0.as_bytes())
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Payload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
