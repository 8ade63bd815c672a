//! YouTube Data API client
//!
//! Fetches the channel's latest uploads from the `search.list` endpoint and
//! validates the response into a canonical `Payload`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::fetcher::{FetchError, Fetcher};
use super::Payload;
use crate::config::{Config, ConfigError};
use crate::context::Context;

/// Client for the upstream search endpoint
///
/// The request target is built once from configuration. If that failed the
/// client still exists, but every fetch reports the configuration error
/// without touching the network.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Pre-built search URL, or the reason it could not be built
    target: Result<Url, ConfigError>,
}

impl YouTubeClient {
    /// Creates a client for the search described by `config`
    pub fn new(config: &Config) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a client with a custom HTTP client
    pub fn with_client(http_client: Client, config: &Config) -> Self {
        Self {
            http_client,
            target: config.request_url(),
        }
    }

    /// Returns the request target, if configuration allowed building one
    pub fn target(&self) -> Result<&Url, &ConfigError> {
        self.target.as_ref()
    }
}

#[async_trait]
impl Fetcher for YouTubeClient {
    async fn fetch(&self, ctx: &Context) -> Result<Payload, FetchError> {
        let url = self.target.clone()?;
        debug!(endpoint = %url.path(), "requesting latest uploads");

        let response = ctx
            .run(self.http_client.get(url).send())
            .await?
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::Transport(Arc::new(e)))?;

        let body = ctx
            .run(response.bytes())
            .await?
            .map_err(|e| FetchError::Body(Arc::new(e)))?;

        Payload::from_upstream(&body)
    }
}
