//! Process-wide configuration resolved once at startup
//!
//! Values come from environment variables. The request target for the
//! upstream search endpoint is derived from them; when the API key or channel
//! is missing the target cannot be built and every fetch reports a
//! configuration error instead of issuing a request.

use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

/// YouTube Data API search endpoint
pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";

/// Environment variable holding the API key
pub const API_KEY_VAR: &str = "apiKey";

/// Environment variable holding the channel to list uploads for
pub const CHANNEL_ID_VAR: &str = "channelId";

/// Environment variable overriding the cache TTL, in minutes
pub const CACHE_MINUTES_VAR: &str = "cacheMinutes";

/// Environment variable overriding the number of results requested
pub const MAX_RESULTS_VAR: &str = "maxResults";

/// Default cache TTL in minutes
const DEFAULT_CACHE_MINUTES: u64 = 15;

/// Default number of videos requested per search
const DEFAULT_MAX_RESULTS: u32 = 10;

/// Errors produced while resolving configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is unset or blank
    #[error("required configuration `{0}` is missing or empty")]
    Missing(&'static str),

    /// A numeric variable could not be parsed
    #[error("configuration `{var}` must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    /// The endpoint is not an absolute URL
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Upstream API key
    pub api_key: Option<String>,
    /// Channel whose latest uploads are listed
    pub channel_id: Option<String>,
    /// Maximum number of results per search
    pub max_results: u32,
    /// How long a fetched payload is served before a refresh is attempted
    pub ttl: Duration,
    /// Search endpoint (overridable for testing)
    pub endpoint: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            channel_id: None,
            max_results: DEFAULT_MAX_RESULTS,
            ttl: Duration::from_secs(DEFAULT_CACHE_MINUTES * 60),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl Config {
    /// Reads configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary variable lookup
    ///
    /// Missing credentials are not an error here; they surface when the
    /// request target is built. Malformed numbers are rejected immediately.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Config {
            api_key: lookup(API_KEY_VAR),
            channel_id: lookup(CHANNEL_ID_VAR),
            ..Config::default()
        };

        if let Some(raw) = lookup(CACHE_MINUTES_VAR) {
            let minutes = parse_positive(CACHE_MINUTES_VAR, &raw)?;
            config.ttl = ttl_from_minutes(minutes).ok_or(ConfigError::InvalidNumber {
                var: CACHE_MINUTES_VAR,
                value: raw,
            })?;
        }

        if let Some(max_results) = lookup(MAX_RESULTS_VAR) {
            let max_results = parse_positive(MAX_RESULTS_VAR, &max_results)?;
            config.max_results = u32::try_from(max_results).map_err(|_| {
                ConfigError::InvalidNumber {
                    var: MAX_RESULTS_VAR,
                    value: max_results.to_string(),
                }
            })?;
        }

        Ok(config)
    }

    /// Builds the fully parameterised search URL
    ///
    /// # Returns
    /// * `Ok(Url)` with part, channel, result limit, ordering, type and key set
    /// * `Err(ConfigError::Missing)` if the key or channel is absent or blank
    /// * `Err(ConfigError::InvalidEndpoint)` if the endpoint cannot be parsed
    pub fn request_url(&self) -> Result<Url, ConfigError> {
        let api_key = required(API_KEY_VAR, self.api_key.as_deref())?;
        let channel_id = required(CHANNEL_ID_VAR, self.channel_id.as_deref())?;
        let max_results = self.max_results.to_string();

        Url::parse_with_params(
            &self.endpoint,
            &[
                ("part", "snippet"),
                ("channelId", channel_id),
                ("maxResults", max_results.as_str()),
                ("order", "date"),
                ("type", "video"),
                ("key", api_key),
            ],
        )
        .map_err(|e| ConfigError::InvalidEndpoint(format!("{}: {}", self.endpoint, e)))
    }
}

/// Converts a TTL in minutes, or `None` if it does not fit in seconds
pub fn ttl_from_minutes(minutes: u64) -> Option<Duration> {
    minutes.checked_mul(60).map(Duration::from_secs)
}

fn required<'a>(var: &'static str, value: Option<&'a str>) -> Result<&'a str, ConfigError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}
