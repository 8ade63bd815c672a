//! The `Fetcher` contract used by the cache controller

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::Payload;
use crate::config::ConfigError;
use crate::context::{Context, ContextError};

/// Everything that can go wrong while producing a fresh payload
///
/// The enum is `Clone` so a single failed attempt can be reported to every
/// caller that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request target could not be built
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The upstream could not be reached or answered with an error status
    #[error("HTTP request failed: {0}")]
    Transport(#[source] Arc<reqwest::Error>),

    /// The response body could not be read
    #[error("failed to read response body: {0}")]
    Body(#[source] Arc<reqwest::Error>),

    /// The body does not conform to the search listing schema
    #[error("upstream payload failed validation: {0}")]
    Validation(String),

    /// The caller's context ended first
    #[error("fetch abandoned: {0}")]
    Cancelled(#[from] ContextError),
}

impl FetchError {
    /// True when the failure came from the caller's context, not the upstream
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled(_))
    }
}

/// Produces one fresh, validated payload per call
///
/// Implementations perform a single attempt with no retries and never touch
/// cache state.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, ctx: &Context) -> Result<Payload, FetchError>;
}

#[async_trait]
impl<F> Fetcher for Arc<F>
where
    F: Fetcher + ?Sized,
{
    async fn fetch(&self, ctx: &Context) -> Result<Payload, FetchError> {
        (**self).fetch(ctx).await
    }
}
