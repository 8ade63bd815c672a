//! Command-line interface parsing for latestvids
//!
//! The binary stands in for the hosting runtime: it builds the cache once and
//! then dispatches rounds of invocations against it. Flags here override the
//! environment configuration and describe how those rounds are driven.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::config::{ttl_from_minutes, Config};

/// Longest accepted per-invocation deadline (one day)
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Error types for CLI argument validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// A count that must be at least one was zero
    #[error("Invalid value for --{flag}: must be at least 1")]
    ZeroCount { flag: &'static str },

    /// A value too large to represent as a duration
    #[error("Invalid value for --{flag}: must be at most {max}")]
    TooLarge { flag: &'static str, max: u64 },
}

/// latestvids - serve a cached listing of a channel's latest uploads
#[derive(Parser, Debug)]
#[command(name = "latestvids")]
#[command(about = "Serve a TTL-cached snapshot of a YouTube channel's latest uploads")]
#[command(version)]
pub struct Cli {
    /// Cache time-to-live in minutes (overrides `cacheMinutes`)
    #[arg(long, value_name = "MINUTES")]
    pub ttl_minutes: Option<u64>,

    /// Maximum number of videos to request (overrides `maxResults`)
    #[arg(long, value_name = "COUNT")]
    pub max_results: Option<u32>,

    /// Search endpoint URL
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Number of invocation rounds to run
    #[arg(long, default_value_t = 1)]
    pub invocations: u32,

    /// Overlapping invocations per round
    #[arg(long, default_value_t = 1)]
    pub concurrency: u32,

    /// Seconds to wait between rounds
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub interval_secs: u64,

    /// Per-invocation deadline in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// How the binary drives the handler, derived from CLI arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationPlan {
    /// Number of rounds
    pub rounds: u32,
    /// Concurrent invocations per round
    pub concurrency: u32,
    /// Pause between rounds
    pub interval: Duration,
    /// Deadline applied to each invocation
    pub timeout: Option<Duration>,
}

impl Default for InvocationPlan {
    fn default() -> Self {
        Self {
            rounds: 1,
            concurrency: 1,
            interval: Duration::ZERO,
            timeout: None,
        }
    }
}

impl InvocationPlan {
    /// Creates an InvocationPlan from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(InvocationPlan)` with the requested schedule
    /// * `Err(CliError)` if a count is zero or the timeout is out of range
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.invocations == 0 {
            return Err(CliError::ZeroCount { flag: "invocations" });
        }
        if cli.concurrency == 0 {
            return Err(CliError::ZeroCount { flag: "concurrency" });
        }
        match cli.timeout_secs {
            Some(0) => return Err(CliError::ZeroCount { flag: "timeout-secs" }),
            Some(secs) if secs > MAX_TIMEOUT_SECS => {
                return Err(CliError::TooLarge {
                    flag: "timeout-secs",
                    max: MAX_TIMEOUT_SECS,
                })
            }
            _ => {}
        }

        Ok(InvocationPlan {
            rounds: cli.invocations,
            concurrency: cli.concurrency,
            interval: Duration::from_secs(cli.interval_secs),
            timeout: cli.timeout_secs.map(Duration::from_secs),
        })
    }
}

impl Cli {
    /// Applies flag overrides on top of environment configuration
    pub fn apply_overrides(&self, config: &mut Config) -> Result<(), CliError> {
        if let Some(minutes) = self.ttl_minutes {
            if minutes == 0 {
                return Err(CliError::ZeroCount { flag: "ttl-minutes" });
            }
            config.ttl = ttl_from_minutes(minutes).ok_or(CliError::TooLarge {
                flag: "ttl-minutes",
                max: u64::MAX / 60,
            })?;
        }
        if let Some(max_results) = self.max_results {
            if max_results == 0 {
                return Err(CliError::ZeroCount { flag: "max-results" });
            }
            config.max_results = max_results;
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        Ok(())
    }
}
