//! latestvids - serve a cached snapshot of a channel's latest uploads
//!
//! Stands in for the serverless runtime: resolves configuration once, warms
//! the cache, then dispatches rounds of handler invocations and prints each
//! payload on stdout. Logs go to stderr.

use std::sync::Arc;

use clap::Parser;
use futures::future::join_all;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use latestvids::cache::TtlCache;
use latestvids::cli::{Cli, InvocationPlan};
use latestvids::config::Config;
use latestvids::context::Context;
use latestvids::data::{FetchError, YouTubeClient};

/// Installs the stderr log subscriber, honouring `RUST_LOG` when set
fn init_logging(verbose: bool) {
    let filter = if verbose {
        "latestvids=debug,warn"
    } else {
        "latestvids=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Derives the context for one invocation
fn invocation_context(root: &Context, plan: &InvocationPlan) -> Context {
    match plan.timeout {
        Some(timeout) => root.with_timeout(timeout),
        None => root.child(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let plan = InvocationPlan::from_cli(&cli)?;
    let mut config = Config::from_env()?;
    cli.apply_overrides(&mut config)?;

    let client = YouTubeClient::new(&config);
    if let Err(e) = client.target() {
        warn!(error = %e, "request target unavailable, every fetch will fail");
    }
    let cache = Arc::new(TtlCache::new(client, config.ttl));

    // Ctrl-C cancels everything derived from the root context
    let root = Context::background();
    let interrupt = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling in-flight invocations");
            interrupt.cancel();
        }
    });

    cache.warm(&root).await;

    let mut last_error: Option<FetchError> = None;
    for round in 0..plan.rounds {
        if round > 0 && root.run(tokio::time::sleep(plan.interval)).await.is_err() {
            break;
        }

        let invocations = (0..plan.concurrency).map(|_| {
            let cache = Arc::clone(&cache);
            let ctx = invocation_context(&root, &plan);
            async move { cache.handle(&ctx).await }
        });

        last_error = None;
        for outcome in join_all(invocations).await {
            match outcome {
                Ok(payload) => println!("{payload}"),
                Err(e) => {
                    error!(round, error = %e, "invocation failed");
                    last_error = Some(e);
                }
            }
        }

        let status = cache.status().await;
        info!(round, state = ?status.state, fetched_at = ?status.fetched_at, "round complete");
    }

    match last_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
