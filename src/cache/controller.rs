//! Single-entry TTL cache with coalesced refresh
//!
//! `TtlCache` owns one cached payload, the time it was last refreshed and the
//! lock that serializes every invocation. Each call to [`TtlCache::handle`]
//! either serves the cached payload or performs exactly one upstream fetch
//! while holding the lock, so concurrent callers never trigger redundant
//! fetches and always observe the entry the last fetch left behind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use crate::context::Context;
use crate::data::{FetchError, Fetcher, Payload};

/// Freshness of the cached entry at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No payload has ever been fetched successfully
    Empty,
    /// A payload is cached and younger than the TTL
    Fresh,
    /// A payload is cached but its TTL has elapsed
    Stale,
}

/// Snapshot of the cache for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub state: CacheState,
    /// Time of the last completed fetch attempt
    pub fetched_at: Option<DateTime<Utc>>,
}

/// The single mutable cache record
#[derive(Debug, Default)]
struct CacheEntry {
    /// Last successfully fetched payload
    value: Option<Payload>,
    /// Last completed fetch attempt, successful or not
    fetched_at: Option<DateTime<Utc>>,
    /// Error from the last attempt, cleared on success
    last_error: Option<FetchError>,
    /// Number of finished fetch attempts, bumped under the lock
    generation: u64,
}

impl CacheEntry {
    fn state(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> CacheState {
        match (&self.value, self.fetched_at) {
            (None, _) => CacheState::Empty,
            (Some(_), Some(at)) if now.signed_duration_since(at) < ttl => CacheState::Fresh,
            (Some(_), _) => CacheState::Stale,
        }
    }
}

/// Time-to-live cache in front of a [`Fetcher`]
///
/// Construct once and share behind an `Arc`; there is no global state.
pub struct TtlCache<F, C = SystemClock> {
    fetcher: F,
    clock: C,
    ttl: chrono::Duration,
    entry: Mutex<CacheEntry>,
    /// Last attempt generation whose lock has been released. Read before
    /// locking so a caller can tell whether an attempt finished while it was
    /// queued; it lags `CacheEntry::generation` until the holder unlocks.
    published: AtomicU64,
}

impl<F: Fetcher> TtlCache<F> {
    /// Creates an empty cache using the system clock
    pub fn new(fetcher: F, ttl: Duration) -> Self {
        Self::with_clock(fetcher, ttl, SystemClock)
    }
}

impl<F: Fetcher, C: Clock> TtlCache<F, C> {
    /// Creates an empty cache driven by `clock`
    pub fn with_clock(fetcher: F, ttl: Duration, clock: C) -> Self {
        Self {
            fetcher,
            clock,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            entry: Mutex::new(CacheEntry::default()),
            published: AtomicU64::new(0),
        }
    }

    /// The configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl.to_std().unwrap_or(Duration::MAX)
    }

    /// Pre-warms the cache with one fetch attempt
    ///
    /// Failure is logged and otherwise ignored; the cache stays Empty and the
    /// next `handle` call tries again.
    pub async fn warm(&self, ctx: &Context) {
        match self.handle(ctx).await {
            Ok(_) => info!("cache warmed"),
            Err(e) => warn!(error = %e, "initial fetch failed, starting with an empty cache"),
        }
    }

    /// Serves the cached payload, refreshing it first when Empty or Stale
    ///
    /// # Returns
    /// * `Ok(Payload)` - the fresh payload, or the previous one when a refresh
    ///   of a Stale entry failed
    /// * `Err(FetchError)` - when nothing is cached and the fetch failed, or
    ///   the caller's context ended first
    pub async fn handle(&self, ctx: &Context) -> Result<Payload, FetchError> {
        let observed = self.published.load(Ordering::Acquire);
        self.handle_observed(ctx, observed).await
    }

    async fn handle_observed(&self, ctx: &Context, observed: u64) -> Result<Payload, FetchError> {
        let mut entry = ctx.run(self.entry.lock()).await?;

        // An attempt finished while this caller was queued; share its outcome
        // instead of fetching again.
        if entry.generation != observed {
            if let Some(err) = &entry.last_error {
                if err.is_cancelled() || entry.value.is_none() {
                    return Err(err.clone());
                }
            }
        }

        let now = self.clock.now();
        let state = entry.state(now, self.ttl);
        if let (CacheState::Fresh, Some(value)) = (state, &entry.value) {
            debug!("serving cached payload");
            return Ok(value.clone());
        }

        info!(?state, "refreshing cached payload");
        let outcome = match ctx.run(self.fetcher.fetch(ctx)).await {
            Ok(result) => result,
            Err(cancelled) => Err(FetchError::from(cancelled)),
        };
        entry.generation += 1;

        let result = match outcome {
            Ok(payload) => {
                entry.value = Some(payload.clone());
                entry.fetched_at = Some(self.clock.now());
                entry.last_error = None;
                Ok(payload)
            }
            Err(err) if err.is_cancelled() => {
                entry.last_error = Some(err.clone());
                Err(err)
            }
            Err(err) => {
                entry.fetched_at = Some(self.clock.now());
                entry.last_error = Some(err.clone());
                match &entry.value {
                    Some(previous) => {
                        warn!(error = %err, "refresh failed, serving stale payload");
                        Ok(previous.clone())
                    }
                    None => Err(err),
                }
            }
        };

        // Publish only after unlocking, so anyone who read the old generation
        // was queued behind this attempt.
        let generation = entry.generation;
        drop(entry);
        self.published.fetch_max(generation, Ordering::Release);
        result
    }

    /// Reports the cache state without fetching
    ///
    /// Waits for any in-flight refresh to finish.
    pub async fn status(&self) -> CacheStatus {
        let entry = self.entry.lock().await;
        CacheStatus {
            state: entry.state(self.clock.now(), self.ttl),
            fetched_at: entry.fetched_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn payload(etag: &str) -> Payload {
        let body = format!(r#"{{"kind":"youtube#searchListResponse","etag":"{etag}","items":[]}}"#);
        Payload::from_upstream(body.as_bytes()).expect("fixture should validate")
    }

    /// Returns the scripted outcomes in order, repeating the last one
    struct Scripted {
        outcomes: std::sync::Mutex<Vec<Result<Payload, FetchError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<Payload, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: std::sync::Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for Scripted {
        async fn fetch(&self, _ctx: &Context) -> Result<Payload, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.len() > 1 {
                outcomes.remove(0)
            } else {
                outcomes[0].clone()
            }
        }
    }

    fn cache_with(
        fetcher: &Arc<Scripted>,
        ttl: Duration,
    ) -> (TtlCache<Arc<Scripted>, Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = TtlCache::with_clock(fetcher.clone(), ttl, clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_entry_state_boundaries() {
        let ttl = chrono::Duration::minutes(2);
        let at = DateTime::<Utc>::UNIX_EPOCH;
        let entry = CacheEntry {
            value: Some(payload("p")),
            fetched_at: Some(at),
            last_error: None,
            generation: 0,
        };

        assert_eq!(entry.state(at, ttl), CacheState::Fresh);
        assert_eq!(entry.state(at + chrono::Duration::seconds(119), ttl), CacheState::Fresh);
        assert_eq!(entry.state(at + ttl, ttl), CacheState::Stale);
        assert_eq!(CacheEntry::default().state(at, ttl), CacheState::Empty);
    }

    #[test]
    fn test_clock_moving_backwards_keeps_entry_fresh() {
        let ttl = chrono::Duration::minutes(2);
        let at = DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::hours(1);
        let entry = CacheEntry {
            value: Some(payload("p")),
            fetched_at: Some(at),
            last_error: None,
            generation: 0,
        };

        assert_eq!(entry.state(at - chrono::Duration::minutes(30), ttl), CacheState::Fresh);
    }

    #[tokio::test]
    async fn test_fresh_entry_is_served_without_fetching() {
        let fetcher = Scripted::new(vec![Ok(payload("p1"))]);
        let (cache, clock) = cache_with(&fetcher, Duration::from_secs(120));
        let ctx = Context::background();

        assert_eq!(cache.handle(&ctx).await.unwrap(), payload("p1"));
        let fetched_at = cache.status().await.fetched_at;
        assert!(fetched_at.is_some());

        for _ in 0..5 {
            clock.advance(Duration::from_secs(20));
            assert_eq!(cache.handle(&ctx).await.unwrap(), payload("p1"));
        }

        assert_eq!(fetcher.calls(), 1);
        let status = cache.status().await;
        assert_eq!(status.state, CacheState::Fresh);
        assert_eq!(status.fetched_at, fetched_at, "cache hits must not re-stamp");
    }

    #[tokio::test]
    async fn test_caller_queued_behind_failed_empty_attempt_shares_error() {
        let fetcher = Scripted::new(vec![
            Err(FetchError::Validation("bad".to_string())),
            Ok(payload("p1")),
        ]);
        let (cache, _clock) = cache_with(&fetcher, Duration::from_secs(120));
        let ctx = Context::background();

        let before = cache.published.load(Ordering::Acquire);
        cache.handle(&ctx).await.expect_err("first fetch fails");

        // Anyone who read the generation before the attempt released the lock
        // joins it rather than fetching again
        let err = cache
            .handle_observed(&ctx, before)
            .await
            .expect_err("queued caller shares the failure");
        assert!(matches!(err, FetchError::Validation(_)));
        assert_eq!(fetcher.calls(), 1);

        // A caller arriving after the release starts a new attempt
        assert_eq!(cache.handle(&ctx).await.unwrap(), payload("p1"));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_generation_is_published_after_each_attempt() {
        let fetcher = Scripted::new(vec![
            Err(FetchError::Validation("bad".to_string())),
            Ok(payload("p1")),
        ]);
        let (cache, _clock) = cache_with(&fetcher, Duration::from_secs(120));
        let ctx = Context::background();

        cache.handle(&ctx).await.expect_err("first fetch fails");
        assert_eq!(cache.published.load(Ordering::Acquire), 1);
        assert_eq!(cache.entry.lock().await.generation, 1);

        cache.handle(&ctx).await.unwrap();
        cache.handle(&ctx).await.unwrap();
        assert_eq!(cache.published.load(Ordering::Acquire), 2, "hits are not attempts");
    }

    #[tokio::test]
    async fn test_empty_failure_is_returned_and_retried() {
        let fetcher = Scripted::new(vec![
            Err(FetchError::Validation("bad".to_string())),
            Ok(payload("p1")),
        ]);
        let (cache, _clock) = cache_with(&fetcher, Duration::from_secs(120));
        let ctx = Context::background();

        let err = cache.handle(&ctx).await.expect_err("first fetch fails");
        assert!(matches!(err, FetchError::Validation(_)));
        assert_eq!(cache.status().await.state, CacheState::Empty);

        // Empty is retried immediately, without waiting out the TTL
        assert_eq!(cache.handle(&ctx).await.unwrap(), payload("p1"));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_failure_restamps_and_throttles_retries() {
        let fetcher = Scripted::new(vec![
            Ok(payload("p1")),
            Err(FetchError::Validation("bad".to_string())),
        ]);
        let (cache, clock) = cache_with(&fetcher, Duration::from_secs(120));
        let ctx = Context::background();

        cache.handle(&ctx).await.unwrap();
        clock.advance(Duration::from_secs(121));

        assert_eq!(cache.handle(&ctx).await.unwrap(), payload("p1"));
        assert_eq!(fetcher.calls(), 2);

        let status = cache.status().await;
        assert_eq!(status.state, CacheState::Fresh);
        assert_eq!(status.fetched_at, Some(clock.now()));

        // Within the next window the failing upstream is not hit again
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.handle(&ctx).await.unwrap(), payload("p1"));
        assert_eq!(fetcher.calls(), 2);

        clock.advance(Duration::from_secs(61));
        assert_eq!(cache.handle(&ctx).await.unwrap(), payload("p1"));
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_warm_failure_is_not_fatal() {
        let fetcher = Scripted::new(vec![
            Err(FetchError::Validation("bad".to_string())),
            Ok(payload("p1")),
        ]);
        let (cache, _clock) = cache_with(&fetcher, Duration::from_secs(120));
        let ctx = Context::background();

        cache.warm(&ctx).await;
        assert_eq!(cache.status().await.state, CacheState::Empty);

        assert_eq!(cache.handle(&ctx).await.unwrap(), payload("p1"));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_warm_success_fills_cache() {
        let fetcher = Scripted::new(vec![Ok(payload("p1"))]);
        let (cache, _clock) = cache_with(&fetcher, Duration::from_secs(120));
        let ctx = Context::background();

        cache.warm(&ctx).await;
        assert_eq!(cache.status().await.state, CacheState::Fresh);
        assert_eq!(cache.handle(&ctx).await.unwrap(), payload("p1"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_does_not_fetch() {
        let fetcher = Scripted::new(vec![Ok(payload("p1"))]);
        let (cache, _clock) = cache_with(&fetcher, Duration::from_secs(120));
        let ctx = Context::background();
        ctx.cancel();

        let err = cache.handle(&ctx).await.expect_err("cancelled caller fails");
        assert!(err.is_cancelled());
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn test_ttl_round_trips() {
        let fetcher = Scripted::new(vec![Ok(payload("p1"))]);
        let (cache, _clock) = cache_with(&fetcher, Duration::from_secs(900));
        assert_eq!(cache.ttl(), Duration::from_secs(900));
    }
}
