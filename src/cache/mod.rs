//! In-memory cache for the upstream payload
//!
//! A single entry with a time-to-live. Stale entries are refreshed by the
//! first caller to notice; if that refresh fails the stale payload keeps
//! being served until the next TTL window.

mod clock;
mod controller;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{CacheState, CacheStatus, TtlCache};
