use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

// The single, static reference point for all time calculations in the cache.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Returns the current time as nanoseconds since the cache's epoch.
#[inline]
pub(crate) fn now_nanos() -> u64 {
  Instant::now()
    .saturating_duration_since(*CACHE_EPOCH)
    .as_nanos() as u64
}

/// Computes the expiration deadline for an entry written at `now`.
///
/// Returns `0` when entries never expire.
#[inline]
pub(crate) fn deadline_from(now: u64, time_to_live: Option<Duration>) -> u64 {
  match time_to_live {
    Some(ttl) if !ttl.is_zero() => {
      let ttl_nanos = u64::try_from(ttl.as_nanos()).unwrap_or(u64::MAX);
      now.saturating_add(ttl_nanos)
    }
    _ => 0,
  }
}
