use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

use crate::listener::RemovalCause;

/// A thread-safe, internal metrics collector for the cache.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Loading ---
  pub(crate) loads: CachePadded<AtomicU64>,
  pub(crate) load_failures: CachePadded<AtomicU64>,
  pub(crate) refreshes: CachePadded<AtomicU64>,
  pub(crate) write_through_failures: CachePadded<AtomicU64>,

  // --- Removal Stats ---
  pub(crate) invalidations: CachePadded<AtomicU64>,
  pub(crate) evicted_by_size: CachePadded<AtomicU64>,
  pub(crate) evicted_by_weight: CachePadded<AtomicU64>,
  pub(crate) expired_replaced: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      loads: CachePadded::new(AtomicU64::new(0)),
      load_failures: CachePadded::new(AtomicU64::new(0)),
      refreshes: CachePadded::new(AtomicU64::new(0)),
      write_through_failures: CachePadded::new(AtomicU64::new(0)),
      invalidations: CachePadded::new(AtomicU64::new(0)),
      evicted_by_size: CachePadded::new(AtomicU64::new(0)),
      evicted_by_weight: CachePadded::new(AtomicU64::new(0)),
      expired_replaced: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn record(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Counts a removal under the counter matching its cause.
  pub(crate) fn record_removal(&self, cause: RemovalCause) {
    let counter = match cause {
      RemovalCause::Size => &self.evicted_by_size,
      RemovalCause::Weight => &self.evicted_by_weight,
      RemovalCause::Expired => &self.expired_replaced,
      RemovalCause::Invalidated => &self.invalidations,
      RemovalCause::Replaced => return,
    };
    Self::record(counter);
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self, entry_count: u64, current_weight: u64) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      loads: self.loads.load(Ordering::Relaxed),
      load_failures: self.load_failures.load(Ordering::Relaxed),
      refreshes: self.refreshes.load(Ordering::Relaxed),
      write_through_failures: self.write_through_failures.load(Ordering::Relaxed),
      invalidations: self.invalidations.load(Ordering::Relaxed),
      evicted_by_size: self.evicted_by_size.load(Ordering::Relaxed),
      evicted_by_weight: self.evicted_by_weight.load(Ordering::Relaxed),
      expired_replaced: self.expired_replaced.load(Ordering::Relaxed),
      entry_count,
      current_weight,
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Lookups answered without invoking the loader (including callers that
  /// joined another caller's in-flight load).
  pub hits: u64,
  /// Lookups that had to invoke the loader.
  pub misses: u64,
  /// The cache hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// The number of loader invocations, including refreshes.
  pub loads: u64,
  /// The number of loader invocations that returned an error.
  pub load_failures: u64,
  /// The number of `refresh` calls that reloaded a present key.
  pub refreshes: u64,
  /// The number of write-through calls that returned an error.
  pub write_through_failures: u64,
  /// The number of entries removed by `invalidate` or `invalidate_all`.
  pub invalidations: u64,
  /// The number of entries evicted to honour `maximum_size`.
  pub evicted_by_size: u64,
  /// The number of entries evicted to honour `maximum_weight`.
  pub evicted_by_weight: u64,
  /// The number of expired entries replaced by a reload.
  pub expired_replaced: u64,
  /// The number of entries currently stored, expired ones included.
  pub entry_count: u64,
  /// The current total weight of all entries. Always 0 without a weigher.
  pub current_weight: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("loads", &self.loads)
      .field("load_failures", &self.load_failures)
      .field("refreshes", &self.refreshes)
      .field("write_through_failures", &self.write_through_failures)
      .field("invalidations", &self.invalidations)
      .field("evicted_by_size", &self.evicted_by_size)
      .field("evicted_by_weight", &self.evicted_by_weight)
      .field("expired_replaced", &self.expired_replaced)
      .field("entry_count", &self.entry_count)
      .field("current_weight", &self.current_weight)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
