use crate::error::{CacheError, Result};
use crate::loader::{Flight, SyncLoadFn};
use crate::shared::CacheShared;
use crate::MetricsSnapshot;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::thread;

/// A thread-safe, synchronous loading cache.
///
/// Handles are cheap to clone; every clone operates on the same cache.
pub struct LoadingCache<K, V, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
  pub(crate) loader: SyncLoadFn<K, V>,
}

impl<K, V, H> Clone for LoadingCache<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
      loader: self.loader.clone(),
    }
  }
}

impl<K, V, H> fmt::Debug for LoadingCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LoadingCache")
      .field("shared", &self.shared)
      .finish_non_exhaustive()
  }
}

impl<K, V, H> LoadingCache<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// Returns the value for `key`, loading it if it is missing or expired.
  ///
  /// Concurrent calls for the same missing key share a single loader
  /// invocation: one caller runs the loader on its own thread while the others
  /// park until it publishes, and all of them receive the same value or the
  /// same error. A failed load caches nothing.
  ///
  /// If a write-through function is configured and fails, the loaded value is
  /// still cached and `CacheError::WriteThrough` is returned to the caller that
  /// ran the loader.
  ///
  /// A loader that calls `get` for the key it is loading, on its own thread,
  /// receives `CacheError::RecursiveLoad` instead of waiting on itself.
  pub fn get(&self, key: &K) -> Result<Arc<V>> {
    if let Some(value) = self.shared.get_fresh(key) {
      return Ok(value);
    }

    let current = thread::current().id();
    match self.shared.loads.begin(key, Some(current)) {
      Flight::Waiter(pending) => {
        if pending.is_led_by(current) {
          tracing::warn!("loader requested the key it is loading");
          return Err(CacheError::RecursiveLoad);
        }
        self.shared.record_joined();
        pending.wait()
      }
      Flight::Leader(guard) => {
        // Another leader may have stored the value between our miss and
        // registering this load.
        if let Some(value) = self.shared.get_fresh(key) {
          guard.complete(Ok(value.clone()));
          return Ok(value);
        }

        self.shared.record_load_start();
        let loaded = (self.loader)(key);
        self.shared.publish(key, guard, loaded)
      }
    }
  }

  /// Reloads the value for a present key, even if it is still fresh, and
  /// overwrites it in place with a renewed expiration. An expired entry
  /// counts as present.
  ///
  /// For an absent key this behaves exactly like [`get`](Self::get).
  pub fn refresh(&self, key: &K) -> Result<Arc<V>> {
    if !self.shared.store.contains(key) {
      return self.get(key);
    }

    self.shared.record_refresh_start();
    let loaded = (self.loader)(key);
    self.shared.publish_refresh(key, loaded)
  }

  /// Removes an entry from the cache, returning `true` if the key was found.
  ///
  /// A load already in flight for the key is not affected and may store its
  /// value when it completes.
  pub fn invalidate(&self, key: &K) -> bool {
    self.shared.invalidate(key)
  }

  /// Removes all entries from the cache.
  pub fn invalidate_all(&self) {
    self.shared.invalidate_all()
  }

  /// Returns `true` if the key has an entry, whether or not it has expired.
  pub fn is_loaded(&self, key: &K) -> bool {
    self.shared.store.contains(key)
  }

  /// Returns a live value without loading it or updating its recency.
  pub fn peek(&self, key: &K) -> Option<Arc<V>> {
    self.shared.store.lookup(key)
  }

  /// The number of entries, expired ones included.
  pub fn len(&self) -> usize {
    self.shared.store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The total weight of all entries. Always 0 without a weigher.
  pub fn weight(&self) -> u64 {
    self.shared.store.weight()
  }

  /// The number of keys currently being loaded.
  pub fn loads_in_flight(&self) -> usize {
    self.shared.loads.in_flight()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics()
  }
}
