use crate::error::Result;
use crate::loader::{AsyncLoadFn, Flight};
use crate::shared::CacheShared;
use crate::MetricsSnapshot;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// A thread-safe loading cache whose loader is asynchronous.
///
/// Waiting for another task's in-flight load suspends the task instead of
/// blocking the thread. Store operations themselves never await.
pub struct AsyncLoadingCache<K, V, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
  pub(crate) loader: AsyncLoadFn<K, V>,
}

impl<K, V, H> Clone for AsyncLoadingCache<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
      loader: self.loader.clone(),
    }
  }
}

impl<K, V, H> fmt::Debug for AsyncLoadingCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AsyncLoadingCache")
      .field("shared", &self.shared)
      .finish_non_exhaustive()
  }
}

impl<K, V, H> AsyncLoadingCache<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// Returns the value for `key`, loading it if it is missing or expired.
  ///
  /// The first task to miss runs the loader inline; concurrent tasks asking
  /// for the same key await its result. If the loading task is dropped before
  /// the loader finishes, the waiters receive `CacheError::LoadAbandoned`.
  ///
  /// The loader must not await `get` for the key it is loading: that future
  /// would wait on its own result and never complete.
  pub async fn get(&self, key: &K) -> Result<Arc<V>> {
    if let Some(value) = self.shared.get_fresh(key) {
      return Ok(value);
    }

    match self.shared.loads.begin(key, None) {
      Flight::Waiter(pending) => {
        self.shared.record_joined();
        (&*pending).await
      }
      Flight::Leader(guard) => {
        if let Some(value) = self.shared.get_fresh(key) {
          guard.complete(Ok(value.clone()));
          return Ok(value);
        }

        self.shared.record_load_start();
        let loaded = (self.loader)(key.clone()).await;
        self.shared.publish(key, guard, loaded)
      }
    }
  }

  /// Reloads the value for a present key and overwrites it in place.
  /// For an absent key this behaves exactly like [`get`](Self::get).
  pub async fn refresh(&self, key: &K) -> Result<Arc<V>> {
    if !self.shared.store.contains(key) {
      return self.get(key).await;
    }

    self.shared.record_refresh_start();
    let loaded = (self.loader)(key.clone()).await;
    self.shared.publish_refresh(key, loaded)
  }

  /// Removes an entry from the cache, returning `true` if the key was found.
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

  pub fn peek(&self, key: &K) -> Option<Arc<V>> {
    self.shared.store.lookup(key)
  }

  pub fn len(&self) -> usize {
    self.shared.store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn weight(&self) -> u64 {
    self.shared.store.weight()
  }

  pub fn loads_in_flight(&self) -> usize {
    self.shared.loads.in_flight()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics()
  }
}
