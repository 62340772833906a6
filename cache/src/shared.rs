use crate::error::{BoxError, CacheError, Result};
use crate::listener::{RemovalCause, RemovalListener};
use crate::loader::{LoadCoordinator, LoadGuard, WeighFn, WriteThroughFn};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::store::{Removal, Store};

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// The internal, thread-safe core of the cache, shared by every handle.
pub(crate) struct CacheShared<K, V, H> {
  pub(crate) store: Store<K, V, H>,
  pub(crate) loads: LoadCoordinator<K, V>,
  pub(crate) metrics: Metrics,
  pub(crate) weigher: Option<WeighFn<K, V>>,
  pub(crate) write_through: Option<WriteThroughFn<K, V>>,
  pub(crate) listener: Option<Arc<dyn RemovalListener<K, V>>>,
}

impl<K, V, H> fmt::Debug for CacheShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("store", &self.store)
      .field("has_weigher", &self.weigher.is_some())
      .field("has_write_through", &self.write_through.is_some())
      .field("has_listener", &self.listener.is_some())
      .finish_non_exhaustive()
  }
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  /// Returns a live value and promotes it to most recently used.
  pub(crate) fn get_fresh(&self, key: &K) -> Option<Arc<V>> {
    let value = self.store.lookup(key)?;
    self.store.touch(key);
    Metrics::record(&self.metrics.hits);
    tracing::trace!("cache hit");
    Some(value)
  }

  /// A caller joined another caller's in-flight load.
  pub(crate) fn record_joined(&self) {
    Metrics::record(&self.metrics.hits);
    tracing::trace!("joined in-flight load");
  }

  /// A leader is about to invoke the loader for a missing or expired key.
  pub(crate) fn record_load_start(&self) {
    Metrics::record(&self.metrics.misses);
    Metrics::record(&self.metrics.loads);
    tracing::debug!("loading value for missing key");
  }

  /// A present key is about to be reloaded by `refresh`.
  pub(crate) fn record_refresh_start(&self) {
    Metrics::record(&self.metrics.refreshes);
    Metrics::record(&self.metrics.loads);
    tracing::debug!("refreshing present key");
  }

  /// Stores the outcome of a leader's loader call, then releases every
  /// waiter with the same result.
  ///
  /// The write-through hook runs last, for the leader only; its failure is
  /// returned to the leader while the cached value stays in place.
  pub(crate) fn publish(
    &self,
    key: &K,
    guard: LoadGuard<'_, K, V>,
    loaded: std::result::Result<V, BoxError>,
  ) -> Result<Arc<V>> {
    match loaded {
      Ok(value) => {
        let value = Arc::new(value);
        let weight = self.weigh(key, &value);
        let removed = self.store.insert(key.clone(), value.clone(), weight);
        tracing::debug!(weight, evicted = removed.len(), "cached loaded value");
        guard.complete(Ok(value.clone()));

        self.notify(removed);
        self.write_through(key, &value)?;
        Ok(value)
      }
      Err(err) => {
        let err = self.load_failed(err);
        guard.complete(Err(err.clone()));
        Err(err)
      }
    }
  }

  /// Stores the outcome of a `refresh` reload in place.
  ///
  /// If the key was invalidated while reloading, the fresh value is inserted
  /// as a new entry instead.
  pub(crate) fn publish_refresh(
    &self,
    key: &K,
    loaded: std::result::Result<V, BoxError>,
  ) -> Result<Arc<V>> {
    let value = Arc::new(loaded.map_err(|err| self.load_failed(err))?);
    let weight = self.weigh(key, &value);
    let removed = match self.store.replace(key, value.clone(), weight) {
      Some(removed) => removed,
      None => self.store.insert(key.clone(), value.clone(), weight),
    };
    tracing::debug!(weight, evicted = removed.len().saturating_sub(1), "refreshed value");

    self.notify(removed);
    self.write_through(key, &value)?;
    Ok(value)
  }

  pub(crate) fn invalidate(&self, key: &K) -> bool {
    match self.store.remove(key, RemovalCause::Invalidated) {
      Some(removal) => {
        self.notify(vec![removal]);
        true
      }
      None => false,
    }
  }

  pub(crate) fn invalidate_all(&self) {
    let removed = self.store.clear(RemovalCause::Invalidated);
    tracing::debug!(removed = removed.len(), "invalidated all entries");
    self.notify(removed);
  }

  pub(crate) fn metrics(&self) -> MetricsSnapshot {
    self
      .metrics
      .snapshot(self.store.len() as u64, self.store.weight())
  }

  fn weigh(&self, key: &K, value: &V) -> u64 {
    self.weigher.as_ref().map_or(0, |weigher| weigher(key, value))
  }

  fn load_failed(&self, err: BoxError) -> CacheError {
    Metrics::record(&self.metrics.load_failures);
    tracing::warn!(error = %err, "loading function failed");
    CacheError::load(err)
  }

  fn write_through(&self, key: &K, value: &V) -> Result<()> {
    let Some(write_through) = &self.write_through else {
      return Ok(());
    };
    write_through(key, value).map_err(|err| {
      Metrics::record(&self.metrics.write_through_failures);
      tracing::warn!(error = %err, "write-through function failed");
      CacheError::write_through(err)
    })
  }

  /// Records removals and hands them to the listener. Must be called without
  /// the store lock held.
  fn notify(&self, removed: Vec<Removal<K, V>>) {
    for removal in removed {
      self.metrics.record_removal(removal.cause);
      if matches!(removal.cause, RemovalCause::Size | RemovalCause::Weight) {
        tracing::debug!(cause = %removal.cause, weight = removal.weight, "evicted entry");
      }
      if let Some(listener) = &self.listener {
        listener.on_removal(removal.key, removal.value, removal.cause);
      }
    }
  }
}
