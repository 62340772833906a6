use crate::error::{BoxError, BuildError};
use crate::handles::{AsyncLoadingCache, LoadingCache};
use crate::loader::{AsyncLoadFn, BoxFuture, LoadCoordinator, SyncLoadFn, WeighFn, WriteThroughFn};
use crate::metrics::Metrics;
use crate::shared::CacheShared;
use crate::store::{Limits, Store};
use crate::RemovalListener;

use core::fmt;
use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

/// A builder for creating `LoadingCache` and `AsyncLoadingCache` instances.
///
/// Every bound defaults to "unbounded" and entries never expire unless a
/// time-to-live is set. A loader is required.
pub struct CacheBuilder<K, V, H = ahash::RandomState> {
  maximum_size: u64,
  maximum_weight: u64,
  time_to_live: Option<Duration>,
  hasher: H,
  loader: Option<SyncLoadFn<K, V>>,
  async_loader: Option<AsyncLoadFn<K, V>>,
  weigher: Option<WeighFn<K, V>>,
  write_through: Option<WriteThroughFn<K, V>>,
  listener: Option<Arc<dyn RemovalListener<K, V>>>,
}

// Manual Debug implementation for CacheBuilder.
impl<K, V, H> fmt::Debug for CacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("maximum_size", &self.maximum_size)
      .field("maximum_weight", &self.maximum_weight)
      .field("time_to_live", &self.time_to_live)
      .field("has_loader", &self.loader.is_some())
      .field("has_async_loader", &self.async_loader.is_some())
      .field("has_weigher", &self.weigher.is_some())
      .field("has_write_through", &self.write_through.is_some())
      .field("has_listener", &self.listener.is_some())
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
impl<K, V, H> CacheBuilder<K, V, H> {
  /// Sets the maximum number of entries. `0` leaves the count unbounded.
  pub fn maximum_size(mut self, maximum_size: u64) -> Self {
    self.maximum_size = maximum_size;
    self
  }

  /// Sets the maximum total weight of all entries. `0` leaves the weight
  /// unbounded.
  ///
  /// Only takes effect when a [`weigher`](Self::weigher) is configured.
  pub fn maximum_weight(mut self, maximum_weight: u64) -> Self {
    self.maximum_weight = maximum_weight;
    self
  }

  /// Sets how long an entry stays fresh after it was loaded or refreshed.
  /// A zero duration means entries never expire.
  pub fn time_to_live(mut self, duration: Duration) -> Self {
    self.time_to_live = Some(duration);
    self
  }

  /// Same as [`time_to_live`](Self::time_to_live) with whole seconds.
  pub fn expiration_seconds(self, seconds: u64) -> Self {
    self.time_to_live(Duration::from_secs(seconds))
  }
}

// --- Function Configuration Methods ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Sets the synchronous loading function used by `LoadingCache`.
  ///
  /// It is called with no cache lock held and may block, e.g. on network I/O.
  /// It may read other keys from the cache. Asking for the key being loaded
  /// fails with `CacheError::RecursiveLoad`.
  pub fn loader<F, E>(mut self, f: F) -> Self
  where
    F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    E: Into<BoxError>,
  {
    self.loader = Some(Arc::new(move |key: &K| {
      f(key).map_err(Into::<BoxError>::into)
    }));
    self
  }

  /// Sets the asynchronous loading function used by `AsyncLoadingCache`.
  ///
  /// The returned future must not await the cache for the key being loaded;
  /// such a load never completes.
  pub fn async_loader<F, Fut, E>(mut self, f: F) -> Self
  where
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
  {
    let loader_fn = move |key: K| {
      let load = f(key);
      let boxed: BoxFuture<Result<V, BoxError>> =
        Box::pin(async move { load.await.map_err(Into::<BoxError>::into) });
      boxed
    };
    self.async_loader = Some(Arc::new(loader_fn));
    self
  }

  /// Sets the function assigning a weight to each loaded value. Without one,
  /// weights are not tracked and `maximum_weight` is ignored.
  pub fn weigher(mut self, f: impl Fn(&K, &V) -> u64 + Send + Sync + 'static) -> Self {
    self.weigher = Some(Arc::new(f));
    self
  }

  /// Sets a function invoked after every successful load or refresh has been
  /// cached, to propagate the value to an external system.
  ///
  /// Its failure is reported to the caller that performed the write. The
  /// cached value is kept.
  pub fn write_through<F, E>(mut self, f: F) -> Self
  where
    F: Fn(&K, &V) -> Result<(), E> + Send + Sync + 'static,
    E: Into<BoxError>,
  {
    self.write_through = Some(Arc::new(move |key: &K, value: &V| {
      f(key, value).map_err(Into::<BoxError>::into)
    }));
    self
  }

  /// Sets the listener told about every entry that leaves the cache.
  pub fn removal_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: RemovalListener<K, V> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }
}

// --- Constructors ---
impl<K, V> CacheBuilder<K, V> {
  /// Creates a new `CacheBuilder` with default settings.
  pub fn new() -> Self {
    Self::with_hasher(ahash::RandomState::new())
  }
}

impl<K, V, H> CacheBuilder<K, V, H> {
  /// Creates a new `CacheBuilder` that hashes keys with `hasher`.
  pub fn with_hasher(hasher: H) -> Self {
    Self {
      maximum_size: 0,
      maximum_weight: 0,
      time_to_live: None,
      hasher,
      loader: None,
      async_loader: None,
      weigher: None,
      write_through: None,
      listener: None,
    }
  }
}

impl<K, V> Default for CacheBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- Build Methods ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Send + Sync + 'static,
{
  /// Builds a synchronous `LoadingCache`.
  pub fn build(mut self) -> Result<LoadingCache<K, V, H>, BuildError> {
    let loader = self.loader.take().ok_or(BuildError::MissingLoader)?;
    let shared = self.build_shared_core();
    Ok(LoadingCache { shared, loader })
  }

  /// Builds an `AsyncLoadingCache`.
  pub fn build_async(mut self) -> Result<AsyncLoadingCache<K, V, H>, BuildError> {
    let loader = self
      .async_loader
      .take()
      .ok_or(BuildError::MissingAsyncLoader)?;
    let shared = self.build_shared_core();
    Ok(AsyncLoadingCache { shared, loader })
  }

  /// Central logic to construct the shared core of the cache.
  pub(crate) fn build_shared_core(self) -> Arc<CacheShared<K, V, H>> {
    let max_weight = if self.weigher.is_some() {
      self.maximum_weight
    } else {
      if self.maximum_weight > 0 {
        tracing::warn!(
          maximum_weight = self.maximum_weight,
          "maximum_weight has no effect without a weigher"
        );
      }
      0
    };

    let limits = Limits {
      max_size: self.maximum_size,
      max_weight,
      time_to_live: self.time_to_live,
    };
    tracing::debug!(
      max_size = limits.max_size,
      max_weight = limits.max_weight,
      time_to_live = ?limits.time_to_live,
      "building loading cache"
    );

    Arc::new(CacheShared {
      store: Store::new(limits, self.hasher),
      loads: LoadCoordinator::new(),
      metrics: Metrics::new(),
      weigher: self.weigher,
      write_through: self.write_through,
      listener: self.listener,
    })
  }
}
