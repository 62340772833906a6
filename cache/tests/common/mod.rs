#![allow(dead_code)]

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;

use fibre_loading_cache::{CacheBuilder, LoadingCache};
use thiserror::Error;

/// The error returned by the test loaders.
#[derive(Debug, Error)]
pub enum LoadError {
  #[error("backend unavailable for key {0}")]
  Unavailable(i32),
  #[error("write rejected for key {0}")]
  Rejected(i32),
}

/// Counts how many times a loader has been invoked.
#[derive(Clone, Default)]
pub struct LoadCounter(Arc<AtomicUsize>);

impl LoadCounter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records one call and returns the 1-based number of this call.
  pub fn hit(&self) -> usize {
    self.0.fetch_add(1, Ordering::SeqCst) + 1
  }

  pub fn count(&self) -> usize {
    self.0.load(Ordering::SeqCst)
  }
}

/// A loader producing `"value-{key}"` that counts its calls.
pub fn counting_loader(
  counter: &LoadCounter,
) -> impl Fn(&i32) -> Result<String, LoadError> + Send + Sync + 'static {
  let counter = counter.clone();
  move |key: &i32| {
    counter.hit();
    Ok(format!("value-{key}"))
  }
}

/// A cache bounded to `max_size` entries with a counting loader.
pub fn build_counting_cache(max_size: u64) -> (LoadingCache<i32, String>, LoadCounter) {
  let counter = LoadCounter::new();
  let cache = CacheBuilder::new()
    .maximum_size(max_size)
    .loader(counting_loader(&counter))
    .build()
    .unwrap();
  (cache, counter)
}

/// Blocks until some caller has started loading, so the next caller is
/// guaranteed to join the in-flight load.
pub fn wait_for_load_in_flight<K, V>(cache: &LoadingCache<K, V>)
where
  K: Eq + std::hash::Hash + Clone,
{
  for _ in 0..500 {
    if cache.loads_in_flight() > 0 {
      return;
    }
    std::thread::sleep(Duration::from_millis(2));
  }
  panic!("no load started in time");
}
