use generational_arena::Index;
use std::sync::Arc;

/// A single cached record, owned exclusively by the store.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
  /// The user's value, wrapped in an Arc so it can be handed out without `V: Clone`.
  value: Arc<V>,
  /// The weight contributed to the store total. Always 0 without a weigher.
  weight: u64,
  /// The expiration deadline in nanoseconds since the cache epoch. 0 means never.
  expires_at: u64,
  /// The node of this key in the recency list.
  recency: Index,
}

impl<V> CacheEntry<V> {
  pub(crate) fn new(value: Arc<V>, weight: u64, expires_at: u64, recency: Index) -> Self {
    Self {
      value,
      weight,
      expires_at,
      recency,
    }
  }

  /// Returns a clone of the `Arc` containing the value.
  #[inline]
  pub(crate) fn value(&self) -> Arc<V> {
    self.value.clone()
  }

  #[inline]
  pub(crate) fn weight(&self) -> u64 {
    self.weight
  }

  #[inline]
  pub(crate) fn recency(&self) -> Index {
    self.recency
  }

  #[inline]
  pub(crate) fn is_expired_at(&self, now_nanos: u64) -> bool {
    self.expires_at > 0 && now_nanos >= self.expires_at
  }

  /// Overwrites the value in place, returning the previous value and weight.
  /// The recency marker is left untouched.
  pub(crate) fn renew(&mut self, value: Arc<V>, weight: u64, expires_at: u64) -> (Arc<V>, u64) {
    let old_value = std::mem::replace(&mut self.value, value);
    let old_weight = std::mem::replace(&mut self.weight, weight);
    self.expires_at = expires_at;
    (old_value, old_weight)
  }
}
