use std::fmt;
use std::sync::Arc;

/// Describes the reason an entry was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
  /// Evicted to keep the entry count within `maximum_size`.
  Size,
  /// Evicted to keep the total weight within `maximum_weight`.
  Weight,
  /// An expired entry was replaced by a freshly loaded value.
  Expired,
  /// Removed by `invalidate` or `invalidate_all`.
  Invalidated,
  /// A live value was overwritten, e.g. by `refresh`.
  Replaced,
}

impl RemovalCause {
  /// Returns `true` if the cache removed the entry on its own accord.
  pub fn was_evicted(&self) -> bool {
    matches!(
      self,
      RemovalCause::Size | RemovalCause::Weight | RemovalCause::Expired
    )
  }
}

impl fmt::Display for RemovalCause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RemovalCause::Size => write!(f, "evicted due to maximum size"),
      RemovalCause::Weight => write!(f, "evicted due to maximum weight"),
      RemovalCause::Expired => write!(f, "expired (TTL)"),
      RemovalCause::Invalidated => write!(f, "manually invalidated"),
      RemovalCause::Replaced => write!(f, "replaced by a new value"),
    }
  }
}

/// A listener that can be registered with the cache to be told when entries
/// leave it.
///
/// `on_removal` runs synchronously on the thread that caused the removal,
/// after the store lock has been released, so it may call back into the cache.
pub trait RemovalListener<K, V>: Send + Sync {
  fn on_removal(&self, key: K, value: Arc<V>, cause: RemovalCause);
}

impl<K, V, F> RemovalListener<K, V> for F
where
  F: Fn(K, Arc<V>, RemovalCause) + Send + Sync,
{
  fn on_removal(&self, key: K, value: Arc<V>, cause: RemovalCause) {
    self(key, value, cause)
  }
}
