use crate::entry::CacheEntry;
use crate::listener::RemovalCause;
use crate::policy::lru_list::LruList;
use crate::time;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

/// The bounds the store enforces on every write.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
  /// Maximum number of entries. 0 means unbounded.
  pub(crate) max_size: u64,
  /// Maximum total weight. 0 means unbounded.
  pub(crate) max_weight: u64,
  pub(crate) time_to_live: Option<Duration>,
}

impl Limits {
  #[inline]
  pub(crate) fn is_bounded(&self) -> bool {
    self.max_size > 0 || self.max_weight > 0
  }
}

/// An entry that left the store, handed back so callers can update metrics
/// and notify listeners once the lock is released.
#[derive(Debug)]
pub(crate) struct Removal<K, V> {
  pub(crate) key: K,
  pub(crate) value: Arc<V>,
  pub(crate) weight: u64,
  pub(crate) cause: RemovalCause,
}

struct StoreInner<K, V, H> {
  entries: HashMap<K, CacheEntry<V>, H>,
  order: LruList<K>,
  total_weight: u64,
}

impl<K, V, H> StoreInner<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher,
{
  /// Removes a key from the map and the recency list and reverses its weight.
  fn detach(&mut self, key: &K) -> Option<CacheEntry<V>> {
    let entry = self.entries.remove(key)?;
    self.order.remove(entry.recency());
    self.total_weight = self.total_weight.saturating_sub(entry.weight());
    Some(entry)
  }

  fn evict_lru(&mut self) -> Option<(K, CacheEntry<V>)> {
    let key = self.order.pop_back()?;
    let entry = self.entries.remove(&key)?;
    self.total_weight = self.total_weight.saturating_sub(entry.weight());
    Some((key, entry))
  }
}

/// The authoritative key to entry mapping with bounded capacity.
///
/// A single reader/writer lock covers the map, the recency list and the
/// running weight total, so the three can never disagree.
pub(crate) struct Store<K, V, H> {
  inner: RwLock<StoreInner<K, V, H>>,
  limits: Limits,
}

impl<K, V, H> fmt::Debug for Store<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let inner = self.inner.read();
    f.debug_struct("Store")
      .field("limits", &self.limits)
      .field("len", &inner.entries.len())
      .field("total_weight", &inner.total_weight)
      .finish()
  }
}

impl<K, V, H> Store<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  pub(crate) fn new(limits: Limits, hasher: H) -> Self {
    Self {
      inner: RwLock::new(StoreInner {
        entries: HashMap::with_hasher(hasher),
        order: LruList::new(),
        total_weight: 0,
      }),
      limits,
    }
  }

  /// Returns the value of a live entry. Recency is left untouched.
  pub(crate) fn lookup(&self, key: &K) -> Option<Arc<V>> {
    let now = time::now_nanos();
    let guard = self.inner.read();
    guard
      .entries
      .get(key)
      .filter(|entry| !entry.is_expired_at(now))
      .map(CacheEntry::value)
  }

  /// Marks a key as the most recently used. No-op when absent.
  pub(crate) fn touch(&self, key: &K) {
    // Recency only matters when something can be evicted.
    if !self.limits.is_bounded() {
      return;
    }
    let mut guard = self.inner.write();
    let inner = &mut *guard;
    if let Some(entry) = inner.entries.get(key) {
      inner.order.move_to_front(entry.recency());
    }
  }

  /// Returns `true` if the key has an entry, expired or not.
  pub(crate) fn contains(&self, key: &K) -> bool {
    self.inner.read().entries.contains_key(key)
  }

  pub(crate) fn len(&self) -> usize {
    self.inner.read().entries.len()
  }

  pub(crate) fn weight(&self) -> u64 {
    self.inner.read().total_weight
  }

  /// Returns the cause to evict for if adding `entries` entries of
  /// `weight` total would break a bound.
  fn over_bound(&self, inner: &StoreInner<K, V, H>, entries: u64, weight: u64) -> Option<RemovalCause> {
    if self.limits.max_size > 0 && inner.entries.len() as u64 + entries > self.limits.max_size {
      return Some(RemovalCause::Size);
    }
    if self.limits.max_weight > 0
      && inner.total_weight.saturating_add(weight) > self.limits.max_weight
    {
      return Some(RemovalCause::Weight);
    }
    None
  }

  /// Inserts or overwrites an entry, evicting least recently used entries
  /// first until the new one fits within both bounds.
  ///
  /// An entry that alone exceeds `max_weight` empties the store and is then
  /// kept on its own.
  pub(crate) fn insert(&self, key: K, value: Arc<V>, weight: u64) -> Vec<Removal<K, V>> {
    let now = time::now_nanos();
    let expires_at = time::deadline_from(now, self.limits.time_to_live);
    let mut removed = Vec::new();

    let mut guard = self.inner.write();
    let inner = &mut *guard;

    if let Some(old) = inner.detach(&key) {
      let cause = if old.is_expired_at(now) {
        RemovalCause::Expired
      } else {
        RemovalCause::Replaced
      };
      removed.push(Removal {
        key: key.clone(),
        value: old.value(),
        weight: old.weight(),
        cause,
      });
    }

    while let Some(cause) = self.over_bound(inner, 1, weight) {
      match inner.evict_lru() {
        Some((victim, entry)) => removed.push(Removal {
          key: victim,
          value: entry.value(),
          weight: entry.weight(),
          cause,
        }),
        None => break,
      }
    }

    let recency = inner.order.push_front(key.clone());
    inner.total_weight = inner.total_weight.saturating_add(weight);
    inner
      .entries
      .insert(key, CacheEntry::new(value, weight, expires_at, recency));

    removed
  }

  /// Overwrites a present entry in place, renewing its deadline and promoting
  /// it. The entry count is unchanged; the weight total moves by the
  /// difference between the new and old weight, and other entries are
  /// evicted if that difference breaks `max_weight`.
  ///
  /// Returns `None` if the key is no longer present.
  pub(crate) fn replace(&self, key: &K, value: Arc<V>, weight: u64) -> Option<Vec<Removal<K, V>>> {
    let now = time::now_nanos();
    let expires_at = time::deadline_from(now, self.limits.time_to_live);

    let mut guard = self.inner.write();
    let inner = &mut *guard;

    let entry = inner.entries.get_mut(key)?;
    let recency = entry.recency();
    let (old_value, old_weight) = entry.renew(value, weight, expires_at);
    inner.total_weight = inner
      .total_weight
      .saturating_sub(old_weight)
      .saturating_add(weight);
    inner.order.move_to_front(recency);

    let mut removed = vec![Removal {
      key: key.clone(),
      value: old_value,
      weight: old_weight,
      cause: RemovalCause::Replaced,
    }];

    // The refreshed key sits at the head, so it is never the victim while
    // another entry remains.
    while inner.entries.len() > 1 {
      let Some(cause) = self.over_bound(inner, 0, 0) else {
        break;
      };
      match inner.evict_lru() {
        Some((victim, entry)) => removed.push(Removal {
          key: victim,
          value: entry.value(),
          weight: entry.weight(),
          cause,
        }),
        None => break,
      }
    }

    Some(removed)
  }

  pub(crate) fn remove(&self, key: &K, cause: RemovalCause) -> Option<Removal<K, V>> {
    let mut guard = self.inner.write();
    let entry = guard.detach(key)?;
    Some(Removal {
      key: key.clone(),
      value: entry.value(),
      weight: entry.weight(),
      cause,
    })
  }

  /// Removes every entry.
  pub(crate) fn clear(&self, cause: RemovalCause) -> Vec<Removal<K, V>> {
    let mut guard = self.inner.write();
    let inner = &mut *guard;
    inner.order.clear();
    inner.total_weight = 0;
    inner
      .entries
      .drain()
      .map(|(key, entry)| Removal {
        key,
        value: entry.value(),
        weight: entry.weight(),
        cause,
      })
      .collect()
  }

  #[cfg(test)]
  fn check_invariants(&self) {
    let inner = self.inner.read();
    assert_eq!(inner.entries.len(), inner.order.len());
    let weight: u64 = inner.entries.values().map(CacheEntry::weight).sum();
    assert_eq!(weight, inner.total_weight);
    for (key, entry) in inner.entries.iter() {
      assert!(inner.order.nodes[entry.recency()].key == *key);
    }
  }

  #[cfg(test)]
  fn keys_by_recency(&self) -> Vec<K> {
    self.inner.read().order.keys_as_vec()
  }
}
