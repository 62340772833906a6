mod common;

use common::{build_counting_cache, counting_loader, LoadCounter, LoadError};
use fibre_loading_cache::{BuildError, CacheBuilder, LoadingCache, RemovalCause};
use std::sync::{Arc, Mutex};

// Loads "{key}-v{n}" where n is the overall number of loader calls so far.
fn build_versioned_cache(loads: &LoadCounter) -> LoadingCache<i32, String> {
  let loads = loads.clone();
  CacheBuilder::new()
    .loader(move |key: &i32| Ok::<_, LoadError>(format!("{key}-v{}", loads.hit())))
    .build()
    .unwrap()
}

#[test]
fn test_sync_invalidate() {
  let (cache, loads) = build_counting_cache(0);

  cache.get(&1).unwrap();
  assert!(cache.invalidate(&1), "Invalidating a present key reports true");
  assert!(!cache.is_loaded(&1));
  assert!(!cache.invalidate(&1), "Invalidating again reports false");

  // The next get loads again.
  cache.get(&1).unwrap();
  assert_eq!(loads.count(), 2);
  assert_eq!(cache.metrics().invalidations, 1);
}

#[test]
fn test_sync_is_loaded_never_loads() {
  let (cache, loads) = build_counting_cache(0);

  assert!(!cache.is_loaded(&9));
  assert!(cache.peek(&9).is_none());
  assert_eq!(loads.count(), 0);
  assert!(cache.is_empty());
}

#[test]
fn test_sync_refresh_absent_key_behaves_like_get() {
  let loads = LoadCounter::new();
  let cache = build_versioned_cache(&loads);

  assert_eq!(*cache.refresh(&1).unwrap(), "1-v1");
  assert!(cache.is_loaded(&1));
  let metrics = cache.metrics();
  assert_eq!(metrics.misses, 1);
  assert_eq!(metrics.refreshes, 0);
}

#[test]
fn test_sync_refresh_reloads_present_key() {
  let loads = LoadCounter::new();
  let cache = build_versioned_cache(&loads);

  assert_eq!(*cache.get(&1).unwrap(), "1-v1");
  assert_eq!(*cache.refresh(&1).unwrap(), "1-v2");
  assert_eq!(*cache.get(&1).unwrap(), "1-v2", "The refreshed value is served");
  assert_eq!(loads.count(), 2);
  assert_eq!(cache.len(), 1);
  assert_eq!(cache.metrics().refreshes, 1);
}

#[test]
fn test_sync_failed_refresh_keeps_old_value() {
  let loads = LoadCounter::new();
  let cache = CacheBuilder::new()
    .loader({
      let loads = loads.clone();
      move |key: &i32| match loads.hit() {
        1 => Ok(format!("{key}-v1")),
        _ => Err(LoadError::Unavailable(*key)),
      }
    })
    .build()
    .unwrap();

  cache.get(&1).unwrap();
  let err = cache.refresh(&1).unwrap_err();
  assert!(err.is_load());
  assert_eq!(cache.peek(&1).as_deref().map(String::as_str), Some("1-v1"));
  assert_eq!(cache.metrics().load_failures, 1);
}

#[test]
fn test_sync_invalidate_all_and_weight_tracking() {
  let cache = CacheBuilder::new()
    .weigher(|_key: &i32, value: &String| value.len() as u64)
    .loader(|key: &i32| Ok::<_, LoadError>("x".repeat(*key as usize)))
    .build()
    .unwrap();

  cache.get(&2).unwrap();
  cache.get(&3).unwrap();
  cache.get(&5).unwrap();
  assert_eq!(cache.weight(), 10);

  cache.invalidate(&3);
  assert_eq!(cache.weight(), 7, "Invalidation gives the weight back");

  cache.invalidate_all();
  assert!(cache.is_empty());
  assert_eq!(cache.weight(), 0);
  assert_eq!(cache.metrics().invalidations, 3);
}

#[test]
fn test_sync_maximum_weight_without_weigher_is_ignored() {
  let cache = CacheBuilder::new()
    .maximum_weight(1)
    .loader(counting_loader(&LoadCounter::new()))
    .build()
    .unwrap();

  for key in 0..10 {
    cache.get(&key).unwrap();
  }
  assert_eq!(cache.len(), 10);
  assert_eq!(cache.weight(), 0);
}

#[test]
fn test_sync_write_through_sees_every_load_and_refresh() {
  let written = Arc::new(Mutex::new(Vec::new()));
  let cache = CacheBuilder::new()
    .loader(counting_loader(&LoadCounter::new()))
    .write_through({
      let written = written.clone();
      move |key: &i32, value: &String| {
        written.lock().unwrap().push((*key, value.clone()));
        Ok::<_, LoadError>(())
      }
    })
    .build()
    .unwrap();

  cache.get(&1).unwrap();
  cache.get(&1).unwrap(); // hit, nothing to write
  cache.refresh(&1).unwrap();

  assert_eq!(
    *written.lock().unwrap(),
    vec![(1, "value-1".to_string()), (1, "value-1".to_string())]
  );
}

#[test]
fn test_sync_write_through_failure_keeps_cached_value() {
  let loads = LoadCounter::new();
  let cache = CacheBuilder::new()
    .loader(counting_loader(&loads))
    .write_through(|key: &i32, _value: &String| Err(LoadError::Rejected(*key)))
    .build()
    .unwrap();

  let err = cache.get(&4).unwrap_err();
  assert!(err.is_write_through());
  assert_eq!(
    err.shared_source().map(|e| e.to_string()),
    Some("write rejected for key 4".to_string())
  );

  // The value was cached before the hook ran.
  assert!(cache.is_loaded(&4));
  assert_eq!(*cache.get(&4).unwrap(), "value-4");
  assert_eq!(loads.count(), 1);
  assert_eq!(cache.metrics().write_through_failures, 1);
}

#[test]
fn test_sync_removal_listener_reports_causes() {
  let events = Arc::new(Mutex::new(Vec::new()));
  let cache = CacheBuilder::new()
    .maximum_size(1)
    .loader(counting_loader(&LoadCounter::new()))
    .removal_listener({
      let events = events.clone();
      move |key: i32, value: Arc<String>, cause: RemovalCause| {
        events.lock().unwrap().push((key, value.to_string(), cause));
      }
    })
    .build()
    .unwrap();

  cache.get(&1).unwrap();
  cache.get(&2).unwrap(); // evicts 1
  cache.refresh(&2).unwrap(); // replaces 2
  cache.invalidate(&2);

  let events = events.lock().unwrap();
  assert_eq!(
    *events,
    vec![
      (1, "value-1".to_string(), RemovalCause::Size),
      (2, "value-2".to_string(), RemovalCause::Replaced),
      (2, "value-2".to_string(), RemovalCause::Invalidated),
    ]
  );
  assert!(events[0].2.was_evicted());
  assert!(!events[2].2.was_evicted());
}

#[test]
fn test_sync_listener_may_call_back_into_cache() {
  let seen_len = Arc::new(Mutex::new(None));
  let cache_slot: Arc<Mutex<Option<LoadingCache<i32, String>>>> = Arc::new(Mutex::new(None));

  let cache = CacheBuilder::new()
    .maximum_size(1)
    .loader(counting_loader(&LoadCounter::new()))
    .removal_listener({
      let seen_len = seen_len.clone();
      let cache_slot = cache_slot.clone();
      move |_key: i32, _value: Arc<String>, _cause: RemovalCause| {
        if let Some(cache) = cache_slot.lock().unwrap().as_ref() {
          *seen_len.lock().unwrap() = Some(cache.len());
        }
      }
    })
    .build()
    .unwrap();
  *cache_slot.lock().unwrap() = Some(cache.clone());

  cache.get(&1).unwrap();
  cache.get(&2).unwrap();
  assert_eq!(*seen_len.lock().unwrap(), Some(1));

  // Break the reference cycle.
  cache_slot.lock().unwrap().take();
}

#[test]
fn test_sync_build_requires_loader() {
  let err = CacheBuilder::<i32, String>::new().build().unwrap_err();
  assert_eq!(err, BuildError::MissingLoader);

  let err = CacheBuilder::<i32, String>::new()
    .loader(|key: &i32| Ok::<_, LoadError>(key.to_string()))
    .build_async()
    .unwrap_err();
  assert_eq!(err, BuildError::MissingAsyncLoader);
}

#[test]
fn test_sync_caches_are_isolated() {
  let first = CacheBuilder::new()
    .loader(|key: &i32| Ok::<_, LoadError>(format!("first-{key}")))
    .build()
    .unwrap();
  let second = CacheBuilder::new()
    .loader(|key: &i32| Ok::<_, LoadError>(format!("second-{key}")))
    .build()
    .unwrap();

  assert_eq!(*first.get(&1).unwrap(), "first-1");
  assert_eq!(*second.get(&1).unwrap(), "second-1");

  first.invalidate_all();
  assert!(!first.is_loaded(&1));
  assert!(second.is_loaded(&1));
}

#[test]
fn test_sync_clones_share_state() {
  let (cache, loads) = build_counting_cache(0);
  let other = cache.clone();

  cache.get(&1).unwrap();
  assert!(other.is_loaded(&1));
  other.get(&1).unwrap();
  assert_eq!(loads.count(), 1);
  assert_eq!(cache.metrics().hits, 1);
}

#[test]
fn test_sync_metrics_snapshot() {
  let (cache, _) = build_counting_cache(0);

  cache.get(&1).unwrap();
  cache.get(&1).unwrap();
  cache.get(&1).unwrap();
  cache.get(&2).unwrap();

  let metrics = cache.metrics();
  assert_eq!(metrics.hits, 2);
  assert_eq!(metrics.misses, 2);
  assert_eq!(metrics.hit_ratio, 0.5);
  assert_eq!(metrics.entry_count, 2);
}

#[test]
fn test_sync_custom_hasher() {
  let cache = CacheBuilder::with_hasher(std::collections::hash_map::RandomState::new())
    .maximum_size(2)
    .loader(|key: &String| Ok::<_, LoadError>(key.len()))
    .build()
    .unwrap();

  assert_eq!(*cache.get(&"hello".to_string()).unwrap(), 5);
  assert!(cache.is_loaded(&"hello".to_string()));
}
