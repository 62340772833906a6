mod common;

use common::{build_counting_cache, wait_for_load_in_flight, LoadCounter, LoadError};
use fibre_loading_cache::{CacheBuilder, CacheError, LoadingCache};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_sync_loader_basic() {
  let (cache, loads) = build_counting_cache(10);

  // 1. A miss runs the loader.
  let value = cache.get(&5).unwrap();
  assert_eq!(*value, "value-5");
  assert_eq!(loads.count(), 1, "Loader should be called once");
  assert_eq!(cache.metrics().misses, 1);
  assert_eq!(cache.metrics().loads, 1);

  // 2. A second call is served from the cache.
  let again = cache.get(&5).unwrap();
  assert!(Arc::ptr_eq(&value, &again));
  assert_eq!(loads.count(), 1, "Loader should NOT be called again");
  assert_eq!(cache.metrics().hits, 1);
}

#[test]
fn test_sync_loader_thundering_herd() {
  let loads = LoadCounter::new();
  let num_threads = 20;

  let cache = CacheBuilder::new()
    .maximum_size(10)
    .loader({
      let loads = loads.clone();
      move |key: &i32| {
        // Simulate a slow database call.
        thread::sleep(Duration::from_millis(100));
        loads.hit();
        Ok::<_, LoadError>(format!("value-{key}"))
      }
    })
    .build()
    .unwrap();

  let barrier = Arc::new(Barrier::new(num_threads));
  let handles: Vec<_> = (0..num_threads)
    .map(|_| {
      let cache = cache.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        cache.get(&42).unwrap()
      })
    })
    .collect();

  let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

  assert_eq!(loads.count(), 1, "Loader must run exactly once for the herd");
  for value in &results {
    assert!(Arc::ptr_eq(value, &results[0]), "All callers share one value");
  }
  let metrics = cache.metrics();
  assert_eq!(metrics.misses, 1);
  assert_eq!(metrics.hits, (num_threads - 1) as u64);
  assert_eq!(cache.loads_in_flight(), 0);
}

#[test]
fn test_sync_loader_failure_is_shared_by_all_waiters() {
  let loads = LoadCounter::new();
  let num_threads = 10;

  let cache = CacheBuilder::new()
    .loader({
      let loads = loads.clone();
      move |key: &i32| -> Result<String, LoadError> {
        thread::sleep(Duration::from_millis(100));
        loads.hit();
        Err(LoadError::Unavailable(*key))
      }
    })
    .build()
    .unwrap();

  let barrier = Arc::new(Barrier::new(num_threads));
  let handles: Vec<_> = (0..num_threads)
    .map(|_| {
      let cache = cache.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        cache.get(&7)
      })
    })
    .collect();

  let errors: Vec<CacheError> = handles
    .into_iter()
    .map(|h| h.join().unwrap().unwrap_err())
    .collect();

  assert_eq!(loads.count(), 1);
  let first = errors[0].shared_source().expect("load error carries its source");
  for err in &errors {
    assert!(err.is_load());
    assert!(Arc::ptr_eq(err.shared_source().unwrap(), first));
  }
  assert_eq!(first.to_string(), "backend unavailable for key 7");

  // Nothing was cached and the in-flight record is gone.
  assert!(!cache.is_loaded(&7));
  assert_eq!(cache.loads_in_flight(), 0);
  assert_eq!(cache.metrics().load_failures, 1);
}

#[test]
fn test_sync_loader_retries_after_failure() {
  let loads = LoadCounter::new();
  let cache = CacheBuilder::new()
    .loader({
      let loads = loads.clone();
      move |key: &i32| {
        if loads.hit() == 1 {
          Err(LoadError::Unavailable(*key))
        } else {
          Ok(format!("value-{key}"))
        }
      }
    })
    .build()
    .unwrap();

  assert!(cache.get(&1).unwrap_err().is_load());
  assert_eq!(*cache.get(&1).unwrap(), "value-1");
  assert_eq!(loads.count(), 2);
}

#[test]
fn test_sync_loader_panic_releases_waiters() {
  let loads = LoadCounter::new();
  let cache = CacheBuilder::new()
    .loader({
      let loads = loads.clone();
      move |key: &i32| -> Result<String, LoadError> {
        if loads.hit() == 1 {
          thread::sleep(Duration::from_millis(100));
          panic!("loader crashed");
        }
        Ok(format!("value-{key}"))
      }
    })
    .build()
    .unwrap();

  let leader = {
    let cache = cache.clone();
    thread::spawn(move || cache.get(&1))
  };
  wait_for_load_in_flight(&cache);

  let waiters: Vec<_> = (0..3)
    .map(|_| {
      let cache = cache.clone();
      thread::spawn(move || cache.get(&1))
    })
    .collect();

  assert!(leader.join().is_err(), "The leader thread should have panicked");
  for waiter in waiters {
    let result = waiter.join().unwrap();
    assert!(matches!(result, Err(CacheError::LoadAbandoned)));
  }

  assert_eq!(cache.loads_in_flight(), 0);
  assert_eq!(*cache.get(&1).unwrap(), "value-1");
}

#[test]
fn test_sync_loader_different_keys_load_in_parallel() {
  let cache = CacheBuilder::new()
    .loader(|key: &i32| {
      thread::sleep(Duration::from_millis(150));
      Ok::<_, LoadError>(key * 2)
    })
    .build()
    .unwrap();

  let start = std::time::Instant::now();
  let handles: Vec<_> = (0..4)
    .map(|key| {
      let cache = cache.clone();
      thread::spawn(move || *cache.get(&key).unwrap())
    })
    .collect();
  let values: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();

  assert_eq!(values, vec![0, 2, 4, 6]);
  assert!(
    start.elapsed() < Duration::from_millis(500),
    "Loads for different keys must not serialize"
  );
}

#[test]
fn test_sync_loader_may_read_the_cache() {
  let (inner, _) = build_counting_cache(0);
  let cache = CacheBuilder::new()
    .loader(move |key: &i32| -> Result<String, LoadError> {
      // No cache lock is held while loading.
      let base = inner.get(key).map_err(|_| LoadError::Unavailable(*key))?;
      Ok(format!("{base}!"))
    })
    .build()
    .unwrap();

  assert_eq!(*cache.get(&3).unwrap(), "value-3!");
}

#[test]
fn test_sync_loader_asking_for_its_own_key_fails_fast() {
  let slot: Arc<Mutex<Option<LoadingCache<i32, String>>>> = Arc::new(Mutex::new(None));
  let cache = CacheBuilder::new()
    .loader({
      let slot = slot.clone();
      move |key: &i32| {
        let cache = slot.lock().unwrap().clone();
        let nested = match cache {
          Some(cache) => match cache.get(key) {
            Err(CacheError::RecursiveLoad) => "recursive",
            Err(_) => "other error",
            Ok(_) => "value",
          },
          None => "no cache",
        };
        Ok::<_, LoadError>(nested.to_string())
      }
    })
    .build()
    .unwrap();
  *slot.lock().unwrap() = Some(cache.clone());

  // Returns instead of parking on its own load.
  assert_eq!(*cache.get(&1).unwrap(), "recursive");
  assert_eq!(cache.loads_in_flight(), 0);
  assert_eq!(cache.metrics().hits, 0);

  // Break the reference cycle.
  slot.lock().unwrap().take();
}
