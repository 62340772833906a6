use fibre_loading_cache::{CacheBuilder, RemovalCause};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Profile {
  id: u32,
  name: String,
}

// Stands in for a slow remote lookup.
fn fetch_profile(id: &u32) -> Result<Profile, std::io::Error> {
  thread::sleep(Duration::from_millis(200));
  if *id == 0 {
    return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such profile"));
  }
  Ok(Profile {
    id: *id,
    name: format!("user-{id}"),
  })
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cache = CacheBuilder::default()
    .maximum_size(100)
    .maximum_weight(64)
    .weigher(|_id: &u32, profile: &Profile| profile.name.len() as u64)
    .time_to_live(Duration::from_secs(2))
    .loader(fetch_profile)
    .removal_listener(|id: u32, _profile: Arc<Profile>, cause: RemovalCause| {
      println!("  profile {id} removed: {cause}");
    })
    .build()
    .expect("Failed to build cache");

  // Eight threads ask for the same profile at once; only one fetch runs.
  let start = Instant::now();
  let handles: Vec<_> = (0..8)
    .map(|_| {
      let cache = cache.clone();
      thread::spawn(move || cache.get(&1))
    })
    .collect();
  for handle in handles {
    let profile = handle.join().unwrap().expect("load failed");
    println!("Got profile {} ({})", profile.id, profile.name);
  }
  println!("8 concurrent gets took {:?}", start.elapsed());

  // A failed load caches nothing.
  match cache.get(&0) {
    Ok(profile) => println!("Unexpected profile: {profile:?}"),
    Err(err) => println!("Load failed as expected: {err}"),
  }
  println!("Profile 0 loaded: {}", cache.is_loaded(&0));

  // Fill past the weight bound to watch the LRU entries go.
  for id in 2..12 {
    cache.get(&id).expect("load failed");
  }
  println!("Entries: {}, weight: {}", cache.len(), cache.weight());

  println!("\nWaiting for entries to expire...");
  thread::sleep(Duration::from_secs(3));
  println!("Profile 11 fresh: {}", cache.peek(&11).is_some());
  cache.get(&11).expect("load failed");

  println!("\nCache metrics: {:#?}", cache.metrics());
}
