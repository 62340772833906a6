//! A concurrent, self-populating loading cache.
//!
//! A `LoadingCache` computes missing or expired values on demand through a
//! user-supplied loader and keeps itself within configured bounds.
//!
//! # Features
//! - **Single-flight loads**: Concurrent misses on the same key share one
//!   loader call; every caller receives the same value or the same error.
//! - **Bounded**: Entry count and total weight limits, enforced synchronously
//!   on every write by evicting the least recently used entries.
//! - **Expiry**: A time-to-live checked lazily on access. No background threads.
//! - **Sync & Async**: A blocking `LoadingCache` and an `AsyncLoadingCache`
//!   whose loader is a future.
//! - **Non-Clone Support**: Values are handed out as `Arc<V>`, avoiding `V: Clone` bounds.
//! - **Hooks**: Write-through and removal listener callbacks.
//! - **Observability**: `tracing` events and a metrics snapshot.
//!
//! ```
//! use fibre_loading_cache::CacheBuilder;
//! use std::time::Duration;
//!
//! let cache = CacheBuilder::new()
//!   .maximum_size(1_000)
//!   .time_to_live(Duration::from_secs(60))
//!   .loader(|id: &u32| Ok::<_, std::io::Error>(format!("user-{id}")))
//!   .build()
//!   .unwrap();
//!
//! assert_eq!(*cache.get(&7).unwrap(), "user-7");
//! assert!(cache.is_loaded(&7));
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod listener;
pub mod metrics;

// Internal, crate-only modules
mod entry;
mod loader;
mod policy;
mod shared;
mod store;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use error::{BoxError, BuildError, CacheError, SharedError};
pub use handles::{AsyncLoadingCache, LoadingCache};
pub use listener::{RemovalCause, RemovalListener};
pub use metrics::MetricsSnapshot;
