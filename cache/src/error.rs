use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// The boxed error type accepted from user-supplied loader and write-through functions.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// An error shared between every caller that observed the same failure.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// `build()` was called without a synchronous `loader`.
  #[error("a loading cache requires a loader")]
  MissingLoader,
  /// `build_async()` was called without an `async_loader`.
  #[error("an async loading cache requires an async loader")]
  MissingAsyncLoader,
}

/// Errors surfaced by cache operations.
///
/// The type is cheap to clone so that a single failed load can be handed to
/// every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
  /// The loading function failed. Nothing was cached.
  #[error("loading function failed: {0}")]
  Load(#[source] SharedError),

  /// The write-through function failed after the value was cached.
  /// The cached entry is kept and can be read again.
  #[error("write-through function failed: {0}")]
  WriteThrough(#[source] SharedError),

  /// The caller computing this key's value went away (panicked or was
  /// cancelled) before publishing a result. A later call will retry.
  #[error("the in-flight load was abandoned before completing")]
  LoadAbandoned,

  /// A synchronous loader asked the cache for the very key it is loading.
  /// Waiting on its own load would block the thread forever.
  #[error("the loader requested the key it is currently loading")]
  RecursiveLoad,
}

impl CacheError {
  pub(crate) fn load(err: BoxError) -> Self {
    CacheError::Load(Arc::from(err))
  }

  pub(crate) fn write_through(err: BoxError) -> Self {
    CacheError::WriteThrough(Arc::from(err))
  }

  /// Returns the shared error produced by the user function, if any.
  pub fn shared_source(&self) -> Option<&SharedError> {
    match self {
      CacheError::Load(err) | CacheError::WriteThrough(err) => Some(err),
      CacheError::LoadAbandoned | CacheError::RecursiveLoad => None,
    }
  }

  pub fn is_load(&self) -> bool {
    matches!(self, CacheError::Load(_))
  }

  pub fn is_write_through(&self) -> bool {
    matches!(self, CacheError::WriteThrough(_))
  }
}

/// A specialized `Result` type for cache operations.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;
