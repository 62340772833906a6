use crate::error::{BoxError, CacheError};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread, ThreadId};

use ahash::HashMap;

/// The outcome every caller of one coordinated load receives.
pub(crate) type LoadResult<V> = Result<Arc<V>, CacheError>;

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub(crate) type SyncLoadFn<K, V> = Arc<dyn Fn(&K) -> Result<V, BoxError> + Send + Sync>;
pub(crate) type AsyncLoadFn<K, V> =
  Arc<dyn Fn(K) -> BoxFuture<Result<V, BoxError>> + Send + Sync>;
pub(crate) type WeighFn<K, V> = Arc<dyn Fn(&K, &V) -> u64 + Send + Sync>;
pub(crate) type WriteThroughFn<K, V> = Arc<dyn Fn(&K, &V) -> Result<(), BoxError> + Send + Sync>;

/// Represents a waiter in the queue for a `LoadFuture`.
pub(crate) enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

/// The internal state of a value being loaded.
pub(crate) enum State<V> {
  Computing,
  Complete(LoadResult<V>),
}

/// The internal, mutex-protected core of the LoadFuture.
pub(crate) struct Inner<V> {
  pub(crate) state: State<V>,
  pub(crate) waiters: VecDeque<Waiter>,
}

/// A one-shot broadcast of a load result.
/// It can be awaited by multiple sync threads and async tasks simultaneously.
pub(crate) struct LoadFuture<V> {
  pub(crate) inner: Mutex<Inner<V>>,
  // The thread running a synchronous loader, if any.
  leader: Option<ThreadId>,
}

impl<V> LoadFuture<V> {
  /// Creates a new `LoadFuture` in the "Computing" state.
  pub fn new(leader: Option<ThreadId>) -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Computing,
        waiters: VecDeque::new(),
      }),
      leader,
    }
  }

  /// Returns `true` if `thread` is the one computing this load.
  pub fn is_led_by(&self, thread: ThreadId) -> bool {
    self.leader == Some(thread)
  }

  /// Completes the future, waking all waiters. Only the first completion
  /// is kept.
  pub fn complete(&self, result: LoadResult<V>) {
    let mut inner = self.inner.lock();
    if matches!(inner.state, State::Complete(_)) {
      return;
    }
    inner.state = State::Complete(result);
    for waiter in inner.waiters.drain(..) {
      waiter.wake();
    }
  }

  /// Blocks the current thread until the load completes.
  pub fn wait(&self) -> LoadResult<V> {
    let mut inner = self.inner.lock();
    loop {
      match &inner.state {
        State::Complete(result) => return result.clone(),
        State::Computing => {
          inner.waiters.push_back(Waiter::Sync(thread::current()));
          drop(inner); // Unlock before parking.
          thread::park();
          // Wakeups may be spurious; the state is re-checked under the lock.
          inner = self.inner.lock();
        }
      }
    }
  }
}

impl<'a, V> Future for &'a LoadFuture<V> {
  type Output = LoadResult<V>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut inner = self.inner.lock();
    match &inner.state {
      State::Complete(result) => Poll::Ready(result.clone()),
      State::Computing => {
        let already_queued = inner.waiters.iter().any(|waiter| match waiter {
          Waiter::Async(waker) => waker.will_wake(cx.waker()),
          Waiter::Sync(_) => false,
        });
        if !already_queued {
          inner.waiters.push_back(Waiter::Async(cx.waker().clone()));
        }
        Poll::Pending
      }
    }
  }
}

/// What a caller should do after asking to load a key.
pub(crate) enum Flight<'a, K: Eq + Hash, V> {
  /// No load was in flight; this caller runs the loader and must publish.
  Leader(LoadGuard<'a, K, V>),
  /// Another caller is loading; wait on its result.
  Waiter(Arc<LoadFuture<V>>),
}

/// Tracks the in-flight load of each key so that concurrent misses on the
/// same key share one loader invocation.
///
/// The pending map has its own lock. It is never held together with the
/// store lock, nor while a loader runs.
pub(crate) struct LoadCoordinator<K, V> {
  pending: Mutex<HashMap<K, Arc<LoadFuture<V>>>>,
}

impl<K, V> LoadCoordinator<K, V>
where
  K: Eq + Hash + Clone,
{
  pub(crate) fn new() -> Self {
    Self {
      pending: Mutex::new(HashMap::default()),
    }
  }

  /// Joins the in-flight load for `key`, or registers this caller as its leader.
  ///
  /// `leader` names the thread that will run a blocking loader, so a re-entrant
  /// request from that thread can be told apart from a genuine waiter.
  pub(crate) fn begin(&self, key: &K, leader: Option<ThreadId>) -> Flight<'_, K, V> {
    let mut pending = self.pending.lock();
    if let Some(existing) = pending.get(key) {
      return Flight::Waiter(existing.clone());
    }

    let future = Arc::new(LoadFuture::new(leader));
    pending.insert(key.clone(), future.clone());
    Flight::Leader(LoadGuard {
      coordinator: self,
      key: key.clone(),
      future,
      completed: false,
    })
  }

  pub(crate) fn in_flight(&self) -> usize {
    self.pending.lock().len()
  }
}

/// The leader's obligation to publish a result for its key.
///
/// Dropping the guard without calling `complete` (the loader panicked, or an
/// async leader was cancelled) releases every waiter with
/// `CacheError::LoadAbandoned` and clears the record so the next call retries.
pub(crate) struct LoadGuard<'a, K: Eq + Hash, V> {
  coordinator: &'a LoadCoordinator<K, V>,
  key: K,
  future: Arc<LoadFuture<V>>,
  completed: bool,
}

impl<'a, K, V> LoadGuard<'a, K, V>
where
  K: Eq + Hash,
{
  /// Clears the in-flight record and releases all waiters with `result`.
  ///
  /// The record is cleared first: a caller arriving afterwards either finds
  /// the value in the store or starts a new load.
  pub(crate) fn complete(mut self, result: LoadResult<V>) {
    self.finish(result);
  }

  fn finish(&mut self, result: LoadResult<V>) {
    if self.completed {
      return;
    }
    self.completed = true;
    {
      let mut pending = self.coordinator.pending.lock();
      if pending
        .get(&self.key)
        .is_some_and(|current| Arc::ptr_eq(current, &self.future))
      {
        pending.remove(&self.key);
      }
    }
    self.future.complete(result);
  }
}

impl<'a, K, V> Drop for LoadGuard<'a, K, V>
where
  K: Eq + Hash,
{
  fn drop(&mut self) {
    if !self.completed {
      tracing::warn!("in-flight load abandoned before publishing a result");
      self.finish(Err(CacheError::LoadAbandoned));
    }
  }
}
