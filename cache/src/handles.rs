mod futures;
mod sync;

pub use futures::AsyncLoadingCache;
pub use sync::LoadingCache;
