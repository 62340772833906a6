//! Recency tracking for least-recently-used eviction.

pub(crate) mod lru_list;
