//! Storage layer: the byte-budgeted LRU store and its concurrent wrapper.
//!
//! | Component             | Description                                      |
//! |-----------------------|--------------------------------------------------|
//! | [`lru::LruStore`]     | Single-threaded core: recency list + key index   |
//! | [`concurrent::ConcurrentLruStore`] | Mutex-serialized, lazily built wrapper |
//!
//! The split mirrors the rest of the crate's layering: the core is
//! single-threaded and owns all invariants; the wrapper owns serialization
//! and nothing else. Groups always go through the wrapper.

pub mod concurrent;
pub mod lru;

pub use concurrent::ConcurrentLruStore;
pub use lru::{EvictionHook, LruStore};
