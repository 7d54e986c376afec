//! # Concurrent Cache Wrapper
//!
//! Serializes one [`LruStore`] behind a single `parking_lot::Mutex` and
//! constructs it lazily on the first write.
//!
//! ```text
//!   Thread 1            Thread 2            Thread 3
//!      │                   │                   │
//!      │ get("Tom")        │ add("Jack", …)    │ get("Sam")
//!      ▼                   ▼                   ▼
//!   ┌──────────────────────────────────────────────────────────┐
//!   │                  Mutex<Option<LruStore>>                 │
//!   │                                                          │
//!   │  get() takes the lock too: a hit reorders the recency    │
//!   │  list, so there is no shared-read fast path.             │
//!   │                                                          │
//!   │  None  ──first add──►  Some(LruStore)   (built once)     │
//!   │  get() on None is a miss and builds nothing.             │
//!   └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A group holds exactly one of these as its main cache. The store is never
//! exposed; values leave as clones (for [`ByteView`](crate::view::ByteView)
//! that is a refcount bump).
//!
//! ## Thread Safety
//!
//! All operations take `&self` and are safe from any thread. Lock hold times
//! are a hash lookup plus two pointer splices; the eviction hook is the one
//! caller-controlled piece of code that runs under the lock and must not
//! re-enter the cache.

use parking_lot::Mutex;

use crate::metrics::{CacheCounters, CacheStats};
use crate::store::lru::{EvictionHook, LruStore};
use crate::traits::Weighted;

/// What the mutex guards: the lazily built store, plus the eviction hook
/// waiting to be installed into it on first write.
struct Inner<V: Weighted> {
    store: Option<LruStore<V>>,
    pending_hook: Option<EvictionHook<V>>,
}

/// Thread-safe, lazily initialized LRU cache.
///
/// # Example
///
/// ```
/// use cachemesh::store::ConcurrentLruStore;
/// use cachemesh::view::ByteView;
///
/// let cache: ConcurrentLruStore<ByteView> = ConcurrentLruStore::new(1 << 20);
///
/// assert!(cache.get("missing").is_none());
/// cache.add("key", ByteView::from("value"));
/// assert_eq!(cache.get("key").unwrap().as_slice(), b"value");
/// ```
pub struct ConcurrentLruStore<V: Weighted> {
    max_bytes: usize,
    inner: Mutex<Inner<V>>,
    counters: CacheCounters,
}

impl<V: Weighted> ConcurrentLruStore<V> {
    /// Creates an empty cache. The underlying store is not built until the
    /// first [`add`](Self::add).
    pub fn new(max_bytes: usize) -> Self {
        ConcurrentLruStore {
            max_bytes,
            inner: Mutex::new(Inner {
                store: None,
                pending_hook: None,
            }),
            counters: CacheCounters::default(),
        }
    }

    /// Creates an empty cache whose store will report evictions to `hook`.
    ///
    /// The hook runs under the cache lock and must not re-enter the cache.
    pub fn with_eviction_hook(max_bytes: usize, hook: EvictionHook<V>) -> Self {
        ConcurrentLruStore {
            max_bytes,
            inner: Mutex::new(Inner {
                store: None,
                pending_hook: Some(hook),
            }),
            counters: CacheCounters::default(),
        }
    }

    /// Looks up `key`, returning a clone of the cached value.
    ///
    /// A miss before the first write returns `None` without building the
    /// store. Hits reorder the recency list, which is why this path takes
    /// the same exclusive lock as writes.
    pub fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let mut inner = self.inner.lock();
        let hit = inner.store.as_mut().and_then(|store| store.get(key).cloned());
        drop(inner);

        match hit {
            Some(value) => {
                self.counters.hit();
                Some(value)
            }
            None => {
                self.counters.miss();
                None
            }
        }
    }

    /// Inserts or updates `key`, building the store on first use.
    pub fn add(&self, key: &str, value: V) {
        let mut inner = self.inner.lock();
        let Inner {
            store,
            pending_hook,
        } = &mut *inner;

        let store = store.get_or_insert_with(|| match pending_hook.take() {
            Some(hook) => LruStore::with_eviction_hook(self.max_bytes, hook),
            None => LruStore::new(self.max_bytes),
        });

        let update = store.contains(key);
        let evicted_before = store.evictions();
        store.add(key, value);
        let evicted = store.evictions() - evicted_before;
        drop(inner);

        if update {
            self.counters.update();
        } else {
            self.counters.insert();
        }
        if evicted > 0 {
            self.counters.evictions_add(evicted);
        }
    }

    /// Number of live entries (`0` before the first write).
    pub fn len(&self) -> usize {
        self.inner.lock().store.as_ref().map_or(0, LruStore::len)
    }

    /// Returns `true` while no entry is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current byte usage (`0` before the first write).
    pub fn used_bytes(&self) -> usize {
        self.inner
            .lock()
            .store
            .as_ref()
            .map_or(0, LruStore::used_bytes)
    }

    /// The configured byte budget.
    #[inline]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Snapshot of this cache's counters.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    #[cfg(test)]
    fn initialized(&self) -> bool {
        self.inner.lock().store.is_some()
    }
}

impl<V: Weighted> std::fmt::Debug for ConcurrentLruStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentLruStore")
            .field("len", &self.len())
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}
