//! # Byte-Budgeted LRU Store
//!
//! Single-threaded core of every group's local cache: an ordered key→value
//! map that charges each entry's key and value bytes against a budget and
//! evicts from the cold end when the budget is exceeded.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                          LruStore<V>                                 │
//!   │                                                                      │
//!   │   ┌────────────────────────────────────────────────────────────┐    │
//!   │   │  FxHashMap<String, NonNull<Node<V>>>                       │    │
//!   │   │                                                            │    │
//!   │   │  "Tom"  ────────────────────────────────────────────┐      │    │
//!   │   │  "Jack" ──────────────────────────────┐             │      │    │
//!   │   │  "Sam"  ────────────────┐             │             │      │    │
//!   │   └─────────────────────────┼─────────────┼─────────────┼──────┘    │
//!   │                             ▼             ▼             ▼           │
//!   │   head ──► ┌──────────┐ ◄──► ┌──────────┐ ◄──► ┌──────────┐ ◄── tail│
//!   │    (MRU)   │ key,value│      │ key,value│      │ key,value│  (LRU)  │
//!   │            └──────────┘      └──────────┘      └──────────┘         │
//!   │                                                                     │
//!   │   used_bytes = Σ (key.len() + value.weight()) over live entries     │
//!   │   max_bytes  = budget; 0 disables eviction                          │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Operations
//!
//! | Method            | Complexity | Description                            |
//! |-------------------|------------|----------------------------------------|
//! | `add(k, v)`       | O(1)*      | Insert or update, then evict to budget |
//! | `get(&k)`         | O(1)       | Lookup, promotes entry to MRU          |
//! | `remove_oldest()` | O(1)       | Evict the LRU entry, fire the hook     |
//! | `len()`           | O(1)       | Live entry count                       |
//! | `used_bytes()`    | O(1)       | Tracked byte total                     |
//!
//! *`add` may cascade: the budget is re-evaluated after every single-entry
//! eviction, so one oversize insert can evict many entries.
//!
//! ## Ordering Rules
//!
//! Every successful `get` and every `add` (new or update) moves the touched
//! entry to the front. Eviction always removes exactly the back entry.
//!
//! ## Oversize Entries
//!
//! An entry whose own footprint exceeds `max_bytes` evicts everything older,
//! then stays as the sole occupant; the eviction loop never removes the last
//! remaining entry. While such an entry is resident, `used_bytes` exceeds
//! `max_bytes`; the next `add` evicts it like any other LRU entry.
//!
//! ## Eviction Hook
//!
//! An optional `FnMut(&str, &V)` observes each eviction after the store's
//! bookkeeping is complete. The wrapper runs it under the cache lock: it must
//! not call back into the cache.
//!
//! ## Thread Safety
//!
//! `LruStore` is **not** thread-safe; all serialization belongs to
//! [`ConcurrentLruStore`](crate::store::ConcurrentLruStore).

use std::fmt;
use std::ptr::NonNull;

use rustc_hash::FxHashMap;

use crate::traits::Weighted;

/// Callback observing each evicted `(key, value)` pair.
pub type EvictionHook<V> = Box<dyn FnMut(&str, &V) + Send>;

/// Node in the recency list.
///
/// The key lives in the node as well as in the index: evicting from the tail
/// must locate the index entry to erase without a second lookup structure.
struct Node<V> {
    prev: Option<NonNull<Node<V>>>,
    next: Option<NonNull<Node<V>>>,
    key: String,
    value: V,
}

/// Size-bounded LRU store over string keys.
///
/// Entries are charged `key.len() + value.weight()` bytes. A budget of `0`
/// means unlimited: the store never evicts.
///
/// # Example
///
/// ```
/// use cachemesh::store::LruStore;
///
/// let mut store: LruStore<String> = LruStore::new(0);
/// store.add("key1", "1234".to_string());
///
/// assert!(store.get("key").is_none());
/// assert_eq!(store.get("key1").unwrap(), "1234");
/// assert_eq!(store.used_bytes(), 8);
/// ```
pub struct LruStore<V: Weighted> {
    map: FxHashMap<String, NonNull<Node<V>>>,
    head: Option<NonNull<Node<V>>>,
    tail: Option<NonNull<Node<V>>>,
    max_bytes: usize,
    used_bytes: usize,
    evictions: u64,
    on_evicted: Option<EvictionHook<V>>,
}

// SAFETY: LruStore can move between threads when its contents can. The raw
// pointers only reference heap nodes owned by this struct, and the hook is
// required to be Send by construction.
unsafe impl<V: Weighted + Send> Send for LruStore<V> {}

// SAFETY: shared references to LruStore permit no mutation (every mutating
// method takes &mut self), so it can be shared when V can.
unsafe impl<V: Weighted + Sync> Sync for LruStore<V> {}

impl<V: Weighted> LruStore<V> {
    /// Creates a store with the given byte budget. `0` disables eviction.
    #[inline]
    pub fn new(max_bytes: usize) -> Self {
        LruStore {
            map: FxHashMap::default(),
            head: None,
            tail: None,
            max_bytes,
            used_bytes: 0,
            evictions: 0,
            on_evicted: None,
        }
    }

    /// Creates a store that reports each eviction to `hook`.
    ///
    /// The hook runs synchronously inside [`remove_oldest`](Self::remove_oldest),
    /// after the entry has been unlinked and the byte accounting adjusted.
    pub fn with_eviction_hook(max_bytes: usize, hook: EvictionHook<V>) -> Self {
        let mut store = LruStore::new(max_bytes);
        store.on_evicted = Some(hook);
        store
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the store holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Byte budget this store evicts toward. `0` means unlimited.
    #[inline]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Sum of `key.len() + value.weight()` over live entries.
    #[inline]
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Cumulative count of entries removed by [`remove_oldest`](Self::remove_oldest).
    #[inline]
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Returns `true` without touching recency order.
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Looks up `key`, promoting the entry to the MRU position on a hit.
    #[inline]
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let node_ptr = *self.map.get(key)?;

        self.detach(node_ptr);
        self.attach_front(node_ptr);

        #[cfg(debug_assertions)]
        self.validate_invariants();

        // SAFETY: node_ptr came from the index and stays alive until removed.
        unsafe { Some(&(*node_ptr.as_ptr()).value) }
    }

    /// Inserts or updates `key`, then evicts from the back until the store
    /// fits its budget again.
    ///
    /// An update replaces the value in place and adjusts `used_bytes` by the
    /// weight delta; both paths promote the entry to the MRU position.
    pub fn add(&mut self, key: &str, value: V) {
        if let Some(&node_ptr) = self.map.get(key) {
            // SAFETY: pointer owned by this store; we hold &mut self.
            let (old_weight, new_weight) = unsafe {
                let node = &mut *node_ptr.as_ptr();
                let old = node.value.weight();
                node.value = value;
                (old, node.value.weight())
            };
            self.used_bytes = self.used_bytes - old_weight + new_weight;

            self.detach(node_ptr);
            self.attach_front(node_ptr);
        } else {
            let charged = key.len() + value.weight();
            let node = Box::new(Node {
                prev: None,
                next: None,
                key: key.to_string(),
                value,
            });
            let node_ptr = NonNull::from(Box::leak(node));

            self.map.insert(key.to_string(), node_ptr);
            self.attach_front(node_ptr);
            self.used_bytes += charged;
        }

        // Re-evaluate between steps: one oversize insert may cascade. The
        // sole remaining entry is never evicted, so a value larger than the
        // whole budget can still be cached alone.
        while self.max_bytes != 0 && self.used_bytes > self.max_bytes && self.map.len() > 1 {
            self.remove_oldest();
        }

        #[cfg(debug_assertions)]
        self.validate_invariants();
    }

    /// Removes and returns the least recently used entry.
    ///
    /// Bookkeeping (index erase, byte deduction) completes before the
    /// eviction hook observes the pair. Returns `None` on an empty store.
    pub fn remove_oldest(&mut self) -> Option<(String, V)> {
        let node = self.pop_tail()?;

        self.map.remove(node.key.as_str());
        self.used_bytes -= node.key.len() + node.value.weight();
        self.evictions += 1;

        if let Some(hook) = self.on_evicted.as_mut() {
            hook(&node.key, &node.value);
        }

        let Node { key, value, .. } = *node;
        Some((key, value))
    }

    /// Detach a node from the recency list without touching the index.
    #[inline(always)]
    fn detach(&mut self, node_ptr: NonNull<Node<V>>) {
        unsafe {
            let node = node_ptr.as_ref();
            let prev = node.prev;
            let next = node.next;

            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => self.head = next,
            }

            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }

    /// Attach a node at the front (MRU position).
    #[inline(always)]
    fn attach_front(&mut self, mut node_ptr: NonNull<Node<V>>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.prev = None;
            node.next = self.head;

            match self.head {
                Some(mut h) => h.as_mut().prev = Some(node_ptr),
                None => self.tail = Some(node_ptr),
            }

            self.head = Some(node_ptr);
        }
    }

    /// Unlink and reclaim the tail node (LRU position).
    #[inline(always)]
    fn pop_tail(&mut self) -> Option<Box<Node<V>>> {
        self.tail.map(|tail_ptr| unsafe {
            let node = Box::from_raw(tail_ptr.as_ptr());

            self.tail = node.prev;
            match self.tail {
                Some(mut t) => t.as_mut().next = None,
                None => self.head = None,
            }

            node
        })
    }

    /// Validate list/index agreement and byte accounting (debug builds only).
    #[cfg(debug_assertions)]
    fn validate_invariants(&self) {
        if self.map.is_empty() {
            debug_assert!(self.head.is_none());
            debug_assert!(self.tail.is_none());
            debug_assert_eq!(self.used_bytes, 0);
            return;
        }

        let mut count = 0usize;
        let mut bytes = 0usize;
        let mut current = self.head;
        while let Some(ptr) = current {
            count += 1;
            unsafe {
                let node = ptr.as_ref();
                debug_assert!(self.map.contains_key(node.key.as_str()));
                bytes += node.key.len() + node.value.weight();
                current = node.next;
            }
            if count > self.map.len() {
                panic!("cycle detected in recency list");
            }
        }

        debug_assert_eq!(count, self.map.len());
        debug_assert_eq!(bytes, self.used_bytes);
    }
}

// Reclaim every heap node; the eviction hook does not fire on drop.
impl<V: Weighted> Drop for LruStore<V> {
    fn drop(&mut self) {
        while self.pop_tail().is_some() {}
    }
}

impl<V: Weighted> fmt::Debug for LruStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruStore")
            .field("len", &self.len())
            .field("used_bytes", &self.used_bytes)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}
