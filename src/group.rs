//! # Group Controller
//!
//! The public face of the cache: a group is a named namespace with its own
//! byte budget, loader, and peer view. It composes the storage, routing, and
//! coalescing layers into the miss path below.
//!
//! ## Request Flow
//!
//! ```text
//!   get(key)
//!     │
//!     ├─► local cache ── hit ──────────────────────────► ByteView  (1)
//!     │        miss
//!     ▼
//!   single-flight (one upstream fetch per key per burst)
//!     │
//!     ├─► peer picker ── remote owner ──► peer getter ─► ByteView  (2)
//!     │        │                              │ failure
//!     │        │ self / no picker             ▼ (logged, recovered)
//!     │        └──────────────────────► loader ──► populate ─► ByteView  (3)
//!     ▼
//!   result shared with every coalesced waiter
//! ```
//!
//! Only the loader path populates the local cache: the remote peer on path
//! (2) is itself an owner whose cache already holds the value, and caching
//! it here too would double-cache every hot key and defeat the ring's load
//! distribution.
//!
//! ## Locks
//!
//! | State                  | Lock                         | Scope          |
//! |------------------------|------------------------------|----------------|
//! | name → group index     | `parking_lot::RwLock`        | per registry   |
//! | local cache            | `parking_lot::Mutex`         | per group      |
//! | in-flight call index   | `parking_lot::Mutex`         | per group      |
//! | peer picker slot       | `OnceLock` (write-once)      | per group      |
//!
//! ## Registry
//!
//! Groups register in a [`Registry`], an explicit value an application can
//! construct per test or per process. [`default_registry`] offers the
//! process-wide instance for the common single-registry deployment.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::flight::Flight;
use crate::metrics::{CacheStats, GroupCounters, GroupStats};
use crate::peer::{PeerGetter, PeerPicker};
use crate::store::ConcurrentLruStore;
use crate::traits::Loader;
use crate::view::ByteView;

// =============================================================================
// Group
// =============================================================================

/// A named cache namespace over one loader and an optional peer fleet.
///
/// # Example
///
/// ```
/// use cachemesh::error::CacheError;
/// use cachemesh::group::Group;
///
/// let group = Group::new("scores", 2 << 10, |key: &str| match key {
///     "Tom" => Ok(b"630".to_vec()),
///     _ => Err(CacheError::NotFound(key.to_string())),
/// });
///
/// assert_eq!(group.get("Tom").unwrap().to_string(), "630");
/// // Second lookup is a local hit; the loader is not consulted again.
/// assert_eq!(group.get("Tom").unwrap().to_string(), "630");
/// assert!(group.get("Amy").unwrap_err().is_not_found());
/// ```
pub struct Group {
    name: String,
    loader: Arc<dyn Loader>,
    cache: ConcurrentLruStore<ByteView>,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    flight: Flight<ByteView>,
    counters: GroupCounters,
}

impl Group {
    /// Creates a standalone group with `max_bytes` of local cache budget.
    ///
    /// The loader is the authoritative fetch path; a bare closure works via
    /// the blanket [`Loader`] impl. Use [`Registry::new_group`] to also make
    /// the group addressable by name (required for serving peers over a
    /// transport).
    pub fn new(name: impl Into<String>, max_bytes: usize, loader: impl Loader + 'static) -> Self {
        Group {
            name: name.into(),
            loader: Arc::new(loader),
            cache: ConcurrentLruStore::new(max_bytes),
            peers: OnceLock::new(),
            flight: Flight::new(),
            counters: GroupCounters::default(),
        }
    }

    /// This group's namespace name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attaches the peer picker. A group accepts exactly one picker for its
    /// lifetime; a second registration is rejected.
    ///
    /// No picker means single-node mode: every miss goes to the loader.
    pub fn register_peer_picker(&self, picker: Arc<dyn PeerPicker>) -> Result<(), CacheError> {
        self.peers
            .set(picker)
            .map_err(|_| CacheError::PickerAlreadyRegistered {
                group: self.name.clone(),
            })
    }

    /// Looks up `key`: local cache, then owning peer, then loader.
    ///
    /// Concurrent misses for the same key are coalesced into one upstream
    /// fetch; every caller receives the same outcome. Peer failures are
    /// logged and recovered by falling back to the loader; loader errors
    /// surface verbatim.
    pub fn get(&self, key: &str) -> Result<ByteView, CacheError> {
        if key.is_empty() {
            return Err(CacheError::KeyRequired);
        }
        self.counters.get();

        if let Some(view) = self.cache.get(key) {
            debug!(group = %self.name, key, "cache hit");
            self.counters.local_hit();
            return Ok(view);
        }

        self.load(key)
    }

    /// Miss path, executed at most once per key per coalesced burst.
    fn load(&self, key: &str) -> Result<ByteView, CacheError> {
        self.flight.call(key, || {
            if let Some(picker) = self.peers.get() {
                if let Some(peer) = picker.pick_peer(key) {
                    match self.get_from_peer(peer.as_ref(), key) {
                        Ok(view) => {
                            debug!(group = %self.name, key, "served by peer");
                            self.counters.peer_hit();
                            return Ok(view);
                        }
                        Err(err) => {
                            self.counters.peer_failure();
                            warn!(
                                group = %self.name,
                                key,
                                error = %err,
                                "peer fetch failed, falling back to loader"
                            );
                        }
                    }
                }
            }

            self.get_locally(key)
        })
    }

    fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView, CacheError> {
        let bytes = peer.get(&self.name, key)?;
        // Not populated locally: the remote owner already caches this value.
        Ok(ByteView::from(bytes))
    }

    fn get_locally(&self, key: &str) -> Result<ByteView, CacheError> {
        self.counters.load();
        let bytes = self.loader.load(key).map_err(|err| {
            self.counters.loader_error();
            err
        })?;

        let view = ByteView::from(bytes);
        self.cache.add(key, view.clone());
        Ok(view)
    }

    /// Snapshot of this group's request-flow counters.
    pub fn stats(&self) -> GroupStats {
        self.counters.snapshot()
    }

    /// Snapshot of the local cache's counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Live entries in the local cache.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("cache_len", &self.cache.len())
            .field("has_picker", &self.peers.get().is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Name → group index.
///
/// An explicit value rather than hidden global state: applications (and
/// tests) construct their own, and a transport serves the registry it is
/// handed. [`default_registry`] provides the shared process-wide instance.
#[derive(Default)]
pub struct Registry {
    groups: RwLock<FxHashMap<String, Arc<Group>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Creates and registers a group.
    ///
    /// Name collisions are rejected and leave the existing group untouched.
    pub fn new_group(
        &self,
        name: impl Into<String>,
        max_bytes: usize,
        loader: impl Loader + 'static,
    ) -> Result<Arc<Group>, CacheError> {
        let name = name.into();
        let mut groups = self.groups.write();
        if groups.contains_key(&name) {
            return Err(CacheError::GroupExists(name));
        }

        let group = Arc::new(Group::new(name.clone(), max_bytes, loader));
        groups.insert(name, Arc::clone(&group));
        Ok(group)
    }

    /// Looks up a group by name.
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Number of registered groups.
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    /// Returns `true` while no group is registered.
    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("groups", &self.groups.read().len())
            .finish_non_exhaustive()
    }
}

/// The process-wide registry most deployments share.
pub fn default_registry() -> &'static Registry {
    static DEFAULT: OnceLock<Registry> = OnceLock::new();
    DEFAULT.get_or_init(Registry::new)
}

// =============================================================================
// Tests
// =============================================================================
