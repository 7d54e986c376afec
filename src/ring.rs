//! # Consistent-Hash Ring
//!
//! Maps keys to peer identifiers so that every node in the fleet, given the
//! same membership, routes a key to the same owner, and so that membership
//! churn remaps only a small slice of the key space.
//!
//! ## Architecture
//!
//! ```text
//!                        0 ──────────► u32::MAX (wraps)
//!        ┌────────────────────────────────────────────────────┐
//!        │   ●17   ●89        ●163      ●201   ●240    ●310   │
//!        │    │     │           │         │      │       │    │
//!        │  "n2"  "n1"        "n2"      "n3"   "n1"    "n3"   │
//!        └────────────────────────────────────────────────────┘
//!
//!   get(key):  h = hash(key); binary-search the sorted hash array for the
//!   first position ≥ h; wrap to index 0 past the end; answer the peer
//!   recorded for that position.
//! ```
//!
//! Each peer appears `replicas` times under derived virtual-node keys
//! (`"<i><peer>"` for replica index `i`), which smooths the load
//! distribution: with enough replicas, each peer owns many small arcs
//! instead of one large one.
//!
//! ## Core Operations
//!
//! | Method   | Complexity      | Description                           |
//! |----------|-----------------|---------------------------------------|
//! | `add`    | O(r·p + n log n)| Register peers, re-sort the ring      |
//! | `get`    | O(log n)        | Owner lookup by binary search         |
//!
//! `add` is the only mutator and rebuilds the sorted array in one shot;
//! callers serialize membership changes against lookups (the HTTP pool does
//! this with one lock around both).
//!
//! ## Hash Function
//!
//! Defaults to CRC-32/IEEE (`crc32fast`), which keeps rings interoperable
//! across nodes; an injected hash supports tests that need hand-placed
//! positions. On the negligible chance of a virtual-node hash collision the
//! later insertion wins.

use rustc_hash::{FxHashMap, FxHashSet};

/// Ring over peer identifiers with replicated virtual nodes.
///
/// # Example
///
/// ```
/// use cachemesh::ring::HashRing;
///
/// let mut ring = HashRing::new(50);
/// ring.add(["node-a", "node-b", "node-c"]);
///
/// let owner = ring.get("some-key").unwrap();
/// // Same input, same owner: every node computes identical routing.
/// assert_eq!(ring.get("some-key"), Some(owner));
/// ```
pub struct HashRing {
    replicas: usize,
    hash: Box<dyn Fn(&[u8]) -> u32 + Send + Sync>,
    hashes: Vec<u32>,
    peers: FxHashMap<u32, String>,
    members: FxHashSet<String>,
}

impl HashRing {
    /// Creates a ring using CRC-32/IEEE with `replicas` virtual nodes per
    /// peer.
    ///
    /// # Panics
    ///
    /// Panics if `replicas` is zero.
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, |data| crc32fast::hash(data))
    }

    /// Creates a ring with an injected hash function.
    ///
    /// # Panics
    ///
    /// Panics if `replicas` is zero.
    pub fn with_hasher(
        replicas: usize,
        hash: impl Fn(&[u8]) -> u32 + Send + Sync + 'static,
    ) -> Self {
        assert!(replicas >= 1, "ring requires at least one replica per peer");
        HashRing {
            replicas,
            hash: Box::new(hash),
            hashes: Vec::new(),
            peers: FxHashMap::default(),
            members: FxHashSet::default(),
        }
    }

    /// Virtual nodes per peer.
    #[inline]
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Number of distinct peers registered.
    #[inline]
    pub fn peer_count(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` while no peer is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Registers peers, placing `replicas` virtual nodes for each.
    ///
    /// Virtual-node keys concatenate the decimal replica index with the peer
    /// identifier, the interoperable construction. Peers already present are
    /// skipped, so the ring always holds `replicas × peer_count()` positions.
    /// The position array is re-sorted once after all insertions.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for peer in peers {
            let peer = peer.into();
            if !self.members.insert(peer.clone()) {
                continue;
            }
            for i in 0..self.replicas {
                let h = (self.hash)(format!("{i}{peer}").as_bytes());
                self.hashes.push(h);
                self.peers.insert(h, peer.clone());
            }
        }
        self.hashes.sort_unstable();
    }

    /// Returns the peer owning `key`, or `None` on an empty ring.
    ///
    /// The owner is the first virtual node at or clockwise of the key's hash,
    /// wrapping past the end of the circle to the first position.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.hashes.is_empty() {
            return None;
        }

        let h = (self.hash)(key.as_bytes());
        let idx = self.hashes.partition_point(|&pos| pos < h);
        let pos = self.hashes[idx % self.hashes.len()];
        self.peers.get(&pos).map(String::as_str)
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("peers", &self.members.len())
            .field("positions", &self.hashes.len())
            .finish_non_exhaustive()
    }
}
