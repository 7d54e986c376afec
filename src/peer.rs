//! # Peer Contracts
//!
//! The two capabilities a transport supplies to the group controller. The
//! group depends only on these traits; how peers are addressed, encoded, or
//! authenticated is entirely the transport's business.
//!
//! ```text
//!   group.get(key)                         transport (e.g. crate::http)
//!   ──────────────                         ───────────────────────────
//!   miss → picker.pick_peer(key) ───────►  ring lookup over the fleet
//!             │
//!             ├── None: this node owns the key (or runs single-node);
//!             │         fall through to the loader
//!             │
//!             └── Some(getter) ──────────► blocking fetch from the
//!                     │                    owning peer
//!                     ▼
//!             getter.get(group, key) → bytes | error
//! ```
//!
//! | Trait        | Implemented by | Called by                            |
//! |--------------|----------------|--------------------------------------|
//! | `PeerPicker` | transport pool | group, once per miss                 |
//! | `PeerGetter` | per-peer client| group, when a remote peer owns a key |

use std::sync::Arc;

use crate::error::CacheError;

/// A blocking fetch bound to one specific remote peer.
pub trait PeerGetter: Send + Sync {
    /// Fetches `key` from `group` on the bound peer.
    ///
    /// Transport failures and non-success responses surface as
    /// [`CacheError::Peer`]; the group logs them and falls back to its
    /// loader.
    fn get(&self, group: &str, key: &str) -> Result<Vec<u8>, CacheError>;
}

/// Key-to-peer routing over the current fleet membership.
pub trait PeerPicker: Send + Sync {
    /// Returns a getter for the peer owning `key`, or `None` when the key
    /// maps to this node itself or no peer is configured.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGetter;

    impl PeerGetter for FixedGetter {
        fn get(&self, group: &str, key: &str) -> Result<Vec<u8>, CacheError> {
            Ok(format!("{group}/{key}").into_bytes())
        }
    }

    struct AlwaysRemote(Arc<dyn PeerGetter>);

    impl PeerPicker for AlwaysRemote {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            Some(Arc::clone(&self.0))
        }
    }

    #[test]
    fn contracts_are_object_safe() {
        let picker: Arc<dyn PeerPicker> = Arc::new(AlwaysRemote(Arc::new(FixedGetter)));
        let getter = picker.pick_peer("anything").unwrap();
        assert_eq!(getter.get("scores", "Tom").unwrap(), b"scores/Tom");
    }
}
