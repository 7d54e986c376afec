//! Error types for the cachemesh library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: The one error type surfaced by group lookups, peer
//!   transports, and registry operations.
//!
//! Errors are `Clone` on purpose: a single-flight owner records one outcome
//! and every coalesced waiter receives that exact outcome, so loader failures
//! carry their source error behind an `Arc` rather than a boxed value.
//!
//! ## Example Usage
//!
//! ```
//! use cachemesh::error::CacheError;
//!
//! let err = CacheError::NotFound("Tom".to_string());
//! assert_eq!(err.to_string(), "key \"Tom\" not found");
//! assert!(err.is_not_found());
//! ```

use std::error::Error;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned by group lookups and registry operations.
///
/// The variants map onto the failure classes a cache node can hit:
/// caller mistakes ([`KeyRequired`](Self::KeyRequired),
/// [`PickerAlreadyRegistered`](Self::PickerAlreadyRegistered),
/// [`GroupExists`](Self::GroupExists)), a loader reporting an absent key
/// ([`NotFound`](Self::NotFound)), a failed remote peer fetch
/// ([`Peer`](Self::Peer)), and a loader failure carried verbatim
/// ([`Loader`](Self::Loader)).
///
/// Peer failures are the only kind recovered internally: the group logs them
/// and falls back to its loader. Everything else propagates to the caller.
impl PartialEq for CacheError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyRequired, Self::KeyRequired) => true,
            (Self::PickerAlreadyRegistered { group: a }, Self::PickerAlreadyRegistered { group: b }) => {
                a == b
            }
            (Self::GroupExists(a), Self::GroupExists(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Peer(a), Self::Peer(b)) => a == b,
            (Self::Loader(a), Self::Loader(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CacheError {
    /// A lookup was attempted with an empty key.
    KeyRequired,

    /// `register_peer_picker` was called twice on the same group.
    PickerAlreadyRegistered {
        /// Name of the group that already had a picker.
        group: String,
    },

    /// A group with this name is already registered.
    GroupExists(String),

    /// The loader reports that the key does not exist in the slow source.
    NotFound(String),

    /// A remote peer fetch failed. Carries a transport-level description.
    Peer(String),

    /// The loader itself failed. The source error is shared, not copied,
    /// so all single-flight waiters observe the same object.
    Loader(Arc<dyn Error + Send + Sync + 'static>),
}

impl CacheError {
    /// Wraps an arbitrary loader error, preserving it as the source.
    #[inline]
    pub fn loader(err: impl Error + Send + Sync + 'static) -> Self {
        CacheError::Loader(Arc::new(err))
    }

    /// Builds a peer-transport error from a description.
    #[inline]
    pub fn peer(msg: impl Into<String>) -> Self {
        CacheError::Peer(msg.into())
    }

    /// Returns `true` for the not-found kind.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::KeyRequired => f.write_str("key is required"),
            CacheError::PickerAlreadyRegistered { group } => {
                write!(f, "peer picker already registered for group \"{group}\"")
            }
            CacheError::GroupExists(name) => {
                write!(f, "group \"{name}\" already registered")
            }
            CacheError::NotFound(key) => write!(f, "key \"{key}\" not found"),
            CacheError::Peer(msg) => write!(f, "peer fetch failed: {msg}"),
            CacheError::Loader(src) => write!(f, "loader failed: {src}"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CacheError::Loader(src) => Some(src.as_ref()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FlakyBackend;

    impl fmt::Display for FlakyBackend {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("backend unavailable")
        }
    }

    impl Error for FlakyBackend {}

    #[test]
    fn display_shows_key_for_not_found() {
        let err = CacheError::NotFound("Sam".to_string());
        assert_eq!(err.to_string(), "key \"Sam\" not found");
    }

    #[test]
    fn display_shows_group_for_duplicate_picker() {
        let err = CacheError::PickerAlreadyRegistered {
            group: "scores".to_string(),
        };
        assert!(err.to_string().contains("scores"));
    }

    #[test]
    fn loader_wrapping_preserves_source() {
        let err = CacheError::loader(FlakyBackend);
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "loader failed: backend unavailable");
    }

    #[test]
    fn clones_share_the_loader_source() {
        let err = CacheError::loader(FlakyBackend);
        let other = err.clone();
        match (&err, &other) {
            (CacheError::Loader(a), CacheError::Loader(b)) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => panic!("clone changed variant"),
        }
    }

    #[test]
    fn not_found_predicate() {
        assert!(CacheError::NotFound("x".into()).is_not_found());
        assert!(!CacheError::KeyRequired.is_not_found());
    }

    #[test]
    fn implements_std_error() {
        fn assert_error<T: Error>() {}
        assert_error::<CacheError>();
    }
}
