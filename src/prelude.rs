pub use crate::error::CacheError;
pub use crate::flight::Flight;
pub use crate::group::{default_registry, Group, Registry};
pub use crate::metrics::{CacheStats, GroupStats};
pub use crate::peer::{PeerGetter, PeerPicker};
pub use crate::ring::HashRing;
pub use crate::store::{ConcurrentLruStore, LruStore};
pub use crate::traits::{Loader, Weighted};
pub use crate::view::ByteView;

#[cfg(feature = "http")]
pub use crate::http::{HttpGetter, HttpPool};
