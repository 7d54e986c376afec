//! # HTTP Peer Transport
//!
//! The reference transport carrying peer requests between nodes. One
//! [`HttpPool`] per node plays both sides:
//!
//! ```text
//!   as a CLIENT (PeerPicker + HttpGetter)
//!   ─────────────────────────────────────
//!   group miss ──► pick_peer(key) ──ring──► owning peer
//!                                              │
//!                      GET <peer>/_cachemesh/<group>/<key>
//!                                              ▼
//!   as a SERVER (router)                  remote node
//!   ─────────────────────────────────────
//!   GET /_cachemesh/:group/:key ──► registry lookup ──► group.get(key)
//!       404 unknown group / key          200 application/octet-stream
//!       500 loader failure
//! ```
//!
//! Both path segments travel percent-encoded. The server handler bridges
//! into the synchronous core on a blocking thread, so a slow loader never
//! stalls the async accept loop.
//!
//! Peer membership is rebuilt in one shot by [`HttpPool::set_peers`]: ring
//! and per-peer clients swap together under one lock, which keeps `pick_peer`
//! consistent against concurrent membership changes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::group::Registry;
use crate::peer::{PeerGetter, PeerPicker};
use crate::ring::HashRing;

/// Path prefix for node-to-node traffic, so a host can carry other routes
/// alongside the cache.
pub const DEFAULT_BASE_PATH: &str = "/_cachemesh/";

/// Virtual nodes per peer on the routing ring.
pub const DEFAULT_REPLICAS: usize = 50;

// =============================================================================
// HttpPool
// =============================================================================

/// Ring + per-peer HTTP clients, swapped atomically on membership changes.
struct PoolState {
    ring: HashRing,
    getters: FxHashMap<String, Arc<HttpGetter>>,
}

/// A node's view of the fleet over HTTP.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use cachemesh::group::Registry;
/// use cachemesh::http::HttpPool;
///
/// let registry = Arc::new(Registry::new());
/// let group = registry
///     .new_group("scores", 2 << 10, |key: &str| Ok(key.as_bytes().to_vec()))
///     .unwrap();
///
/// let pool = Arc::new(HttpPool::new("http://localhost:8001"));
/// pool.set_peers([
///     "http://localhost:8001",
///     "http://localhost:8002",
///     "http://localhost:8003",
/// ]);
/// group.register_peer_picker(pool.clone()).unwrap();
///
/// // Serve the pool's router with axum to accept peer traffic.
/// let app = pool.router(registry);
/// # let _ = app;
/// ```
pub struct HttpPool {
    self_addr: String,
    base_path: String,
    replicas: usize,
    state: Mutex<PoolState>,
}

impl HttpPool {
    /// Creates a pool for the node reachable at `self_addr`
    /// (e.g. `"http://10.0.0.1:8001"`), with the default base path and
    /// replica count.
    pub fn new(self_addr: impl Into<String>) -> Self {
        Self::with_base_path(self_addr, DEFAULT_BASE_PATH)
    }

    /// Creates a pool with a custom base path. The path must start and end
    /// with `/`.
    pub fn with_base_path(self_addr: impl Into<String>, base_path: impl Into<String>) -> Self {
        let base_path = base_path.into();
        assert!(
            base_path.starts_with('/') && base_path.ends_with('/'),
            "base path must start and end with '/'"
        );
        HttpPool {
            self_addr: self_addr.into(),
            base_path,
            replicas: DEFAULT_REPLICAS,
            state: Mutex::new(PoolState {
                ring: HashRing::new(DEFAULT_REPLICAS),
                getters: FxHashMap::default(),
            }),
        }
    }

    /// This node's own address, as peers would dial it.
    #[inline]
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    /// The path prefix peer requests are served under.
    #[inline]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Replaces the fleet membership.
    ///
    /// Rebuilds the ring and the per-peer client table in one shot; include
    /// this node's own address so the ring can map keys home.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ring = HashRing::new(self.replicas);
        let mut getters = FxHashMap::default();

        for peer in peers {
            let peer = peer.into();
            getters.insert(
                peer.clone(),
                Arc::new(HttpGetter::new(format!("{}{}", peer, self.base_path))),
            );
            ring.add([peer]);
        }

        *self.state.lock() = PoolState { ring, getters };
    }

    /// Builds the axum router serving this pool's peers from `registry`.
    ///
    /// Routes `GET <base_path>:group/:key`; unknown groups and absent keys
    /// answer 404, loader failures 500, hits raw bytes as
    /// `application/octet-stream`.
    pub fn router(&self, registry: Arc<Registry>) -> Router {
        let route = format!("{}:group/:key", self.base_path);
        Router::new()
            .route(&route, get(serve_group))
            .with_state(registry)
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.lock();
        let peer = state.ring.get(key)?;
        if peer == self.self_addr {
            return None;
        }

        debug!(peer, key, "picked remote peer");
        state
            .getters
            .get(peer)
            .map(|getter| Arc::clone(getter) as Arc<dyn PeerGetter>)
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_addr", &self.self_addr)
            .field("base_path", &self.base_path)
            .field("peers", &self.state.lock().getters.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Server side
// =============================================================================

async fn serve_group(
    State(registry): State<Arc<Registry>>,
    Path((group_name, key)): Path<(String, String)>,
) -> Response {
    let Some(group) = registry.get_group(&group_name) else {
        return (
            StatusCode::NOT_FOUND,
            format!("no such group: {group_name}"),
        )
            .into_response();
    };

    // group.get may block on the loader or another peer; keep it off the
    // async workers.
    let looked_up = tokio::task::spawn_blocking(move || group.get(&key)).await;

    match looked_up {
        Ok(Ok(view)) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            view.to_vec(),
        )
            .into_response(),
        Ok(Err(err @ CacheError::NotFound(_))) => {
            (StatusCode::NOT_FOUND, err.to_string()).into_response()
        }
        Ok(Err(err)) => {
            warn!(group = %group_name, error = %err, "lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
        Err(join_err) => {
            warn!(group = %group_name, error = %join_err, "lookup task panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// =============================================================================
// Client side
// =============================================================================

/// Blocking HTTP client bound to one remote peer.
pub struct HttpGetter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpGetter {
    /// Creates a getter for the peer serving at `base_url`
    /// (e.g. `"http://10.0.0.2:8001/_cachemesh/"`, trailing slash included).
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpGetter {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl PeerGetter for HttpGetter {
    fn get(&self, group: &str, key: &str) -> Result<Vec<u8>, CacheError> {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            utf8_percent_encode(group, NON_ALPHANUMERIC),
            utf8_percent_encode(key, NON_ALPHANUMERIC),
        );

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| CacheError::peer(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::peer(format!("peer returned {status}")));
        }

        response
            .bytes()
            .map(|body| body.to_vec())
            .map_err(|err| CacheError::peer(format!("reading peer response: {err}")))
    }
}

impl std::fmt::Debug for HttpGetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGetter")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
