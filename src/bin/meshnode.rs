//! Demo cache node: a three-node fleet over localhost, fronted by an
//! optional outward API endpoint.
//!
//! ```text
//! cargo run --features http --bin meshnode -- --port 8001
//! cargo run --features http --bin meshnode -- --port 8002
//! cargo run --features http --bin meshnode -- --port 8003 --api
//!
//! curl "http://localhost:9999/api?key=Tom"     # 630
//! curl "http://localhost:9999/api?key=missing" # 404
//! ```
//!
//! Every node registers the same `scores` group over the same static table,
//! so whichever node the API hits, the ring routes each key to its one owner
//! and the "slow-db lookup" line appears on exactly one node per cold key.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cachemesh::error::CacheError;
use cachemesh::group::{Group, Registry};
use cachemesh::http::HttpPool;

const FLEET: [&str; 3] = [
    "http://localhost:8001",
    "http://localhost:8002",
    "http://localhost:8003",
];

const SCORES: [(&str, &str); 3] = [("Tom", "630"), ("Jack", "589"), ("Sam", "567")];

const API_ADDR: &str = "127.0.0.1:9999";

#[derive(Parser)]
#[command(name = "meshnode", about = "cachemesh demo node")]
struct Args {
    /// Port of this node's cache server; also selects its fleet identity.
    #[arg(long, default_value_t = 8001)]
    port: u16,

    /// Additionally expose the outward API endpoint on port 9999.
    #[arg(long)]
    api: bool,
}

fn create_group(registry: &Registry) -> Arc<Group> {
    registry
        .new_group("scores", 2 << 10, |key: &str| {
            info!(key, "slow-db lookup");
            SCORES
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_bytes().to_vec())
                .ok_or_else(|| CacheError::NotFound(key.to_string()))
        })
        .expect("register scores group")
}

#[derive(Deserialize)]
struct ApiParams {
    key: String,
}

async fn api_lookup(
    State(group): State<Arc<Group>>,
    Query(params): Query<ApiParams>,
) -> Response {
    let key = params.key;
    match tokio::task::spawn_blocking(move || group.get(&key)).await {
        Ok(Ok(view)) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            view.to_vec(),
        )
            .into_response(),
        Ok(Err(err @ CacheError::NotFound(_))) => {
            (StatusCode::NOT_FOUND, err.to_string()).into_response()
        }
        Ok(Err(err)) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let self_addr = format!("http://localhost:{}", args.port);

    let registry = Arc::new(Registry::new());
    let group = create_group(&registry);

    let pool = Arc::new(HttpPool::new(self_addr.clone()));
    pool.set_peers(FLEET);
    group.register_peer_picker(pool.clone())?;

    if args.api {
        let api_app = Router::new()
            .route("/api", get(api_lookup))
            .with_state(Arc::clone(&group));
        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(API_ADDR)
                .await
                .expect("bind api address");
            info!(addr = API_ADDR, "api server listening");
            axum::serve(listener, api_app).await.expect("api server");
        });
    }

    let app = pool.router(Arc::clone(&registry));
    let addr: SocketAddr = ([0, 0, 0, 0], args.port).into();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, %self_addr, "cache server listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}
