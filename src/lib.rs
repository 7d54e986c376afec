//! cachemesh: distributed in-memory key/value caching primitives.
//!
//! A fleet of peer nodes shares one logical cache: any node answers a lookup
//! from its local byte-budgeted LRU, forwards it to the key's owner under a
//! consistent-hash ring, or falls back to a user-supplied loader, with
//! concurrent identical misses collapsed into a single upstream fetch.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod error;
pub mod flight;
pub mod group;
pub mod metrics;
pub mod peer;
pub mod ring;
pub mod store;
pub mod traits;
pub mod view;

#[cfg(feature = "http")]
pub mod http;

pub mod prelude;
