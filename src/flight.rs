//! # Single-Flight Coordinator
//!
//! Collapses concurrent executions of the same keyed operation into one:
//! the first caller for a key becomes the owner and runs the function; every
//! caller that arrives while it is in flight blocks on the call's latch and
//! receives the owner's exact outcome.
//!
//! ```text
//!   thread A ── call("Tom", f) ──► owner: runs f()           ┐
//!   thread B ── call("Tom", g) ──► waiter: blocks on latch   ├─► same
//!   thread C ── call("Tom", h) ──► waiter: blocks on latch   ┘   outcome
//!
//!   thread D ── call("Sam", k) ──► independent owner, runs k()
//! ```
//!
//! ## Protocol
//!
//! 1. Lock the index. An existing call for the key? Grab a handle, unlock,
//!    wait on its latch, return the recorded outcome.
//! 2. Otherwise publish a fresh call and unlock.
//! 3. Run the function with no locks held.
//! 4. Record the outcome, open the latch (wakes every waiter).
//! 5. Re-lock the index and delete the key. Deleting after the latch opens
//!    is deliberate: waiters from step 1 already hold their handle and never
//!    look the key up again.
//!
//! Each call is unpublished before `call` returns, so a later burst for the
//! same key starts a fresh execution: this memoizes a single in-flight
//! fetch, not a result cache.
//!
//! ## Failure Semantics
//!
//! Errors are not isolated: the owner's `Err` is cloned to every waiter
//! ([`CacheError`] shares loader sources by `Arc`, so it is the same error
//! object, not a reformatted copy).

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::error::CacheError;

/// One in-flight execution: the latch waiters block on, and the outcome the
/// owner records before opening it.
struct Call<T> {
    outcome: Mutex<Option<Result<T, CacheError>>>,
    done: Condvar,
}

/// Per-key duplicate suppression for fallible operations.
///
/// # Example
///
/// ```
/// use cachemesh::flight::Flight;
///
/// let flight: Flight<String> = Flight::new();
/// let value = flight
///     .call("config", || Ok("fetched-once".to_string()))
///     .unwrap();
/// assert_eq!(value, "fetched-once");
/// ```
pub struct Flight<T> {
    calls: Mutex<FxHashMap<String, Arc<Call<T>>>>,
}

impl<T: Clone> Flight<T> {
    /// Creates an empty coordinator.
    pub fn new() -> Self {
        Flight {
            calls: Mutex::new(FxHashMap::default()),
        }
    }

    /// Runs `f` for `key`, unless an identical call is already in flight, in
    /// which case this blocks until that call completes and returns its
    /// outcome.
    ///
    /// `f` executes with no internal locks held; it may block for as long as
    /// the upstream fetch takes. Waiters block for the same duration.
    pub fn call<F>(&self, key: &str, f: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Result<T, CacheError>,
    {
        let call = {
            let mut calls = self.calls.lock();
            if let Some(existing) = calls.get(key) {
                let call = Arc::clone(existing);
                drop(calls);

                let mut outcome = call.outcome.lock();
                while outcome.is_none() {
                    call.done.wait(&mut outcome);
                }
                return outcome.clone().expect("latch opened without an outcome");
            }

            let call = Arc::new(Call {
                outcome: Mutex::new(None),
                done: Condvar::new(),
            });
            calls.insert(key.to_string(), Arc::clone(&call));
            call
        };

        let result = f();

        {
            let mut outcome = call.outcome.lock();
            *outcome = Some(result.clone());
            call.done.notify_all();
        }

        self.calls.lock().remove(key);

        result
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T: Clone> Default for Flight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Flight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flight")
            .field("in_flight", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn hundred_concurrent_callers_one_execution() {
        let flight: Arc<Flight<String>> = Arc::new(Flight::new());
        let executions = Arc::new(AtomicUsize::new(0));
        let start = Arc::new(Barrier::new(100));

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let executions = Arc::clone(&executions);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    flight.call("x", || {
                        // Hold the call open long enough for every peer
                        // thread to coalesce onto it.
                        thread::sleep(Duration::from_millis(250));
                        executions.fetch_add(1, Ordering::SeqCst);
                        Ok("shared".to_string())
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_deref() == Ok("shared")));
        assert_eq!(flight.in_flight(), 0);
    }

    #[test]
    fn distinct_keys_run_independently() {
        let flight: Arc<Flight<String>> = Arc::new(Flight::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|key| {
                let flight = Arc::clone(&flight);
                let executions = Arc::clone(&executions);
                thread::spawn(move || {
                    flight.call(key, || {
                        executions.fetch_add(1, Ordering::SeqCst);
                        Ok(key.to_uppercase())
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(executions.load(Ordering::SeqCst), 2);
        assert!(results.contains(&Ok("LEFT".to_string())));
        assert!(results.contains(&Ok("RIGHT".to_string())));
    }

    #[test]
    fn sequential_calls_execute_fresh() {
        let flight: Flight<u32> = Flight::new();
        let executions = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = flight
                .call("k", || {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .unwrap();
            assert_eq!(value, 7);
        }

        // The call is unpublished on return, so nothing was memoized.
        assert_eq!(executions.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn waiters_share_the_owners_error() {
        let flight: Arc<Flight<String>> = Arc::new(Flight::new());
        let start = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    flight.call("bad", || {
                        thread::sleep(Duration::from_millis(100));
                        Err(CacheError::NotFound("bad".to_string()))
                    })
                })
            })
            .collect();

        for handle in handles {
            let err = handle.join().unwrap().unwrap_err();
            assert!(err.is_not_found());
        }
    }
}
