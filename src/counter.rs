//! Over-consumption-tolerant counting synchronization.
//!
//! [`LenientCounter`] tracks "expected but not yet observed" calls. It is a
//! semaphore-shaped counter with two deliberate departures from strict
//! semaphore discipline:
//!
//! - Driving the count below zero is absorbed (clamped back to zero), not
//!   treated as a programming error. Speculative test drivers intentionally
//!   explore call orders that do not match expectations; a strict counter
//!   would turn every exploratory mismatch into an unrelated crash instead
//!   of a reported ordering failure.
//! - A counter can be waited on repeatedly, including after it has fully
//!   drained. Re-waiting an already-completed counter is a no-op.
//!
//! The counter is an explicit state machine guarded by a mutex: negative
//! totals are clamped inside the guard, never recovered from a library
//! panic after the fact.
//!
//! # Example
//!
//! ```
//! use callseq::LenientCounter;
//!
//! let counter = LenientCounter::new();
//! counter.add(2);
//! counter.done();
//! counter.done();
//! counter.done(); // over-consumption: absorbed
//! counter.wait(); // returns immediately
//! assert_eq!(counter.owed(), 0);
//! ```

use crate::error::{Error, ErrorKind};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct CounterState {
    /// Number of declared calls not yet consumed. Never negative: attempted
    /// underflow is absorbed.
    owed: u64,
    /// Units absorbed because consumption outran declaration.
    absorbed: u64,
    /// Set by `drain`; further declarations are dropped so the counter can
    /// never re-arm after its owner aborted.
    drained: bool,
}

/// A saturating, recoverable counter for expected-call tracking.
#[derive(Debug)]
pub struct LenientCounter {
    state: Mutex<CounterState>,
    zero: Condvar,
    /// Lock-free shadow of the owed count for read-heavy diagnostics.
    owed_shadow: AtomicU64,
}

impl Default for LenientCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl LenientCounter {
    /// Creates a counter with nothing owed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CounterState {
                owed: 0,
                absorbed: 0,
                drained: false,
            }),
            zero: Condvar::new(),
            owed_shadow: AtomicU64::new(0),
        }
    }

    /// Returns the current owed count.
    #[must_use]
    pub fn owed(&self) -> u64 {
        // Relaxed: advisory diagnostic hint only. Waiters use the
        // mutex-protected path for correctness.
        self.owed_shadow.load(Ordering::Relaxed)
    }

    /// Returns how many consumption units were absorbed rather than applied.
    #[must_use]
    pub fn absorbed(&self) -> u64 {
        self.state.lock().absorbed
    }

    /// Moves the owed count by `delta`.
    ///
    /// A positive delta raises the count normally, except on a drained
    /// counter, where it is dropped. A non-positive delta consumes up to
    /// the owed count; any excess is absorbed rather than pushing the
    /// count below zero.
    ///
    /// Returns the owed count after the move.
    pub fn add(&self, delta: i64) -> u64 {
        let mut state = self.state.lock();
        if delta > 0 {
            if !state.drained {
                state.owed = state.owed.saturating_add(delta.unsigned_abs());
            }
        } else {
            let units = delta.unsigned_abs();
            let applied = state.owed.min(units);
            state.owed -= applied;
            state.absorbed = state.absorbed.saturating_add(units - applied);
        }
        let owed = state.owed;
        self.owed_shadow.store(owed, Ordering::Relaxed);
        if owed == 0 {
            self.zero.notify_all();
        }
        owed
    }

    /// Consumes one unit. Equivalent to `add(-1)`.
    pub fn done(&self) {
        self.add(-1);
    }

    /// Blocks the calling thread until the owed count reaches zero.
    ///
    /// A no-op when the counter is already drained. Waiting on the same
    /// counter from multiple threads, or repeatedly from one, is permitted.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while state.owed > 0 {
            self.zero.wait(&mut state);
        }
    }

    /// Like [`wait`](Self::wait), but gives up after `limit`.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::DeadlineExceeded` if the owed count is still
    /// positive when the limit elapses.
    pub fn wait_timeout(&self, limit: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + limit;
        let mut state = self.state.lock();
        while state.owed > 0 {
            if self.zero.wait_until(&mut state, deadline).timed_out() {
                return Err(Error::new(ErrorKind::DeadlineExceeded).with_message(format!(
                    "{} expected call(s) not observed within {limit:?}",
                    state.owed
                )));
            }
        }
        Ok(())
    }

    /// Forces the owed count to zero and releases every current and future
    /// waiter.
    ///
    /// This is the abort path: when an owning test has already failed, no
    /// caller may be left blocked on calls that will never arrive.
    /// Draining is sticky: declarations arriving afterward (an abandoned
    /// body may still be running) are dropped instead of re-arming the
    /// counter. Returns the count that was discarded.
    pub fn drain(&self) -> u64 {
        let mut state = self.state.lock();
        let discarded = state.owed;
        state.owed = 0;
        state.drained = true;
        self.owed_shadow.store(0, Ordering::Relaxed);
        self.zero.notify_all();
        discarded
    }
}
