//! The harness instance tying the core together.
//!
//! A [`Harness`] owns the [`LenientCounter`] tracking expected calls, the
//! per-harness [`MockRegistry`], and the [`EventLog`]. Test setup flows
//! through it: setup functions are evaluated against the harness,
//! [`declare`](Harness::declare) materializes the resulting specification,
//! and [`bind`](Harness::bind) hands the counter to an isolated context so
//! an aborting test can never strand a waiter.
//!
//! # Typical flow
//!
//! ```
//! use callseq::{chain, call, Expectation, Harness, RootTarget, TestCtx};
//! use std::sync::Arc;
//!
//! let mut harness = Harness::new();
//! let engine = callseq::ScriptEngine::new(&harness);
//! let first = engine.expect(&harness, "cache.load");
//! let second = engine.expect(&harness, "cache.store");
//! harness.declare(chain(vec![call(first), call(second)]));
//!
//! let ctx = TestCtx::new(Arc::new(RootTarget::new("flow")), Expectation::Success);
//! harness.bind(ctx.as_ref());
//!
//! let run_engine = engine.clone();
//! let passed = ctx.run(false, move |_t| {
//!     run_engine.invoke("cache.load");
//!     run_engine.invoke("cache.store");
//! });
//! assert!(passed);
//! assert!(harness.await_calls().is_ok());
//! ```

use crate::config::HarnessConfig;
use crate::counter::LenientCounter;
use crate::error::Error;
use crate::event_log::{EventLog, HarnessEvent, LogLevel};
use crate::handle::CallHandle;
use crate::order::{materialize, Frontier, SetupFn};
use crate::registry::MockRegistry;
use crate::report::TestTarget;
use crate::spec::CallSpec;
use std::sync::Arc;
use std::time::Duration;

/// One harness instance: counter, registry, event log, configuration.
///
/// Created per test (or per group of tests sharing mocks); destroyed with
/// the test.
pub struct Harness {
    config: HarnessConfig,
    counter: Arc<LenientCounter>,
    registry: MockRegistry,
    log: Arc<EventLog>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Creates a harness with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::default())
    }

    /// Creates a harness with an explicit configuration.
    #[must_use]
    pub fn with_config(config: HarnessConfig) -> Self {
        // With capture disabled only failures are retained.
        let level = if config.capture_events {
            config.log_level
        } else {
            LogLevel::Error
        };
        Self {
            counter: Arc::new(LenientCounter::new()),
            registry: MockRegistry::new(),
            log: Arc::new(EventLog::new(level)),
            config,
        }
    }

    /// Returns the harness configuration.
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Returns the counter tracking expected-but-unobserved calls.
    #[must_use]
    pub fn counter(&self) -> Arc<LenientCounter> {
        Arc::clone(&self.counter)
    }

    /// Returns the harness event log.
    #[must_use]
    pub fn event_log(&self) -> Arc<EventLog> {
        Arc::clone(&self.log)
    }

    /// Returns the per-harness mock singleton of type `T`, creating it on
    /// first use.
    pub fn mock<T, F>(&self, make: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.registry.get_or_create(make)
    }

    /// Records `handle` as one more expected call.
    pub fn expect_call(&self, handle: &CallHandle) {
        let owed = self.counter.add(1);
        self.log.record(HarnessEvent::CallDeclared {
            label: handle.label(),
        });
        self.log.record(HarnessEvent::CounterAdd { delta: 1, owed });
    }

    /// Records consumption of one expected call.
    pub fn call_consumed(&self) {
        let owed = self.counter.add(-1);
        self.log.record(HarnessEvent::CounterAdd { delta: -1, owed });
    }

    /// Evaluates a setup function and materializes the resulting
    /// specification against an empty frontier, fixing its ordering.
    pub fn declare(&mut self, setup: SetupFn) {
        let spec = setup(self);
        self.materialize(&spec, Frontier::new());
    }

    /// Materializes `spec` against `incoming`, returning the outgoing
    /// frontier. Exposed for combinators that re-compose partial results.
    pub fn materialize(&self, spec: &CallSpec, incoming: Frontier) -> Frontier {
        let frontier_in = incoming.len();
        let outgoing = materialize(&self.log, spec, incoming);
        self.log.record(HarnessEvent::Materialized {
            kind: spec.kind(),
            frontier_in,
            frontier_out: outgoing.len(),
        });
        outgoing
    }

    /// Registers the harness counter with `target`'s synchronizer hook, if
    /// it exposes one, so the target drains it on abort.
    pub fn bind(&self, target: &dyn TestTarget) {
        if let Some(sync) = target.synchronizer() {
            sync.register_counter(self.counter());
        }
    }

    /// Blocks until every declared call has been consumed.
    ///
    /// Bounded by the configured default deadline, when one is set.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::DeadlineExceeded` if the configured bound
    /// elapses with calls still outstanding.
    pub fn await_calls(&self) -> Result<(), Error> {
        match self.config.default_deadline {
            Some(limit) => self.await_calls_within(limit),
            None => {
                self.counter.wait();
                Ok(())
            }
        }
    }

    /// Blocks until every declared call has been consumed, or `limit`
    /// elapses.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::DeadlineExceeded` on expiry.
    pub fn await_calls_within(&self, limit: Duration) -> Result<(), Error> {
        self.counter.wait_timeout(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct Turnstile;

    #[test]
    fn mock_singletons_are_per_harness() {
        let first = Harness::new();
        let second = Harness::new();
        let a = first.mock(|| Turnstile);
        let b = first.mock(|| Turnstile);
        let c = second.mock(|| Turnstile);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn await_calls_respects_configured_deadline() {
        let harness = Harness::with_config(
            HarnessConfig::new().with_default_deadline(Duration::from_millis(10)),
        );
        harness.counter().add(1);
        let err = harness.await_calls().expect_err("nothing consumes the call");
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[test]
    fn capture_toggle_quiets_the_log() {
        let harness = Harness::with_config(HarnessConfig::new().without_capture());
        assert_eq!(harness.event_log().level(), LogLevel::Error);
    }
}
