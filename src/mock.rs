//! A minimal scripted collaborator for exercising the harness.
//!
//! The harness does not ship a mocking library; it installs edges on
//! whatever implements [`ExpectedCall`]. [`ScriptEngine`] is the smallest
//! engine honoring that contract: it remembers installed edges, records
//! every invocation, flags out-of-order and unexpected calls as
//! violations, and consumes the harness counter on each invocation. The
//! crate's own ordering fixtures run against it; it is test support, not a
//! mocking library.
//!
//! The engine is deliberately lenient at execution time: a violating call
//! is recorded and still consumed, so a mismatched exploration surfaces as
//! a reported violation instead of a hung counter.

use crate::counter::LenientCounter;
use crate::handle::{CallHandle, ExpectedCall};
use crate::harness::Harness;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Default)]
struct EngineState {
    /// Installed edges as (predecessor, successor) label pairs.
    edges: Vec<(String, String)>,
    known: BTreeSet<String>,
    completed: BTreeSet<String>,
    observed: Vec<String>,
    violations: Vec<String>,
}

struct EngineInner {
    counter: Arc<LenientCounter>,
    state: Mutex<EngineState>,
}

/// An in-memory mock engine that enforces declared ordering edges.
#[derive(Clone)]
pub struct ScriptEngine {
    inner: Arc<EngineInner>,
}

impl ScriptEngine {
    /// Creates an engine consuming the given harness's counter.
    #[must_use]
    pub fn new(harness: &Harness) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                counter: harness.counter(),
                state: Mutex::new(EngineState::default()),
            }),
        }
    }

    /// Declares an expected call with a unique label and registers it with
    /// the harness.
    ///
    /// # Panics
    ///
    /// Panics if `label` was already declared on this engine.
    #[must_use]
    pub fn expect(&self, harness: &Harness, label: &str) -> CallHandle {
        {
            let mut state = self.inner.state.lock();
            assert!(
                state.known.insert(label.to_string()),
                "duplicate expected call label: {label}"
            );
        }
        let handle: CallHandle = Arc::new(ScriptedCall {
            label: label.to_string(),
            engine: Arc::clone(&self.inner),
        });
        harness.expect_call(&handle);
        handle
    }

    /// Observes an invocation of `label`, checking it against the
    /// installed edges and consuming one counter unit.
    pub fn invoke(&self, label: &str) {
        {
            let mut state = self.inner.state.lock();
            state.observed.push(label.to_string());
            if state.known.contains(label) {
                let out_of_order: Vec<String> = state
                    .edges
                    .iter()
                    .filter(|(predecessor, successor)| {
                        successor == label && !state.completed.contains(predecessor)
                    })
                    .map(|(predecessor, _)| predecessor.clone())
                    .collect();
                for predecessor in out_of_order {
                    state
                        .violations
                        .push(format!("out-of-order call: {label} before {predecessor}"));
                }
                state.completed.insert(label.to_string());
            } else {
                state.violations.push(format!("unexpected call: {label}"));
            }
        }
        self.inner.counter.done();
    }

    /// Returns the recorded violations in detection order.
    #[must_use]
    pub fn violations(&self) -> Vec<String> {
        self.inner.state.lock().violations.clone()
    }

    /// Returns every observed invocation in order.
    #[must_use]
    pub fn observed(&self) -> Vec<String> {
        self.inner.state.lock().observed.clone()
    }

    /// Returns the installed edges as (predecessor, successor) pairs.
    #[must_use]
    pub fn edges(&self) -> Vec<(String, String)> {
        self.inner.state.lock().edges.clone()
    }

    /// Returns true if no violation was detected.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.inner.state.lock().violations.is_empty()
    }
}

/// One expected invocation scripted on a [`ScriptEngine`].
pub struct ScriptedCall {
    label: String,
    engine: Arc<EngineInner>,
}

impl ExpectedCall for ScriptedCall {
    fn after(&self, other: &CallHandle) {
        let mut state = self.engine.state.lock();
        let edge = (other.label(), self.label.clone());
        // Re-slicing re-installs interior edges; keep one copy.
        if !state.edges.contains(&edge) {
            state.edges.push(edge);
        }
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}
