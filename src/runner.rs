//! Parameterized dispatch of named test cases into contexts.
//!
//! Thin orchestration over [`TestCtx`]: a [`CaseSet`] names parameter
//! values, and [`run_cases`] / [`run_cases_parallel`] run the body once
//! per case, each inside its own nested context named `parent/case`.
//!
//! # Example
//!
//! ```
//! use callseq::{run_cases, CaseSet, Expectation, RecordingTarget, TestTarget};
//! use std::sync::Arc;
//!
//! let parent = Arc::new(RecordingTarget::new("doors"));
//! let cases = CaseSet::new()
//!     .case("front", 1_u32)
//!     .case("back", 2_u32);
//! let all_passed = run_cases(
//!     &(parent as Arc<dyn callseq::TestTarget>),
//!     Expectation::Success,
//!     cases,
//!     |t, hinges| {
//!         if *hinges == 0 {
//!             t.error("a door needs hinges");
//!         }
//!     },
//! );
//! assert!(all_passed);
//! ```

use crate::context::{Expectation, TestCtx};
use crate::report::TestTarget;
use std::sync::Arc;
use std::thread;

/// A named set of parameter values to dispatch as individual cases.
#[derive(Debug, Clone, Default)]
pub struct CaseSet<P> {
    cases: Vec<(String, P)>,
}

impl<P> CaseSet<P> {
    /// Creates an empty case set.
    #[must_use]
    pub fn new() -> Self {
        Self { cases: Vec::new() }
    }

    /// Adds a named case.
    #[must_use]
    pub fn case(mut self, name: impl Into<String>, params: P) -> Self {
        self.cases.push((name.into(), params));
        self
    }

    /// Number of cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns true if no cases were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

fn case_ctx(
    parent: &Arc<dyn TestTarget>,
    expectation: Expectation,
    name: &str,
) -> Arc<TestCtx> {
    TestCtx::named(
        Arc::clone(parent),
        expectation,
        format!("{}/{}", parent.name(), name),
    )
}

/// Runs every case sequentially in its own nested context.
///
/// Returns `true` iff every case verdict matched the expectation.
pub fn run_cases<P, F>(
    parent: &Arc<dyn TestTarget>,
    expectation: Expectation,
    cases: CaseSet<P>,
    body: F,
) -> bool
where
    P: Send + 'static,
    F: Fn(&TestCtx, &P) + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let mut all_passed = true;
    for (name, params) in cases.cases {
        let ctx = case_ctx(parent, expectation, &name);
        let body = Arc::clone(&body);
        all_passed &= ctx.run(false, move |t| body(t, &params));
    }
    all_passed
}

/// Runs every case in its own thread and nested context, marking each for
/// parallel scheduling with the parent.
///
/// Returns `true` iff every case verdict matched the expectation.
pub fn run_cases_parallel<P, F>(
    parent: &Arc<dyn TestTarget>,
    expectation: Expectation,
    cases: CaseSet<P>,
    body: F,
) -> bool
where
    P: Send + 'static,
    F: Fn(&TestCtx, &P) + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let mut handles = Vec::with_capacity(cases.len());
    for (name, params) in cases.cases {
        let ctx = case_ctx(parent, expectation, &name);
        let body = Arc::clone(&body);
        handles.push(thread::spawn(move || {
            ctx.run(true, move |t| body(t, &params))
        }));
    }
    handles
        .into_iter()
        .all(|handle| handle.join().unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{RecordingTarget, TargetEvent};

    #[test]
    fn failing_case_is_named_in_the_report() {
        let parent = Arc::new(RecordingTarget::new("gates"));
        let target: Arc<dyn TestTarget> = Arc::clone(&parent) as Arc<dyn TestTarget>;
        let cases = CaseSet::new().case("sound", 0_u32).case("broken", 7_u32);
        let all_passed = run_cases(&target, Expectation::Success, cases, |t, weight| {
            if *weight > 5 {
                t.error("gate too heavy");
            }
        });
        assert!(!all_passed);
        let errors = parent.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "gate too heavy");
        assert!(errors[1].contains("gates/broken"));
    }

    #[test]
    fn parallel_cases_all_report() {
        let parent = Arc::new(RecordingTarget::new("locks"));
        let target: Arc<dyn TestTarget> = Arc::clone(&parent) as Arc<dyn TestTarget>;
        let cases = CaseSet::new()
            .case("one", 1_u32)
            .case("two", 2_u32)
            .case("three", 3_u32);
        let all_passed = run_cases_parallel(&target, Expectation::Success, cases, |_t, _p| {});
        assert!(all_passed);
        let parallel_marks = parent
            .events()
            .iter()
            .filter(|event| **event == TargetEvent::Parallel)
            .count();
        assert_eq!(parallel_marks, 3);
    }

    #[test]
    fn empty_case_set_passes() {
        let parent = Arc::new(RecordingTarget::new("empty"));
        let target: Arc<dyn TestTarget> = parent as Arc<dyn TestTarget>;
        let cases: CaseSet<u32> = CaseSet::new();
        assert!(run_cases(&target, Expectation::Success, cases, |_t, _p| {}));
    }
}
