//! callseq: a harness for verifying concurrent call behavior in tests.
//!
//! Given a set of expected calls on collaborator objects, callseq lets a
//! test author declare the required relative ordering of those calls with
//! a small composable algebra, and runs test bodies inside isolated,
//! cancellable execution contexts that know whether the test was expected
//! to succeed or fail.
//!
//! # The two halves
//!
//! - The **ordering algebra** ([`order`]) turns a nested specification of
//!   expected calls — [`chain`], [`parallel`], [`setup`], [`detach`],
//!   [`sub_range`] — into happens-after edges installed on the underlying
//!   [call handles](ExpectedCall). The external mocking engine enforces
//!   those edges; the harness never observes call timestamps itself. A
//!   [`LenientCounter`] tracks how many declared calls are still owed.
//! - The **isolated context** ([`TestCtx`]) runs a test body on its own
//!   thread with an independent deadline and an [`Expectation`], forwards
//!   or redirects failures accordingly, and force-drains registered
//!   counters on abort so no waiter hangs on a test that already failed.
//!
//! The two are coupled through the [`Synchronizer`] hook: the harness
//! registers its counter into the context, so an abnormal context
//! termination can never leave a parallel test blocked forever.
//!
//! # Example
//!
//! ```
//! use callseq::{chain, call, parallel, Expectation, Harness, RootTarget, ScriptEngine, TestCtx};
//! use std::sync::Arc;
//!
//! let mut harness = Harness::new();
//! let engine = ScriptEngine::new(&harness);
//! let open = engine.expect(&harness, "door.open");
//! let step_l = engine.expect(&harness, "step.left");
//! let step_r = engine.expect(&harness, "step.right");
//! let close = engine.expect(&harness, "door.close");
//!
//! // open first, both steps in either order, close last.
//! harness.declare(chain(vec![
//!     call(open),
//!     parallel(vec![call(step_l), call(step_r)]),
//!     call(close),
//! ]));
//!
//! let ctx = TestCtx::new(Arc::new(RootTarget::new("walkthrough")), Expectation::Success);
//! harness.bind(ctx.as_ref());
//!
//! let run_engine = engine.clone();
//! assert!(ctx.run(false, move |_t| {
//!     for label in ["door.open", "step.right", "step.left", "door.close"] {
//!         run_engine.invoke(label);
//!     }
//! }));
//! assert!(harness.await_calls().is_ok());
//! assert!(engine.is_clean());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod counter;
pub mod error;
pub mod event_log;
pub mod handle;
pub mod harness;
pub mod mock;
pub mod order;
pub mod registry;
pub mod report;
pub mod runner;
pub mod spec;

pub use config::HarnessConfig;
pub use context::{Expectation, TestCtx, DEADLINE_MESSAGE};
pub use counter::LenientCounter;
pub use error::{Error, ErrorKind};
pub use event_log::{EventLog, HarnessEvent, LogLevel};
pub use handle::{CallHandle, ExpectedCall};
pub use harness::Harness;
pub use mock::{ScriptEngine, ScriptedCall};
pub use order::{call, chain, detach, materialize, parallel, setup, sub_range, Frontier, SetupFn};
pub use registry::MockRegistry;
pub use report::{
    FailureSink, RecordingSink, RecordingTarget, RootTarget, SinkEvent, Synchronizer, TargetEvent,
    TestTarget,
};
pub use runner::{run_cases, run_cases_parallel, CaseSet};
pub use spec::{CallSpec, DetachMode};
