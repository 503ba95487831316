//! The isolated test execution context.
//!
//! [`TestCtx`] wraps a parent reporting target and runs a test body on its
//! own thread with an independent deadline, cancellation, and
//! expected-outcome semantics:
//!
//! - The body races a deadline derived from the nearest enclosing target;
//!   expiry forces a fatal failure with a fixed diagnostic instead of
//!   waiting out the body.
//! - Failures are interpreted against an [`Expectation`]: an
//!   expected-success context forwards them verbatim to the parent, an
//!   expected-failure context redirects them to a registered
//!   [`FailureSink`] and suppresses them from the parent.
//! - Abnormal termination (deadline, explicit abort, panic) force-drains
//!   every registered [`LenientCounter`], so a concurrent `wait()` caller
//!   never hangs on a test that already failed.
//!
//! Contexts nest: a `TestCtx` is itself a [`TestTarget`], and a child
//! constructed over one inherits its counter and deadline state by
//! reference.
//!
//! # Path-local aborts
//!
//! `fatal`, `fail_now` and `skip` unwind only the calling thread, via a
//! sentinel panic payload that [`run`](TestCtx::run) intercepts. Sibling
//! test paths continue unaffected. A process-wide panic-hook filter keeps
//! these routine unwinds out of stderr.

use crate::counter::LenientCounter;
use crate::error::Error;
use crate::report::{FailureSink, Synchronizer, TestTarget};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

/// Fixed diagnostic reported when a body loses the race with its deadline.
pub const DEADLINE_MESSAGE: &str = "test stopped by deadline";

/// The outcome a context expects from its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// The body should finish without recording a failure.
    Success,
    /// The body should record at least one failure.
    Failure,
}

/// Sentinel payload: unwind the current path after an abort was recorded.
pub(crate) struct PathAbort;

/// Sentinel payload: unwind the current path after a skip was recorded.
pub(crate) struct SkipSignal;

/// Unwinds the calling thread without touching any other path.
pub(crate) fn abort_current_path() -> ! {
    panic::panic_any(PathAbort)
}

/// Suppresses sentinel unwinds (and harness error payloads) in the global
/// panic hook, delegating everything else to the previously installed hook.
fn install_unwind_filter() {
    static FILTER: Once = Once::new();
    FILTER.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let payload = info.payload();
            if payload.is::<PathAbort>() || payload.is::<SkipSignal>() || payload.is::<Error>() {
                return;
            }
            previous(info);
        }));
    });
}

fn format_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else if let Some(err) = payload.downcast_ref::<Error>() {
        err.to_string()
    } else {
        "non-string panic payload".to_string()
    }
}

#[derive(Debug, Default)]
struct DeadlineState {
    /// Wait budget for the body, when set explicitly via `timeout`.
    budget: Option<Duration>,
    /// Accumulated `stop_early` margin; only ever shortens the budget.
    margin: Duration,
}

enum FailureKind<'a> {
    Error(&'a str),
    Fatal(&'a str),
    Fail,
    FailNow,
    Panic(&'a str),
}

/// A nested, cancellable, expected-outcome-aware test execution sandbox.
pub struct TestCtx {
    parent: Arc<dyn TestTarget>,
    name: Option<String>,
    expectation: Expectation,
    counter: Arc<LenientCounter>,
    extra_counters: Arc<Mutex<Vec<Arc<LenientCounter>>>>,
    deadline_state: Arc<Mutex<DeadlineState>>,
    sink: Mutex<Option<Arc<dyn FailureSink>>>,
    cleanups: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    failed: AtomicBool,
    aborted: AtomicBool,
    skipped: AtomicBool,
    parallel_marked: AtomicBool,
}

impl TestCtx {
    /// Creates a context over `parent` with the given expectation.
    ///
    /// When the parent is itself a `TestCtx`, the counter and deadline
    /// state are inherited by reference; otherwise fresh state is created
    /// and, if the parent exposes a synchronizer hook, the new counter is
    /// registered with it so the parent can drain it on abort.
    #[must_use]
    pub fn new(parent: Arc<dyn TestTarget>, expectation: Expectation) -> Arc<Self> {
        Self::build(parent, expectation, None)
    }

    /// Like [`new`](Self::new), but reporting under `name` instead of the
    /// parent's name.
    #[must_use]
    pub fn named(
        parent: Arc<dyn TestTarget>,
        expectation: Expectation,
        name: impl Into<String>,
    ) -> Arc<Self> {
        Self::build(parent, expectation, Some(name.into()))
    }

    fn build(
        parent: Arc<dyn TestTarget>,
        expectation: Expectation,
        name: Option<String>,
    ) -> Arc<Self> {
        let inherited = parent.as_ctx().map(|ctx| {
            (
                Arc::clone(&ctx.counter),
                Arc::clone(&ctx.extra_counters),
                Arc::clone(&ctx.deadline_state),
            )
        });
        let fresh = inherited.is_none();
        let (counter, extra_counters, deadline_state) = inherited.unwrap_or_else(|| {
            (
                Arc::new(LenientCounter::new()),
                Arc::new(Mutex::new(Vec::new())),
                Arc::new(Mutex::new(DeadlineState::default())),
            )
        });
        let ctx = Arc::new(Self {
            parent,
            name,
            expectation,
            counter,
            extra_counters,
            deadline_state,
            sink: Mutex::new(None),
            cleanups: Mutex::new(Vec::new()),
            failed: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            skipped: AtomicBool::new(false),
            parallel_marked: AtomicBool::new(false),
        });
        if fresh {
            if let Some(sync) = ctx.parent.synchronizer() {
                sync.register_counter(Arc::clone(&ctx.counter));
            }
        }
        ctx
    }

    /// Returns the expectation this context judges its body against.
    #[must_use]
    pub fn expectation(&self) -> Expectation {
        self.expectation
    }

    /// Returns the context's cooperation counter.
    ///
    /// The ordering algebra registers expected calls here; the context
    /// drains it on abort so no waiter outlives a failed test.
    #[must_use]
    pub fn counter(&self) -> Arc<LenientCounter> {
        Arc::clone(&self.counter)
    }

    /// Registers the delegate that receives failures when the expectation
    /// is [`Expectation::Failure`].
    pub fn set_failure_sink(&self, sink: Arc<dyn FailureSink>) {
        *self.sink.lock() = Some(sink);
    }

    /// Sets the wait budget for the body. Zero is a no-op.
    pub fn timeout(&self, budget: Duration) {
        if budget > Duration::ZERO {
            self.deadline_state.lock().budget = Some(budget);
        }
    }

    /// Shortens the effective wait budget by `margin`. Zero is a no-op;
    /// repeated calls compound. The budget is never extended.
    pub fn stop_early(&self, margin: Duration) {
        if margin > Duration::ZERO {
            let mut state = self.deadline_state.lock();
            state.margin += margin;
        }
    }

    /// Runs `body` on its own thread, racing the effective deadline, and
    /// returns the verdict: `true` iff the observed outcome matched the
    /// expectation (a skipped body always matches).
    ///
    /// With `parallel` set, the invocation is marked for parallel
    /// scheduling with the parent; duplicate markings are swallowed.
    ///
    /// On deadline expiry the context records a fatal failure with
    /// [`DEADLINE_MESSAGE`], drains its counters, and abandons the body:
    /// the body's thread may run to completion but its outcome is no
    /// longer observed.
    pub fn run<F>(self: &Arc<Self>, parallel: bool, body: F) -> bool
    where
        F: FnOnce(&TestCtx) + Send + 'static,
    {
        install_unwind_filter();
        if parallel {
            self.mark_parallel();
        }
        let wait = self.effective_wait();

        let (tx, rx) = mpsc::sync_channel::<()>(1);
        let body_ctx = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(format!("callseq::{}", self.name()))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&body_ctx)));
                if let Err(payload) = outcome {
                    if !payload.is::<PathAbort>() && !payload.is::<SkipSignal>() {
                        body_ctx.record_panic(&format_panic(payload.as_ref()));
                    }
                }
                let _ = tx.send(());
            })
            .expect("spawn test body thread");

        let completed = match wait {
            Some(limit) => rx.recv_timeout(limit).is_ok(),
            None => rx.recv().is_ok(),
        };
        if completed {
            let _ = handle.join();
        } else {
            self.deadline_failure(wait.unwrap_or_default());
        }
        self.finish()
    }

    /// Effective wait budget: the explicit budget if set, otherwise the
    /// remaining time under the nearest enclosing deadline, minus any
    /// accumulated `stop_early` margin.
    ///
    /// The state guard must not be held across `parent.deadline()`: a
    /// nested context shares this state with its parent, and the parent
    /// consults it too.
    fn effective_wait(&self) -> Option<Duration> {
        let (budget, margin) = {
            let state = self.deadline_state.lock();
            (state.budget, state.margin)
        };
        if let Some(budget) = budget {
            return Some(budget.saturating_sub(margin));
        }
        let remaining = self
            .parent
            .deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))?;
        // A context parent shares this state and has taken the margin
        // already; taking it again would compound per nesting level.
        if self.parent.as_ctx().is_some() {
            Some(remaining)
        } else {
            Some(remaining.saturating_sub(margin))
        }
    }

    fn mark_parallel(&self) {
        if !self.parallel_marked.swap(true, Ordering::SeqCst) {
            self.parent.parallel();
        }
    }

    fn drain_counters(&self) {
        self.counter.drain();
        for counter in self.extra_counters.lock().iter() {
            counter.drain();
        }
    }

    /// Routes a failure according to the expectation: forwarded verbatim
    /// to the parent on expected success, redirected to the sink (and
    /// suppressed from the parent) on expected failure.
    fn deliver(&self, failure: &FailureKind<'_>) {
        match self.expectation {
            Expectation::Success => match failure {
                FailureKind::Error(message) | FailureKind::Fatal(message) => {
                    self.parent.error(message);
                }
                FailureKind::Panic(payload) => {
                    self.parent.error(&format!("test panicked: {payload}"));
                }
                FailureKind::Fail | FailureKind::FailNow => self.parent.fail(),
            },
            Expectation::Failure => {
                let sink = self.sink.lock().clone();
                if let Some(sink) = sink {
                    match failure {
                        FailureKind::Error(message) => sink.error(message),
                        FailureKind::Fatal(message) => sink.fatal(message),
                        FailureKind::Fail => sink.fail(),
                        FailureKind::FailNow => sink.fail_now(),
                        FailureKind::Panic(payload) => sink.panic(payload),
                    }
                }
            }
        }
    }

    /// First-abort latch: returns true for exactly one caller.
    fn try_abort(&self) -> bool {
        self.aborted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn record_panic(&self, payload: &str) {
        if self.try_abort() {
            self.failed.store(true, Ordering::SeqCst);
            self.deliver(&FailureKind::Panic(payload));
            self.drain_counters();
        }
    }

    fn deadline_failure(&self, limit: Duration) {
        if self.try_abort() {
            self.failed.store(true, Ordering::SeqCst);
            let message = format!("{DEADLINE_MESSAGE} after {limit:?}");
            self.deliver(&FailureKind::Fatal(&message));
            self.drain_counters();
        }
    }

    /// Teardown: cleanups in reverse registration order, then the verdict.
    fn finish(&self) -> bool {
        let mut cleanups = std::mem::take(&mut *self.cleanups.lock());
        while let Some(cleanup) = cleanups.pop() {
            cleanup();
        }
        if self.skipped() {
            return true;
        }
        let failed = self.failed.load(Ordering::SeqCst);
        match (self.expectation, failed) {
            (Expectation::Success, false) | (Expectation::Failure, true) => true,
            (Expectation::Success, true) => {
                self.parent.error(&format!(
                    "test {}: expected success but a failure was recorded",
                    self.name()
                ));
                false
            }
            (Expectation::Failure, false) => {
                self.parent.error(&format!(
                    "test {}: expected failure but none was recorded",
                    self.name()
                ));
                false
            }
        }
    }
}

impl Synchronizer for TestCtx {
    fn register_counter(&self, counter: Arc<LenientCounter>) {
        self.extra_counters.lock().push(counter);
    }
}

impl TestTarget for TestCtx {
    fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.parent.name())
    }

    fn log(&self, message: &str) {
        self.parent.log(message);
    }

    fn error(&self, message: &str) {
        self.failed.store(true, Ordering::SeqCst);
        self.deliver(&FailureKind::Error(message));
    }

    fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
        self.deliver(&FailureKind::Fail);
    }

    fn fatal(&self, message: &str) {
        if self.try_abort() {
            self.failed.store(true, Ordering::SeqCst);
            self.deliver(&FailureKind::Fatal(message));
            self.drain_counters();
        }
        // Later callers on an already-finished path unwind silently.
        abort_current_path();
    }

    fn fail_now(&self) {
        if self.try_abort() {
            self.failed.store(true, Ordering::SeqCst);
            self.deliver(&FailureKind::FailNow);
            self.drain_counters();
        }
        abort_current_path();
    }

    fn skip(&self, message: &str) {
        self.skipped.store(true, Ordering::SeqCst);
        self.parent.log(message);
        panic::panic_any(SkipSignal);
    }

    fn skipped(&self) -> bool {
        self.skipped.load(Ordering::SeqCst)
    }

    fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    fn cleanup(&self, f: Box<dyn FnOnce() + Send>) {
        self.cleanups.lock().push(f);
    }

    fn parallel(&self) {
        self.mark_parallel();
    }

    fn helper(&self) {
        self.parent.helper();
    }

    fn deadline(&self) -> Option<Instant> {
        self.effective_wait().map(|budget| Instant::now() + budget)
    }

    fn synchronizer(&self) -> Option<&dyn Synchronizer> {
        Some(self)
    }

    fn as_ctx(&self) -> Option<&TestCtx> {
        Some(self)
    }
}
