//! The reporting-target surface.
//!
//! [`TestTarget`] is the minimal reporting interface the isolated context
//! both implements (so contexts nest as drop-in targets) and delegates to
//! (its own parent). [`Synchronizer`] is the optional hook through which a
//! target receives counters to drain on abort. [`FailureSink`] receives
//! failures redirected away from the parent when a context expects its
//! body to fail.
//!
//! [`RootTarget`] is the process-level root, and [`RecordingTarget`] /
//! [`RecordingSink`] are doubles for asserting on what a context reported.

use crate::context::{abort_current_path, TestCtx};
use crate::counter::LenientCounter;
use crate::event_log::{EventLog, HarnessEvent, LogLevel};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Traits
// ============================================================================

/// Receives counters that must be drained when the target aborts.
pub trait Synchronizer: Send + Sync {
    /// Registers a counter to force-drain on abnormal termination.
    fn register_counter(&self, counter: Arc<LenientCounter>);
}

/// The minimal reporting surface a test execution target exposes.
///
/// `fatal`, `fail_now` and `skip` abort the calling path of execution:
/// implementations unwind the calling thread after recording, and siblings
/// on other threads continue unaffected.
pub trait TestTarget: Send + Sync {
    /// Name of the test this target reports for.
    fn name(&self) -> String;

    /// Writes a diagnostic line.
    fn log(&self, message: &str);

    /// Records a failure and continues.
    fn error(&self, message: &str);

    /// Marks the target failed without a message.
    fn fail(&self);

    /// Records a failure and aborts the calling path.
    fn fatal(&self, message: &str);

    /// Marks the target failed and aborts the calling path.
    fn fail_now(&self);

    /// Marks the target skipped and aborts the calling path.
    fn skip(&self, message: &str);

    /// Returns true if the target was skipped.
    fn skipped(&self) -> bool;

    /// Returns true if a failure was recorded.
    fn failed(&self) -> bool;

    /// Registers a cleanup to run when the target finishes. Cleanups run
    /// in reverse registration order.
    fn cleanup(&self, f: Box<dyn FnOnce() + Send>);

    /// Marks the calling test for parallel scheduling. Defaults to a no-op.
    fn parallel(&self) {}

    /// Marks the calling function as a helper frame. Defaults to a no-op.
    fn helper(&self) {}

    /// Absolute deadline for tests under this target, if any.
    fn deadline(&self) -> Option<Instant> {
        None
    }

    /// Returns the synchronizer hook if this target exposes one.
    fn synchronizer(&self) -> Option<&dyn Synchronizer> {
        None
    }

    /// Returns this target as an isolated context, if it is one.
    ///
    /// Nested contexts use this to inherit their parent's counter and
    /// deadline state by reference instead of re-deriving them.
    fn as_ctx(&self) -> Option<&TestCtx> {
        None
    }
}

/// Receives failures redirected away from the parent when a context
/// expects its body to fail, so the test-of-the-test can assert on them.
pub trait FailureSink: Send + Sync {
    /// A continuing failure with a message.
    fn error(&self, message: &str);

    /// A path-aborting failure with a message.
    fn fatal(&self, message: &str);

    /// A continuing failure without a message.
    fn fail(&self);

    /// A path-aborting failure without a message.
    fn fail_now(&self);

    /// A body panic, with its formatted payload.
    fn panic(&self, payload: &str);
}

// ============================================================================
// RootTarget
// ============================================================================

/// Process-level root reporting target.
///
/// Records failures into its event log and a failed latch; callers assert
/// on [`TestCtx::run`](crate::TestCtx::run)'s verdict. Cleanups run when
/// the target is dropped.
pub struct RootTarget {
    name: String,
    log: Arc<EventLog>,
    deadline: Option<Instant>,
    failed: AtomicBool,
    skipped: AtomicBool,
    cleanups: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl RootTarget {
    /// Creates a root target with the given test name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log: Arc::new(EventLog::new(LogLevel::from_env())),
            deadline: None,
            failed: AtomicBool::new(false),
            skipped: AtomicBool::new(false),
            cleanups: Mutex::new(Vec::new()),
        }
    }

    /// Bounds every test under this root to `limit` from now.
    #[must_use]
    pub fn with_deadline(mut self, limit: Duration) -> Self {
        self.deadline = Some(Instant::now() + limit);
        self
    }

    /// Shares the given event log instead of creating one.
    #[must_use]
    pub fn with_event_log(mut self, log: Arc<EventLog>) -> Self {
        self.log = log;
        self
    }

    /// Returns the event log failures and diagnostics are recorded into.
    #[must_use]
    pub fn event_log(&self) -> Arc<EventLog> {
        Arc::clone(&self.log)
    }

    fn run_cleanups(&self) {
        let mut cleanups = std::mem::take(&mut *self.cleanups.lock());
        while let Some(cleanup) = cleanups.pop() {
            cleanup();
        }
    }
}

impl Drop for RootTarget {
    fn drop(&mut self) {
        self.run_cleanups();
    }
}

impl TestTarget for RootTarget {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn log(&self, message: &str) {
        self.log.record(HarnessEvent::Message {
            text: message.to_string(),
        });
    }

    fn error(&self, message: &str) {
        self.failed.store(true, Ordering::SeqCst);
        self.log.record(HarnessEvent::Failure {
            message: message.to_string(),
        });
    }

    fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    fn fatal(&self, message: &str) {
        self.error(message);
        abort_current_path();
    }

    fn fail_now(&self) {
        self.fail();
        abort_current_path();
    }

    fn skip(&self, message: &str) {
        self.skipped.store(true, Ordering::SeqCst);
        self.log(message);
        abort_current_path();
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

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

// ============================================================================
// Recording doubles
// ============================================================================

/// An interaction observed by a [`RecordingTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEvent {
    /// `log` was called.
    Log(String),
    /// `error` was called.
    Error(String),
    /// `fail` was called.
    Fail,
    /// `parallel` was called.
    Parallel,
    /// `cleanup` registered a closure.
    CleanupRegistered,
    /// A counter was registered through the synchronizer hook.
    CounterRegistered,
}

/// A reporting target that records every interaction for assertions.
///
/// Exposes the synchronizer hook so registration behavior is observable.
#[derive(Default)]
pub struct RecordingTarget {
    name: String,
    events: Mutex<Vec<TargetEvent>>,
    counters: Mutex<Vec<Arc<LenientCounter>>>,
    failed: AtomicBool,
    skipped: AtomicBool,
}

impl RecordingTarget {
    /// Creates a recording target with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the recorded interactions in order.
    #[must_use]
    pub fn events(&self) -> Vec<TargetEvent> {
        self.events.lock().clone()
    }

    /// Returns the messages of recorded `error` calls, in order.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TargetEvent::Error(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the counters registered through the synchronizer hook.
    #[must_use]
    pub fn registered_counters(&self) -> Vec<Arc<LenientCounter>> {
        self.counters.lock().clone()
    }

    fn record(&self, event: TargetEvent) {
        self.events.lock().push(event);
    }
}

impl Synchronizer for RecordingTarget {
    fn register_counter(&self, counter: Arc<LenientCounter>) {
        self.counters.lock().push(counter);
        self.record(TargetEvent::CounterRegistered);
    }
}

impl TestTarget for RecordingTarget {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn log(&self, message: &str) {
        self.record(TargetEvent::Log(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.failed.store(true, Ordering::SeqCst);
        self.record(TargetEvent::Error(message.to_string()));
    }

    fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
        self.record(TargetEvent::Fail);
    }

    fn fatal(&self, message: &str) {
        self.error(message);
        abort_current_path();
    }

    fn fail_now(&self) {
        self.fail();
        abort_current_path();
    }

    fn skip(&self, message: &str) {
        self.skipped.store(true, Ordering::SeqCst);
        self.record(TargetEvent::Log(message.to_string()));
        abort_current_path();
    }

    fn skipped(&self) -> bool {
        self.skipped.load(Ordering::SeqCst)
    }

    fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    fn cleanup(&self, _f: Box<dyn FnOnce() + Send>) {
        self.record(TargetEvent::CleanupRegistered);
    }

    fn parallel(&self) {
        self.record(TargetEvent::Parallel);
    }

    fn synchronizer(&self) -> Option<&dyn Synchronizer> {
        Some(self)
    }
}

/// A delivery observed by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// `error` delivery.
    Error(String),
    /// `fatal` delivery.
    Fatal(String),
    /// `fail` delivery.
    Fail,
    /// `fail_now` delivery.
    FailNow,
    /// `panic` delivery.
    Panic(String),
}

/// A failure sink that records every delivery for assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded deliveries in order.
    #[must_use]
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Returns the messages of all deliveries that carried one.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Error(m) | SinkEvent::Fatal(m) | SinkEvent::Panic(m) => Some(m.clone()),
                SinkEvent::Fail | SinkEvent::FailNow => None,
            })
            .collect()
    }
}

impl FailureSink for RecordingSink {
    fn error(&self, message: &str) {
        self.events.lock().push(SinkEvent::Error(message.to_string()));
    }

    fn fatal(&self, message: &str) {
        self.events.lock().push(SinkEvent::Fatal(message.to_string()));
    }

    fn fail(&self) {
        self.events.lock().push(SinkEvent::Fail);
    }

    fn fail_now(&self) {
        self.events.lock().push(SinkEvent::FailNow);
    }

    fn panic(&self, payload: &str) {
        self.events.lock().push(SinkEvent::Panic(payload.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_target_records_failures() {
        let root = RootTarget::new("root");
        root.error("first");
        root.error("second");
        assert!(root.failed());
        let events = root.event_log().events();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn root_target_cleanups_run_in_reverse() {
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let root = RootTarget::new("root");
            for tag in ["a", "b", "c"] {
                let order = Arc::clone(&order);
                root.cleanup(Box::new(move || order.lock().push(tag)));
            }
        }
        assert_eq!(*order.lock(), ["c", "b", "a"]);
    }

    #[test]
    fn recording_target_observes_synchronizer() {
        let target = RecordingTarget::new("probe");
        let counter = Arc::new(LenientCounter::new());
        target
            .synchronizer()
            .expect("recording target exposes a synchronizer")
            .register_counter(counter);
        assert_eq!(target.registered_counters().len(), 1);
        assert_eq!(target.events(), [TargetEvent::CounterRegistered]);
    }
}
