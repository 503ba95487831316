//! The abstract collaborator call handle.
//!
//! The harness does not implement mocking. It assumes an external mocking
//! engine whose expected-call objects can be told "you happen after that
//! one". [`ExpectedCall`] is that minimal surface; everything the ordering
//! algebra does reduces to `after` edges installed on these handles.
//!
//! Handle identity is `Arc` pointer identity: the same allocation is the
//! same call. The materializer uses this to skip self-edges.

use std::sync::Arc;

/// One expected invocation on a collaborator, as seen by the harness.
///
/// Implementations are provided by the mocking engine. The engine owns the
/// handle's invocation-count state; the harness only installs ordering
/// edges before execution begins and treats handles as read-only afterward.
pub trait ExpectedCall: Send + Sync + 'static {
    /// Declares that this call must not be observed before `other` has
    /// been consumed.
    ///
    /// Called once per edge during materialization. Engines must tolerate
    /// the same edge being declared more than once; re-slicing a chain
    /// with `sub_range` re-installs interior edges.
    fn after(&self, other: &CallHandle);

    /// Short human-readable label used in diagnostics and the event log.
    fn label(&self) -> String;
}

/// A shared reference to an expected call.
pub type CallHandle = Arc<dyn ExpectedCall>;

/// Returns true if both handles refer to the same expected call.
#[must_use]
pub fn same_call(a: &CallHandle, b: &CallHandle) -> bool {
    // Compare data pointers only: vtable pointers for the same impl may
    // differ across codegen units.
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl ExpectedCall for Probe {
        fn after(&self, _other: &CallHandle) {}

        fn label(&self) -> String {
            "probe".to_string()
        }
    }

    #[test]
    fn identity_is_per_allocation() {
        let a: CallHandle = Arc::new(Probe);
        let b: CallHandle = Arc::new(Probe);
        let a2 = Arc::clone(&a);
        assert!(same_call(&a, &a2));
        assert!(!same_call(&a, &b));
    }
}
