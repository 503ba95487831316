//! The ordering constraint algebra.
//!
//! Test authors compose *setup functions* — closures from a harness to a
//! [`CallSpec`] — with the combinators in this module, then hand the result
//! to [`Harness::declare`](crate::Harness::declare). Declaration
//! materializes the tree: every declared relation becomes a happens-after
//! edge installed on the underlying call handles, and the external mocking
//! engine enforces those edges at execution time. The harness itself never
//! observes call timestamps.
//!
//! # The Frontier
//!
//! Materialization threads a [`Frontier`] through the tree: the set of most
//! recently materialized handles that whatever comes next must follow. Each
//! variant transforms the frontier its own way; see [`materialize`].
//!
//! # Example
//!
//! ```
//! use callseq::{chain, call, parallel, Harness, ScriptEngine};
//!
//! let mut harness = Harness::new();
//! let engine = ScriptEngine::new(&harness);
//! let open = engine.expect(&harness, "door.open");
//! let knock = engine.expect(&harness, "door.knock");
//! let close = engine.expect(&harness, "door.close");
//!
//! // knock, then open, then close.
//! harness.declare(chain(vec![call(knock), call(open), call(close)]));
//! ```

use crate::error::{Error, ErrorKind};
use crate::event_log::{EventLog, HarnessEvent};
use crate::handle::{same_call, CallHandle};
use crate::harness::Harness;
use crate::spec::{CallSpec, DetachMode};
use smallvec::SmallVec;

/// The set of most-recently-materialized handles that the next declared
/// handle(s) must follow.
///
/// Ephemeral: produced and consumed only during materialization.
pub type Frontier = SmallVec<[CallHandle; 4]>;

/// A deferred piece of test setup: evaluated against a harness, yields a
/// call specification.
pub type SetupFn = Box<dyn FnOnce(&mut Harness) -> CallSpec + Send>;

/// Leaf setup function wrapping a single call handle.
#[must_use]
pub fn call(handle: CallHandle) -> SetupFn {
    Box::new(move |_harness| CallSpec::Single(handle))
}

/// Declares `parts` in a total order: each part happens fully after the
/// previous one.
#[must_use]
pub fn chain(parts: Vec<SetupFn>) -> SetupFn {
    Box::new(move |harness| {
        CallSpec::Chain(parts.into_iter().map(|part| part(harness)).collect())
    })
}

/// Declares `parts` as mutually unordered; each is still ordered against
/// the group's external neighbors.
#[must_use]
pub fn parallel(parts: Vec<SetupFn>) -> SetupFn {
    Box::new(move |harness| {
        CallSpec::Parallel(parts.into_iter().map(|part| part(harness)).collect())
    })
}

/// Declares `parts` with no required relation to any call outside this
/// group, and none between the group's top-level elements either.
///
/// Each part is evaluated and immediately materialized with its top-level
/// elements fully detached: a part returning `chain(a, b)` keeps nothing —
/// its elements `a` and `b` are detached from each other as well as from
/// the surroundings, while a part returning `chain(chain(a, b), c)` keeps
/// the interior `a` before `b` order. Returns `Empty`, so the group cannot
/// be chained further.
#[must_use]
pub fn setup(parts: Vec<SetupFn>) -> SetupFn {
    Box::new(move |harness| {
        for part in parts {
            let spec = detach_elements(part(harness));
            harness.materialize(&spec, Frontier::new());
        }
        CallSpec::Empty
    })
}

/// Wraps the result of `part` in the requested detachment.
/// `DetachMode::None` is a pass-through.
#[must_use]
pub fn detach(mode: DetachMode, part: SetupFn) -> SetupFn {
    Box::new(move |harness| {
        let spec = part(harness);
        match mode {
            DetachMode::None => spec,
            DetachMode::Head => CallSpec::DetachHead(vec![spec]),
            DetachMode::Tail => CallSpec::DetachTail(vec![spec]),
            DetachMode::Both => CallSpec::DetachBoth(vec![spec]),
        }
    })
}

/// Materializes the result of `part` (fixing its internal ordering),
/// flattens the top-level group, and extracts the inclusive sub-range
/// `[from, to]` as a new specification of the same top-level kind.
///
/// Negative indices count from the end; `from > to` is normalized by
/// swapping; out-of-range indices clamp. A sub-range of one element
/// becomes `Single`. `Empty` and `Single` inputs pass through unchanged.
///
/// # Panics
///
/// Extracting from a `Detach*` result is a usage error and aborts the
/// calling path: detached groups cannot be safely re-sliced because their
/// edges are not part of the returned frontier.
#[must_use]
pub fn sub_range(from: isize, to: isize, part: SetupFn) -> SetupFn {
    Box::new(move |harness| {
        let spec = part(harness);
        if spec.is_detached() {
            std::panic::panic_any(
                Error::new(ErrorKind::SubRangeOnDetached)
                    .with_message(format!("cannot slice [{from}, {to}] out of {}", spec.kind())),
            );
        }
        match &spec {
            CallSpec::Empty | CallSpec::Single(_) => spec,
            _ => {
                harness.materialize(&spec, Frontier::new());
                let handles = spec.flatten();
                if handles.is_empty() {
                    return CallSpec::Empty;
                }
                let (lo, hi) = resolve_range(from, to, handles.len());
                let picked = &handles[lo..=hi];
                if picked.len() == 1 {
                    return CallSpec::Single(picked[0].clone());
                }
                let singles: Vec<CallSpec> =
                    picked.iter().cloned().map(CallSpec::Single).collect();
                match spec {
                    CallSpec::Parallel(_) => CallSpec::Parallel(singles),
                    _ => CallSpec::Chain(singles),
                }
            }
        }
    })
}

/// Resolves an inclusive `[from, to]` index pair against a list of `len`
/// elements.
///
/// Negative index `i` resolves to `len + i`, clamped to 0 on underflow;
/// positive overflow clamps to the last element; a reversed pair swaps.
#[must_use]
pub(crate) fn resolve_range(from: isize, to: isize, len: usize) -> (usize, usize) {
    debug_assert!(len > 0, "cannot resolve a range over an empty list");
    let clamp = |index: isize| -> usize {
        let len = isize::try_from(len).unwrap_or(isize::MAX);
        let resolved = if index < 0 { index + len } else { index };
        usize::try_from(resolved.clamp(0, len - 1)).unwrap_or(0)
    };
    let (lo, hi) = (clamp(from), clamp(to));
    if lo <= hi { (lo, hi) } else { (hi, lo) }
}

/// Re-tags a specification so its top-level elements are mutually detached.
fn detach_elements(spec: CallSpec) -> CallSpec {
    match spec {
        CallSpec::Chain(parts) | CallSpec::Parallel(parts) => CallSpec::DetachBoth(parts),
        other => CallSpec::DetachBoth(vec![other]),
    }
}

/// Installs the happens-after edges declared by `spec`, given the incoming
/// frontier, and returns the outgoing frontier.
///
/// This is the core algorithmic contract of the harness:
///
/// - `Single(h)`: `h` happens after every frontier handle (self-edges are
///   skipped); the new frontier is `{h}`.
/// - `Chain`: folds, each element following the previous one's frontier.
/// - `Parallel`: every element follows the *same* incoming frontier; the
///   outgoing frontier is the union of the branches'.
/// - `DetachHead`: elements start from an empty frontier; the outgoing
///   frontier is the incoming one plus the elements' — successors see both.
/// - `DetachTail`: elements follow the incoming frontier but never become
///   predecessors; the frontier passes through unchanged.
/// - `DetachBoth`: total isolation; empty frontier in, pass-through out.
/// - `Empty`: pass-through.
pub fn materialize(log: &EventLog, spec: &CallSpec, incoming: Frontier) -> Frontier {
    match spec {
        CallSpec::Empty => incoming,
        CallSpec::Single(handle) => {
            for predecessor in &incoming {
                if same_call(predecessor, handle) {
                    continue;
                }
                handle.after(predecessor);
                log.record(HarnessEvent::EdgeInstalled {
                    predecessor: predecessor.label(),
                    successor: handle.label(),
                });
            }
            let mut frontier = Frontier::new();
            frontier.push(handle.clone());
            frontier
        }
        CallSpec::Chain(parts) => parts
            .iter()
            .fold(incoming, |frontier, part| materialize(log, part, frontier)),
        CallSpec::Parallel(parts) => {
            let mut outgoing = Frontier::new();
            for part in parts {
                let branch = materialize(log, part, incoming.clone());
                extend_unique(&mut outgoing, branch);
            }
            outgoing
        }
        CallSpec::DetachHead(parts) => {
            let mut outgoing = incoming;
            for part in parts {
                let branch = materialize(log, part, Frontier::new());
                extend_unique(&mut outgoing, branch);
            }
            outgoing
        }
        CallSpec::DetachTail(parts) => {
            for part in parts {
                materialize(log, part, incoming.clone());
            }
            incoming
        }
        CallSpec::DetachBoth(parts) => {
            for part in parts {
                materialize(log, part, Frontier::new());
            }
            incoming
        }
    }
}

fn extend_unique(frontier: &mut Frontier, branch: Frontier) {
    for handle in branch {
        if !frontier.iter().any(|present| same_call(present, &handle)) {
            frontier.push(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::LogLevel;
    use crate::handle::ExpectedCall;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records installed edges instead of enforcing them.
    struct Probe {
        label: &'static str,
        edges: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ExpectedCall for Probe {
        fn after(&self, other: &CallHandle) {
            self.edges
                .lock()
                .push((other.label(), self.label.to_string()));
        }

        fn label(&self) -> String {
            self.label.to_string()
        }
    }

    struct Rig {
        edges: Arc<Mutex<Vec<(String, String)>>>,
        log: EventLog,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                edges: Arc::new(Mutex::new(Vec::new())),
                log: EventLog::new(LogLevel::Trace),
            }
        }

        fn probe(&self, label: &'static str) -> CallHandle {
            Arc::new(Probe {
                label,
                edges: Arc::clone(&self.edges),
            })
        }

        fn edges(&self) -> Vec<(String, String)> {
            self.edges.lock().clone()
        }
    }

    fn edge(before: &str, after: &str) -> (String, String) {
        (before.to_string(), after.to_string())
    }

    #[test]
    fn chain_installs_total_order() {
        let rig = Rig::new();
        let spec = CallSpec::Chain(vec![
            CallSpec::Single(rig.probe("a")),
            CallSpec::Single(rig.probe("b")),
            CallSpec::Single(rig.probe("c")),
        ]);
        let out = materialize(&rig.log, &spec, Frontier::new());
        assert_eq!(rig.edges(), vec![edge("a", "b"), edge("b", "c")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label(), "c");
    }

    #[test]
    fn parallel_branches_share_incoming_frontier() {
        let rig = Rig::new();
        let x = rig.probe("x");
        let spec = CallSpec::Chain(vec![
            CallSpec::Single(x),
            CallSpec::Parallel(vec![
                CallSpec::Single(rig.probe("a")),
                CallSpec::Single(rig.probe("b")),
            ]),
            CallSpec::Single(rig.probe("y")),
        ]);
        materialize(&rig.log, &spec, Frontier::new());
        assert_eq!(
            rig.edges(),
            vec![
                edge("x", "a"),
                edge("x", "b"),
                edge("a", "y"),
                edge("b", "y"),
            ]
        );
    }

    #[test]
    fn detach_head_keeps_incoming_and_adds_elements() {
        let rig = Rig::new();
        let spec = CallSpec::Chain(vec![
            CallSpec::Single(rig.probe("a")),
            CallSpec::DetachHead(vec![CallSpec::Single(rig.probe("g"))]),
            CallSpec::Single(rig.probe("z")),
        ]);
        materialize(&rig.log, &spec, Frontier::new());
        // g inherits nothing; z follows both a and g.
        assert_eq!(rig.edges(), vec![edge("a", "z"), edge("g", "z")]);
    }

    #[test]
    fn detach_tail_never_becomes_predecessor() {
        let rig = Rig::new();
        let spec = CallSpec::Chain(vec![
            CallSpec::Single(rig.probe("a")),
            CallSpec::DetachTail(vec![CallSpec::Single(rig.probe("g"))]),
            CallSpec::Single(rig.probe("z")),
        ]);
        materialize(&rig.log, &spec, Frontier::new());
        assert_eq!(rig.edges(), vec![edge("a", "g"), edge("a", "z")]);
    }

    #[test]
    fn detach_both_is_fully_isolated() {
        let rig = Rig::new();
        let spec = CallSpec::Chain(vec![
            CallSpec::Single(rig.probe("a")),
            CallSpec::DetachBoth(vec![CallSpec::Single(rig.probe("g"))]),
            CallSpec::Single(rig.probe("z")),
        ]);
        materialize(&rig.log, &spec, Frontier::new());
        assert_eq!(rig.edges(), vec![edge("a", "z")]);
    }

    #[test]
    fn self_edges_are_skipped() {
        let rig = Rig::new();
        let a = rig.probe("a");
        let spec = CallSpec::Single(Arc::clone(&a));
        let mut frontier = Frontier::new();
        frontier.push(a);
        materialize(&rig.log, &spec, frontier);
        assert!(rig.edges().is_empty());
    }

    #[test]
    fn empty_passes_frontier_through() {
        let rig = Rig::new();
        let a = rig.probe("a");
        let mut frontier = Frontier::new();
        frontier.push(a);
        let out = materialize(&rig.log, &CallSpec::Empty, frontier);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label(), "a");
    }

    #[test]
    fn parallel_union_dedupes_shared_handles() {
        let rig = Rig::new();
        let shared = rig.probe("s");
        let spec = CallSpec::Parallel(vec![
            CallSpec::Single(Arc::clone(&shared)),
            CallSpec::Single(shared),
        ]);
        let out = materialize(&rig.log, &spec, Frontier::new());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn resolve_range_table() {
        // (from, to, len) -> (lo, hi)
        let cases = [
            (0, 2, 5, (0, 2)),
            (-2, 1, 5, (1, 3)),
            (-1, -1, 5, (4, 4)),
            (3, 0, 5, (0, 3)),
            (-10, 10, 5, (0, 4)),
            (0, 0, 1, (0, 0)),
        ];
        for (from, to, len, want) in cases {
            assert_eq!(
                resolve_range(from, to, len),
                want,
                "resolve_range({from}, {to}, {len})"
            );
        }
    }
}
