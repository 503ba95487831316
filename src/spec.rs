//! The call specification tree.
//!
//! A [`CallSpec`] describes the desired ordering among a group of call
//! handles: a single call, a totally ordered chain, a mutually unordered
//! parallel group, or a group detached from its surroundings on one or
//! both sides. The algebra in [`order`](crate::order) builds these trees;
//! materialization consumes them exactly once, turning structure into
//! happens-after edges on the underlying handles.
//!
//! The variant set is closed. The "unrecognized specification" failure
//! mode of dynamically-typed renditions of this model cannot occur here:
//! materialization is an exhaustive match.

use crate::handle::CallHandle;
use core::fmt;

/// Controls whether a group inherits predecessors and/or propagates as a
/// predecessor to successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetachMode {
    /// No detachment; the group orders normally on both sides.
    #[default]
    None,
    /// The group does not inherit predecessors.
    Head,
    /// The group does not propagate as predecessor to successors.
    Tail,
    /// Total isolation in both directions.
    Both,
}

/// A tagged-variant tree describing desired ordering among call handles.
///
/// Produced by the ordering algebra, consumed exactly once by
/// materialization. A tree is single-use: re-materializing it would
/// re-install its edges.
#[derive(Clone)]
pub enum CallSpec {
    /// No calls; materialization passes the frontier through unchanged.
    Empty,
    /// Exactly one call handle.
    Single(CallHandle),
    /// Total order among the elements.
    Chain(Vec<CallSpec>),
    /// Elements mutually unordered, each ordered against the group's
    /// external neighbors.
    Parallel(Vec<CallSpec>),
    /// Elements excluded from inheriting predecessors.
    DetachHead(Vec<CallSpec>),
    /// Elements excluded from propagating as predecessors.
    DetachTail(Vec<CallSpec>),
    /// Elements excluded from ordering in both directions.
    DetachBoth(Vec<CallSpec>),
}

impl CallSpec {
    /// Returns the variant name, for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Single(_) => "single",
            Self::Chain(_) => "chain",
            Self::Parallel(_) => "parallel",
            Self::DetachHead(_) => "detach-head",
            Self::DetachTail(_) => "detach-tail",
            Self::DetachBoth(_) => "detach-both",
        }
    }

    /// Returns true for the `Detach*` variants.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        matches!(
            self,
            Self::DetachHead(_) | Self::DetachTail(_) | Self::DetachBoth(_)
        )
    }

    /// Collects the leaf handles of this tree in declaration order.
    #[must_use]
    pub fn flatten(&self) -> Vec<CallHandle> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<CallHandle>) {
        match self {
            Self::Empty => {}
            Self::Single(handle) => out.push(handle.clone()),
            Self::Chain(parts)
            | Self::Parallel(parts)
            | Self::DetachHead(parts)
            | Self::DetachTail(parts)
            | Self::DetachBoth(parts) => {
                for part in parts {
                    part.collect_into(out);
                }
            }
        }
    }
}

impl fmt::Debug for CallSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Single(handle) => write!(f, "Single({})", handle.label()),
            Self::Chain(parts) => f.debug_tuple("Chain").field(parts).finish(),
            Self::Parallel(parts) => f.debug_tuple("Parallel").field(parts).finish(),
            Self::DetachHead(parts) => f.debug_tuple("DetachHead").field(parts).finish(),
            Self::DetachTail(parts) => f.debug_tuple("DetachTail").field(parts).finish(),
            Self::DetachBoth(parts) => f.debug_tuple("DetachBoth").field(parts).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ExpectedCall;
    use std::sync::Arc;

    struct Named(&'static str);

    impl ExpectedCall for Named {
        fn after(&self, _other: &CallHandle) {}

        fn label(&self) -> String {
            self.0.to_string()
        }
    }

    fn named(label: &'static str) -> CallHandle {
        Arc::new(Named(label))
    }

    #[test]
    fn flatten_preserves_declaration_order() {
        let spec = CallSpec::Chain(vec![
            CallSpec::Single(named("a")),
            CallSpec::Parallel(vec![
                CallSpec::Single(named("b")),
                CallSpec::Chain(vec![CallSpec::Single(named("c")), CallSpec::Single(named("d"))]),
            ]),
            CallSpec::Empty,
            CallSpec::Single(named("e")),
        ]);
        let labels: Vec<String> = spec.flatten().iter().map(|h| h.label()).collect();
        assert_eq!(labels, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn detachment_classification() {
        assert!(CallSpec::DetachHead(Vec::new()).is_detached());
        assert!(CallSpec::DetachTail(Vec::new()).is_detached());
        assert!(CallSpec::DetachBoth(Vec::new()).is_detached());
        assert!(!CallSpec::Chain(Vec::new()).is_detached());
        assert!(!CallSpec::Empty.is_detached());
    }

    #[test]
    fn debug_uses_labels() {
        let spec = CallSpec::Chain(vec![CallSpec::Single(named("open"))]);
        assert_eq!(format!("{spec:?}"), "Chain([Single(open)])");
    }
}
