//! Typed event capture for harness diagnostics.
//!
//! Every interesting harness operation — declaring a call, installing an
//! ordering edge, materializing a group, moving the owed counter — is
//! recorded as a typed event with a timestamp relative to log creation.
//! On failure, `report()` renders the full sequence so an out-of-order
//! rejection can be traced back to the edge that caused it.
//!
//! # Example
//!
//! ```
//! use callseq::{EventLog, HarnessEvent, LogLevel};
//!
//! let log = EventLog::new(LogLevel::Debug);
//! log.record(HarnessEvent::Message {
//!     text: "phase one".to_string(),
//! });
//! assert_eq!(log.len(), 1);
//! println!("{}", log.report());
//! ```

use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// ============================================================================
// LogLevel
// ============================================================================

/// Logging verbosity level for the harness event log.
///
/// Levels are ordered from least to most verbose:
/// `Error < Warn < Info < Debug < Trace`
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only failures.
    Error,
    /// Warnings and above.
    Warn,
    /// General harness progress.
    #[default]
    Info,
    /// Materialization detail: edges, frontiers.
    Debug,
    /// All events including counter transitions.
    Trace,
}

impl LogLevel {
    /// Returns a human-readable name for the level.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Returns the level from the `CALLSEQ_LOG` environment variable.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("CALLSEQ_LOG")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

// ============================================================================
// HarnessEvent
// ============================================================================

/// A typed event captured by the harness event log.
#[derive(Debug, Clone)]
pub enum HarnessEvent {
    /// A call handle was declared as expected.
    CallDeclared {
        /// Diagnostic label of the call.
        label: String,
    },

    /// A happens-after edge was installed between two call handles.
    EdgeInstalled {
        /// Label of the call that must complete first.
        predecessor: String,
        /// Label of the call that must observe it.
        successor: String,
    },

    /// A top-level specification finished materializing.
    Materialized {
        /// Variant name of the specification root.
        kind: &'static str,
        /// Size of the incoming frontier.
        frontier_in: usize,
        /// Size of the outgoing frontier.
        frontier_out: usize,
    },

    /// The owed counter moved.
    CounterAdd {
        /// Delta applied (negative deltas may be partially absorbed).
        delta: i64,
        /// Owed count after the move.
        owed: u64,
    },

    /// A failure was reported through a context.
    Failure {
        /// The failure message.
        message: String,
    },

    /// Free-form diagnostic text.
    Message {
        /// The text.
        text: String,
    },
}

impl HarnessEvent {
    /// Returns the verbosity level at which this event is recorded.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        match self {
            Self::Failure { .. } => LogLevel::Error,
            Self::CallDeclared { .. } | Self::Materialized { .. } | Self::Message { .. } => {
                LogLevel::Info
            }
            Self::EdgeInstalled { .. } => LogLevel::Debug,
            Self::CounterAdd { .. } => LogLevel::Trace,
        }
    }
}

impl std::fmt::Display for HarnessEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CallDeclared { label } => write!(f, "call declared: {label}"),
            Self::EdgeInstalled {
                predecessor,
                successor,
            } => write!(f, "edge: {predecessor} -> {successor}"),
            Self::Materialized {
                kind,
                frontier_in,
                frontier_out,
            } => write!(
                f,
                "materialized {kind} (frontier {frontier_in} -> {frontier_out})"
            ),
            Self::CounterAdd { delta, owed } => write!(f, "counter {delta:+} (owed {owed})"),
            Self::Failure { message } => write!(f, "failure: {message}"),
            Self::Message { text } => f.write_str(text),
        }
    }
}

// ============================================================================
// EventLog
// ============================================================================

/// Captures harness events with timestamps for post-mortem reporting.
///
/// Events above the configured verbosity are dropped at record time, so a
/// quiet log costs one level comparison per event.
#[derive(Debug)]
pub struct EventLog {
    level: LogLevel,
    start: Instant,
    events: Mutex<Vec<(Duration, HarnessEvent)>>,
}

impl EventLog {
    /// Creates an event log recording at the given verbosity.
    #[must_use]
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            start: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Returns the configured verbosity.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Records an event if it is within the configured verbosity.
    pub fn record(&self, event: HarnessEvent) {
        if event.level() > self.level {
            return;
        }
        let at = self.start.elapsed();
        self.events.lock().expect("lock poisoned").push((at, event));
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().expect("lock poisoned").len()
    }

    /// Returns true if no events were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HarnessEvent> {
        self.events
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Discards all recorded events.
    pub fn clear(&self) {
        self.events.lock().expect("lock poisoned").clear();
    }

    /// Renders the recorded events into a timestamped report.
    #[must_use]
    pub fn report(&self) -> String {
        let events = self.events.lock().expect("lock poisoned");
        let mut out = String::new();
        let _ = writeln!(out, "=== harness event log ({} events) ===", events.len());
        for (at, event) in events.iter() {
            let _ = writeln!(
                out,
                "[{:>10.3}ms] {:5} {event}",
                at.as_secs_f64() * 1000.0,
                event.level().name(),
            );
        }
        out
    }
}
