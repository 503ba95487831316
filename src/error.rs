//! Error types and error handling strategy for callseq.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Usage errors (defects in test setup code) abort only the calling
//!   path of execution, carried as a panic payload that the isolated
//!   context knows how to format
//! - Runtime conditions (deadline expiry) are returned as values
//!
//! # Error Categories
//!
//! - **Usage**: a setup function asked for something the algebra forbids,
//!   e.g. slicing a detached group. These indicate a defect in test setup
//!   code, not a runtime condition.
//! - **Budgets**: a wait bound elapsed before the owed count drained or
//!   the test body completed.

use core::fmt;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A sub-range extraction was attempted on a detached group.
    ///
    /// Detached groups cannot be safely re-sliced because their edges are
    /// not part of the returned frontier.
    SubRangeOnDetached,
    /// A wait bound elapsed before the condition was met.
    DeadlineExceeded,
}

impl ErrorKind {
    /// Returns a static description of the error kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubRangeOnDetached => "sub-range extraction on a detached group",
            Self::DeadlineExceeded => "deadline exceeded",
        }
    }

    /// Returns true if this kind indicates a defect in test setup code.
    #[must_use]
    pub const fn is_usage(self) -> bool {
        matches!(self, Self::SubRangeOnDetached)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error produced by the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
}

impl Error {
    /// Creates a new error of the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Attaches a detail message to the error.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detail message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(detail) => write!(f, "{}: {detail}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let err = Error::new(ErrorKind::SubRangeOnDetached).with_message("range [0, 2]");
        assert_eq!(
            err.to_string(),
            "sub-range extraction on a detached group: range [0, 2]"
        );
    }

    #[test]
    fn usage_classification() {
        assert!(ErrorKind::SubRangeOnDetached.is_usage());
        assert!(!ErrorKind::DeadlineExceeded.is_usage());
    }
}
