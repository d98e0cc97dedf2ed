//! Error taxonomy shared by the object model and the interception engine.
//!
//! Every failure that can surface from an intercepted call, an attribute
//! access on a double, or an end-of-test verification pass is a
//! [`StubError`]. Most variants are assertion-class failures: they report a
//! broken test rather than a recoverable fault.

use crate::args::Arguments;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// Exception
// =============================================================================

/// A user-level error raised by a stubbed method (`and_raise`).
///
/// Carries the error kind plus the positional and keyword arguments it was
/// constructed with, so callers can inspect them exactly as configured.
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    kind: String,
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
}

impl Exception {
    /// Create an exception of the given kind with no arguments.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Attach constructor arguments.
    ///
    /// A keyword matcher in `arguments` carries no concrete mapping and is
    /// dropped.
    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        let (positional, keywords) = arguments.into_parts();
        self.args = positional.into_vec();
        self.kwargs = keywords.into_map().unwrap_or_default();
        self
    }

    /// The error kind (its class name).
    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Positional constructor arguments.
    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Keyword constructor arguments.
    #[inline]
    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }

    /// Check the error kind.
    #[inline]
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.args.is_empty() && self.kwargs.is_empty() {
            return Ok(());
        }
        write!(f, "(")?;
        let mut first = true;
        for arg in &self.args {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}", arg)?;
        }
        for (key, value) in &self.kwargs {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}={}", key, value)?;
        }
        write!(f, ")")
    }
}

impl From<&str> for Exception {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl From<String> for Exception {
    fn from(kind: String) -> Self {
        Self::new(kind)
    }
}

// =============================================================================
// Unsatisfied Expectations
// =============================================================================

/// Why an expectation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsatisfied {
    /// A call pushed the count past its maximum.
    TooManyCalls {
        method: String,
        calls: u32,
        max: u32,
    },

    /// A method that must never be called was called.
    Forbidden { method: String },

    /// Verification found expectations whose minimum was never reached.
    Pending { expectations: Vec<String> },
}

impl fmt::Display for Unsatisfied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyCalls { method, calls, max } => write!(
                f,
                "{} called {} {}, expected at most {}",
                method,
                calls,
                if *calls == 1 { "time" } else { "times" },
                max
            ),
            Self::Forbidden { method } => write!(f, "{} must not be called", method),
            Self::Pending { expectations } => {
                write!(f, "{} unsatisfied: {}", expectations.len(), expectations.join(", "))
            }
        }
    }
}

// =============================================================================
// StubError
// =============================================================================

/// Errors surfaced by objects, stubs and expectations.
#[derive(Debug, Clone, Error)]
pub enum StubError {
    /// Plain attribute lookup failure on an ordinary object.
    #[error("'{type_name}' object has no attribute '{attr}'")]
    AttributeError { type_name: String, attr: String },

    /// A mock was asked for an attribute it never declared.
    #[error("unexpected access to undeclared attribute '{attr}' on '{type_name}'")]
    UnexpectedAttributeAccess { type_name: String, attr: String },

    /// An intercepted method received a call that matched no behavior.
    #[error("unexpected call: {method}{arguments}")]
    UnexpectedCall { method: String, arguments: String },

    /// An expectation was violated, at call time or at verification.
    #[error("expectation not satisfied: {0}")]
    ExpectationNotSatisfied(Unsatisfied),

    /// Expectations from an earlier run were never verified.
    #[error("{pending} instance(s) still carry expectations from a run that was never verified")]
    ExpectationsNotVerified { pending: usize },

    /// Error configured through `and_raise`.
    #[error("{0}")]
    Raised(Exception),

    /// A value was used in a way its type does not support.
    #[error("type error: {message}")]
    TypeError { message: String },
}

impl StubError {
    /// Build a type error.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
        }
    }

    /// Build an unexpected call error from the offending arguments.
    pub fn unexpected_call(method: &str, arguments: &Arguments) -> Self {
        Self::UnexpectedCall {
            method: method.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Assertion-class failures: test doubles reporting a broken test.
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedAttributeAccess { .. }
                | Self::UnexpectedCall { .. }
                | Self::ExpectationNotSatisfied(_)
                | Self::ExpectationsNotVerified { .. }
        )
    }

    /// Unexpected calls count as unsatisfied expectations.
    pub fn is_expectation_failure(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedCall { .. } | Self::ExpectationNotSatisfied(_)
        )
    }

    /// The raised exception, if this error came from `and_raise`.
    pub fn exception(&self) -> Option<&Exception> {
        match self {
            Self::Raised(exc) => Some(exc),
            _ => None,
        }
    }
}

impl From<Exception> for StubError {
    fn from(exc: Exception) -> Self {
        Self::Raised(exc)
    }
}

/// Result type for object and stub operations.
pub type StubResult<T> = Result<T, StubError>;

// =============================================================================
// Tests
// =============================================================================
