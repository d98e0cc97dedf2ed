//! Call counting for expectations.
//!
//! A [`CallCounter`] tracks how often an expected method was invoked
//! against optional minimum and maximum bounds.
//!
//! # State Machine
//!
//! ```text
//! Unconstrained --call--> Counting --min reached--> Satisfied
//!       |                    |                          |
//!       +--------------------+---- max exceeded / -----+--> Violated
//!                                  forbidden call
//! ```
//!
//! Bounds are fixed lazily: a limited counter whose bounds were never set
//! behaves as "exactly once" from its first call on.

use std::fmt;
use stubydoo_runtime::Unsatisfied;

/// Observable state of a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountState {
    /// Not called yet and not satisfied by its bounds alone.
    Unconstrained,
    /// Called, but the minimum is not reached yet.
    Counting,
    /// Verification would pass.
    Satisfied,
    /// A call broke the maximum or a must-not-be-called rule.
    Violated,
}

/// Invocation bounds and bookkeeping for one expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallCounter {
    calls: u32,
    min_calls: Option<u32>,
    max_calls: Option<u32>,
    limited: bool,
    reject_any_call: bool,
    satisfied: bool,
    violated: bool,
}

impl Default for CallCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl CallCounter {
    /// A limited counter with no explicit bounds.
    pub fn new() -> Self {
        Self {
            calls: 0,
            min_calls: None,
            max_calls: None,
            limited: true,
            reject_any_call: false,
            satisfied: false,
            violated: false,
        }
    }

    // =========================================================================
    // Bounds
    // =========================================================================

    pub fn exactly(&mut self, n: u32) {
        self.limited = true;
        self.reject_any_call = false;
        self.min_calls = Some(n);
        self.max_calls = Some(n);
    }

    /// Set the minimum only; an earlier maximum stays in place.
    pub fn at_least(&mut self, n: u32) {
        self.limited = true;
        self.reject_any_call = false;
        self.min_calls = Some(n);
    }

    /// Set the maximum only; an earlier minimum stays in place.
    pub fn at_most(&mut self, n: u32) {
        self.limited = true;
        self.reject_any_call = false;
        self.max_calls = Some(n);
    }

    /// Any call at all fails.
    pub fn never(&mut self) {
        self.reject_any_call = true;
    }

    /// Drop both bounds and stop checking counts.
    pub fn any_number_of_times(&mut self) {
        self.limited = false;
        self.reject_any_call = false;
        self.min_calls = None;
        self.max_calls = None;
    }

    // =========================================================================
    // Counting
    // =========================================================================

    /// Record one invocation of `method`.
    pub fn record_call(&mut self, method: &str) -> Result<(), Unsatisfied> {
        if self.reject_any_call {
            self.violated = true;
            return Err(Unsatisfied::Forbidden {
                method: method.to_string(),
            });
        }

        if self.limited && self.min_calls.is_none() && self.max_calls.is_none() {
            self.min_calls = Some(1);
            self.max_calls = Some(1);
        }

        self.calls = self.calls.saturating_add(1);

        if let Some(max) = self.max_calls {
            if self.calls > max {
                self.violated = true;
                return Err(Unsatisfied::TooManyCalls {
                    method: method.to_string(),
                    calls: self.calls,
                    max,
                });
            }
        }

        if self.min_calls.is_none_or(|min| self.calls >= min) {
            self.satisfied = true;
        }
        Ok(())
    }

    /// Whether end-of-test verification would accept this counter.
    ///
    /// Satisfaction reached before a violation stays; a violation with no
    /// earlier satisfaction fails even if the caller swallowed the error.
    pub fn is_satisfied(&self) -> bool {
        if self.satisfied {
            return true;
        }
        if self.violated {
            return false;
        }
        if self.reject_any_call || !self.limited {
            return true;
        }
        match (self.min_calls, self.max_calls) {
            (None, None) => false,
            (Some(min), _) => self.calls >= min,
            (None, Some(_)) => true,
        }
    }

    pub fn state(&self) -> CountState {
        if self.violated {
            CountState::Violated
        } else if self.is_satisfied() {
            CountState::Satisfied
        } else if self.calls == 0 {
            CountState::Unconstrained
        } else {
            CountState::Counting
        }
    }

    #[inline]
    pub fn calls(&self) -> u32 {
        self.calls
    }

    #[inline]
    pub fn bounds(&self) -> (Option<u32>, Option<u32>) {
        (self.min_calls, self.max_calls)
    }
}

impl fmt::Display for CallCounter {
    /// Describe the bounds, e.g. `at least 2 and at most 4 times`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reject_any_call {
            return write!(f, "never");
        }
        if !self.limited {
            return write!(f, "any number of times");
        }
        match (self.min_calls, self.max_calls) {
            (None, None) => write!(f, "exactly {}", times(1)),
            (Some(min), Some(max)) if min == max => write!(f, "exactly {}", times(min)),
            (Some(min), Some(max)) => write!(f, "at least {} and at most {}", min, times(max)),
            (Some(min), None) => write!(f, "at least {}", times(min)),
            (None, Some(max)) => write!(f, "at most {}", times(max)),
        }
    }
}

/// `1 time`, `n times`.
pub(crate) fn times(n: u32) -> String {
    if n == 1 {
        "1 time".to_string()
    } else {
        format!("{} times", n)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn run(counter: &mut CallCounter, n: u32) -> Result<(), Unsatisfied> {
        for _ in 0..n {
            counter.record_call("m")?;
        }
        Ok(())
    }

    // =========================================================================
    // Default Bounds
    // =========================================================================

    #[test]
    fn test_default_is_exactly_once() {
        let mut counter = CallCounter::new();
        assert!(!counter.is_satisfied());
        assert_eq!(counter.state(), CountState::Unconstrained);

        counter.record_call("m").unwrap();
        assert!(counter.is_satisfied());
        assert_eq!(counter.bounds(), (Some(1), Some(1)));

        let err = counter.record_call("m").unwrap_err();
        assert_eq!(
            err,
            Unsatisfied::TooManyCalls {
                method: "m".to_string(),
                calls: 2,
                max: 1
            }
        );
        assert_eq!(counter.state(), CountState::Violated);
        // Satisfaction is monotonic even after a violation.
        assert!(counter.is_satisfied());
    }

    // =========================================================================
    // Explicit Bounds
    // =========================================================================

    #[test]
    fn test_exactly() {
        let mut counter = CallCounter::new();
        counter.exactly(3);
        run(&mut counter, 2).unwrap();
        assert!(!counter.is_satisfied());
        assert_eq!(counter.state(), CountState::Counting);
        run(&mut counter, 1).unwrap();
        assert!(counter.is_satisfied());
        assert!(run(&mut counter, 1).is_err());
    }

    #[test]
    fn test_at_least_has_no_maximum() {
        let mut counter = CallCounter::new();
        counter.at_least(2);
        run(&mut counter, 1).unwrap();
        assert!(!counter.is_satisfied());
        run(&mut counter, 10).unwrap();
        assert!(counter.is_satisfied());
    }

    #[test]
    fn test_at_most_zero_rejects_first_call() {
        let mut counter = CallCounter::new();
        counter.at_most(0);
        assert!(counter.is_satisfied());
        assert!(counter.record_call("m").is_err());
        assert_eq!(counter.calls(), 1);
    }

    #[test]
    fn test_range() {
        for calls in 0..=5 {
            let mut counter = CallCounter::new();
            counter.at_least(2);
            counter.at_most(4);
            let outcome = run(&mut counter, calls);
            match calls {
                0 | 1 => {
                    assert!(outcome.is_ok());
                    assert!(!counter.is_satisfied());
                }
                2..=4 => {
                    assert!(outcome.is_ok());
                    assert!(counter.is_satisfied());
                }
                _ => assert!(outcome.is_err()),
            }
        }
    }

    #[test]
    fn test_never() {
        let mut counter = CallCounter::new();
        counter.never();
        assert!(counter.is_satisfied());
        assert_eq!(
            counter.record_call("save"),
            Err(Unsatisfied::Forbidden {
                method: "save".to_string()
            })
        );
        assert_eq!(counter.state(), CountState::Violated);
        assert_eq!(counter.calls(), 0);
        assert!(!counter.is_satisfied());
    }

    #[test]
    fn test_any_number_of_times() {
        let mut counter = CallCounter::new();
        counter.exactly(1);
        counter.any_number_of_times();
        assert!(counter.is_satisfied());
        run(&mut counter, 50).unwrap();
        assert!(counter.is_satisfied());
        assert_eq!(counter.bounds(), (None, None));
    }

    #[test]
    fn test_display() {
        let mut counter = CallCounter::new();
        assert_eq!(counter.to_string(), "exactly 1 time");
        counter.at_least(2);
        assert_eq!(counter.to_string(), "at least 2 times");
        counter.at_most(4);
        assert_eq!(counter.to_string(), "at least 2 and at most 4 times");
        counter.never();
        assert_eq!(counter.to_string(), "never");
    }

    // =========================================================================
    // Violations
    // =========================================================================

    #[test]
    fn test_violation_without_satisfaction_fails() {
        let mut counter = CallCounter::new();
        counter.exactly(0);
        assert!(counter.is_satisfied());
        assert!(counter.record_call("m").is_err());
        assert_eq!(counter.state(), CountState::Violated);
        assert!(!counter.is_satisfied());

        let mut counter = CallCounter::new();
        counter.at_most(1);
        run(&mut counter, 1).unwrap();
        assert!(counter.is_satisfied());

        let mut counter = CallCounter::new();
        counter.at_most(0);
        assert!(counter.record_call("m").is_err());
        assert!(!counter.is_satisfied());
    }

    #[test]
    fn test_bounds_after_never_lift_the_ban() {
        let mut counter = CallCounter::new();
        counter.never();
        counter.exactly(2);
        run(&mut counter, 2).unwrap();
        assert!(counter.is_satisfied());
        assert_eq!(counter.to_string(), "exactly 2 times");

        let mut counter = CallCounter::new();
        counter.never();
        counter.at_least(1);
        run(&mut counter, 3).unwrap();
        assert!(counter.is_satisfied());
    }

    #[test]
    fn test_display_singular() {
        let mut counter = CallCounter::new();
        counter.at_most(1);
        assert_eq!(counter.to_string(), "at most 1 time");
        counter.at_least(1);
        assert_eq!(counter.to_string(), "exactly 1 time");
        counter.exactly(3);
        assert_eq!(counter.to_string(), "exactly 3 times");
    }
}
