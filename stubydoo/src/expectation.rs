//! Expectation handles.
//!
//! An [`Expectation`] is a stub whose record carries a
//! [`CallCounter`](crate::counter::CallCounter). Besides the usual
//! behavior configuration it sets call-count bounds, and the owning
//! [`Session`](crate::Session) checks those bounds at verification time.

use crate::behavior::{Behavior, impl_behavior_mutators};
use crate::counter::CountState;
use std::rc::Rc;

/// Handle to a counted behavior record.
#[derive(Debug, Clone)]
pub struct Expectation(pub(crate) Rc<Behavior>);

impl_behavior_mutators!(Expectation);

impl Expectation {
    fn bound(self, f: impl FnOnce(&mut crate::counter::CallCounter)) -> Self {
        self.0.with_counter(f);
        self
    }

    /// Require exactly `n` calls.
    pub fn exactly(self, n: u32) -> Self {
        self.bound(|c| c.exactly(n))
    }

    /// Require at least `n` calls. Combine with [`at_most`](Self::at_most)
    /// for a range.
    pub fn at_least(self, n: u32) -> Self {
        self.bound(|c| c.at_least(n))
    }

    /// Allow at most `n` calls; the call after that fails immediately.
    pub fn at_most(self, n: u32) -> Self {
        self.bound(|c| c.at_most(n))
    }

    pub fn once(self) -> Self {
        self.exactly(1)
    }

    pub fn twice(self) -> Self {
        self.exactly(2)
    }

    /// Fail any call at all.
    pub fn never(self) -> Self {
        self.bound(|c| c.never())
    }

    /// Accept any call count, including zero.
    pub fn any_number_of_times(self) -> Self {
        self.bound(|c| c.any_number_of_times())
    }

    /// Calls counted so far.
    pub fn calls(&self) -> u32 {
        self.0.with_counter(|c| c.calls()).unwrap_or(0)
    }

    pub fn is_satisfied(&self) -> bool {
        self.0.with_counter(|c| c.is_satisfied()).unwrap_or(true)
    }

    pub fn state(&self) -> CountState {
        self.0
            .with_counter(|c| c.state())
            .unwrap_or(CountState::Satisfied)
    }
}
