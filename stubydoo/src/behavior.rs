//! Behavior records and stub handles.
//!
//! A [`Behavior`] says what happens when a call is routed to it: return a
//! value, run a callback, raise an error, or yield a sequence. Records are
//! owned by their [`DispatchSet`]; callers hold [`StubHandle`]s (or
//! [`Expectation`](crate::Expectation)s), which are non-owning views used to
//! reconfigure or remove the record.
//!
//! Filter changes re-insert the record into its dispatch set, so they apply
//! to calls made strictly after the change. A record removed with `unset`
//! stays configurable through its handle, but it is never attached again.

use crate::counter::{CallCounter, times};
use crate::dispatch::DispatchSet;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use stubydoo_runtime::{
    Arguments, Exception, Function, Keywords, StubError, StubResult, Value, WeakObjectRef,
};
use tracing::debug;

// =============================================================================
// Actions
// =============================================================================

/// Items an `and_yield` record produces on each call.
#[derive(Debug, Clone)]
pub enum Sequence {
    /// Literal items; every call starts a fresh iterator over them.
    Items(Rc<[Value]>),
    /// A producer called with the call's arguments.
    Producer(Function),
}

/// What a matched call does.
#[derive(Debug, Clone)]
pub enum Action {
    Return(Value),
    Run(Function),
    Raise(Exception),
    Yield(Sequence),
}

impl Default for Action {
    fn default() -> Self {
        Self::Return(Value::None)
    }
}

impl Action {
    /// Build a yield action.
    ///
    /// A single callable item is taken as the producer itself; anything else
    /// is a list of literal items.
    pub fn yielding(items: Vec<Value>) -> Self {
        if let [Value::Function(producer)] = items.as_slice() {
            return Self::Yield(Sequence::Producer(producer.clone()));
        }
        Self::Yield(Sequence::Items(items.into()))
    }

    /// Perform the action for one call.
    pub fn perform(&self, args: &Arguments) -> StubResult<Value> {
        match self {
            Self::Return(value) => Ok(value.clone()),
            Self::Run(callback) => callback.call(args),
            Self::Raise(exc) => Err(StubError::Raised(exc.clone())),
            Self::Yield(Sequence::Items(items)) => {
                let items = Rc::clone(items);
                Ok(Value::iter((0..items.len()).map(move |i| items[i].clone())))
            }
            Self::Yield(Sequence::Producer(producer)) => producer.call(args),
        }
    }
}

// =============================================================================
// Behavior Record
// =============================================================================

/// One scripted behavior for a method of one instance.
pub struct Behavior {
    method_name: Rc<str>,
    instance: WeakObjectRef,
    owner: RefCell<Weak<DispatchSet>>,
    filter: RefCell<Option<Arguments>>,
    action: RefCell<Action>,
    counter: Option<RefCell<CallCounter>>,
    invocations: Cell<u64>,
}

impl Behavior {
    /// A plain stub record.
    pub(crate) fn new(method_name: Rc<str>, instance: WeakObjectRef) -> Rc<Self> {
        Rc::new(Self::build(method_name, instance, None))
    }

    /// A record carrying a call counter.
    pub(crate) fn counted(method_name: Rc<str>, instance: WeakObjectRef) -> Rc<Self> {
        Rc::new(Self::build(
            method_name,
            instance,
            Some(RefCell::new(CallCounter::new())),
        ))
    }

    fn build(
        method_name: Rc<str>,
        instance: WeakObjectRef,
        counter: Option<RefCell<CallCounter>>,
    ) -> Self {
        Self {
            method_name,
            instance,
            owner: RefCell::new(Weak::new()),
            filter: RefCell::new(None),
            action: RefCell::new(Action::default()),
            counter,
            invocations: Cell::new(0),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn filter(&self) -> Option<Arguments> {
        self.filter.borrow().clone()
    }

    pub fn action(&self) -> Action {
        self.action.borrow().clone()
    }

    /// Whether this record carries a call counter.
    #[inline]
    pub fn is_counted(&self) -> bool {
        self.counter.is_some()
    }

    /// Times a call was routed to this record, including failed ones.
    #[inline]
    pub fn invocations(&self) -> u64 {
        self.invocations.get()
    }

    /// Whether the record is still part of a live dispatch set.
    pub fn is_active(self: &Rc<Self>) -> bool {
        self.owner()
            .is_some_and(|owner| owner.contains(self))
    }

    pub(crate) fn owner(&self) -> Option<Rc<DispatchSet>> {
        self.owner.borrow().upgrade()
    }

    pub(crate) fn attach(&self, owner: &Rc<DispatchSet>) {
        *self.owner.borrow_mut() = Rc::downgrade(owner);
    }

    pub(crate) fn detach(&self) {
        *self.owner.borrow_mut() = Weak::new();
    }

    // =========================================================================
    // Matching & Invocation
    // =========================================================================

    /// Whether the record's filter equals the call snapshot.
    pub(crate) fn accepts(&self, args: &Arguments) -> bool {
        self.filter
            .borrow()
            .as_ref()
            .is_some_and(|filter| filter == args)
    }

    /// Whether this record carries exactly `filter`.
    pub(crate) fn has_filter(&self, filter: &Arguments) -> bool {
        self.accepts(filter)
    }

    /// Run the record for one routed call.
    pub(crate) fn invoke(&self, args: &Arguments) -> StubResult<Value> {
        self.invocations.set(self.invocations.get() + 1);
        if let Some(counter) = &self.counter {
            let outcome = counter.borrow_mut().record_call(&self.method_name);
            if let Err(reason) = outcome {
                debug!(method = %self.method_name, %reason, "expectation violated");
                return Err(StubError::ExpectationNotSatisfied(reason));
            }
        }
        let action = self.action();
        action.perform(args)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub(crate) fn set_action(&self, action: Action) {
        *self.action.borrow_mut() = action;
    }

    pub(crate) fn set_filter(self: &Rc<Self>, filter: Option<Arguments>) {
        *self.filter.borrow_mut() = filter;
        if let Some(owner) = self.owner() {
            owner.reinsert(self);
        }
    }

    /// Replace the keyword part of the filter, keeping positional filters.
    pub(crate) fn set_keyword_filter(self: &Rc<Self>, keywords: Keywords) {
        let positional = self
            .filter()
            .map(|filter| filter.into_parts().0)
            .unwrap_or_default();
        self.set_filter(Some(Arguments::from_parts(positional, keywords)));
    }

    pub(crate) fn with_counter<R>(&self, f: impl FnOnce(&mut CallCounter) -> R) -> Option<R> {
        self.counter.as_ref().map(|counter| f(&mut counter.borrow_mut()))
    }

    /// Remove the record from its dispatch set.
    pub(crate) fn unset(self: &Rc<Self>) {
        if let Some(owner) = self.owner() {
            owner.discard(self);
        }
    }

    /// Human readable description used in verification reports.
    pub(crate) fn describe(&self) -> String {
        let type_name = self
            .instance
            .upgrade()
            .map(|object| object.type_name())
            .unwrap_or_else(|| "<dropped>".to_string());
        let filter = self
            .filter()
            .map(|filter| filter.to_string())
            .unwrap_or_else(|| "(...)".to_string());
        match &self.counter {
            Some(counter) => {
                let counter = counter.borrow();
                format!(
                    "{}.{}{} expected {}, called {}",
                    type_name,
                    self.method_name,
                    filter,
                    counter,
                    times(counter.calls())
                )
            }
            None => format!("{}.{}{}", type_name, self.method_name, filter),
        }
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("method", &self.method_name)
            .field("filter", &self.filter.borrow())
            .field("action", &self.action.borrow())
            .field("counter", &self.counter)
            .finish()
    }
}

// =============================================================================
// Handles
// =============================================================================

/// Generates the configuration surface shared by stub and expectation
/// handles. Every mutator consumes and returns the handle for chaining.
macro_rules! impl_behavior_mutators {
    ($handle:ident) => {
        impl $handle {
            /// Only answer calls whose arguments equal `args`.
            pub fn with_args(self, args: $crate::Arguments) -> Self {
                self.0.set_filter(Some(args));
                self
            }

            /// Only answer calls whose keyword arguments equal `keywords`.
            ///
            /// Positional filters set earlier are kept; without one the call
            /// must pass no positional arguments.
            pub fn with_kwargs(self, keywords: impl Into<$crate::Keywords>) -> Self {
                self.0.set_keyword_filter(keywords.into());
                self
            }

            /// Answer any call not claimed by a filtered record.
            pub fn with_any_args(self) -> Self {
                self.0.set_filter(None);
                self
            }

            pub fn and_return(self, value: impl Into<$crate::Value>) -> Self {
                self.0
                    .set_action($crate::behavior::Action::Return(value.into()));
                self
            }

            /// Run `callback` with the call's arguments and return its result.
            pub fn and_run<F>(self, callback: F) -> Self
            where
                F: Fn(&$crate::Arguments) -> $crate::StubResult<$crate::Value> + 'static,
            {
                self.0.set_action($crate::behavior::Action::Run(
                    $crate::Function::new(callback),
                ));
                self
            }

            pub fn and_raise(self, error: impl Into<$crate::Exception>) -> Self {
                self.0
                    .set_action($crate::behavior::Action::Raise(error.into()));
                self
            }

            /// Return a fresh lazy sequence over `items` on every call.
            ///
            /// A single function item is used as the sequence producer.
            pub fn and_yield<I>(self, items: I) -> Self
            where
                I: IntoIterator,
                I::Item: Into<$crate::Value>,
            {
                let items = items.into_iter().map(Into::into).collect();
                self.0
                    .set_action($crate::behavior::Action::yielding(items));
                self
            }

            /// Return whatever `producer` makes of the call's arguments.
            pub fn and_yield_from<F>(self, producer: F) -> Self
            where
                F: Fn(&$crate::Arguments) -> $crate::StubResult<$crate::Value> + 'static,
            {
                self.0.set_action($crate::behavior::Action::Yield(
                    $crate::behavior::Sequence::Producer($crate::Function::new(producer)),
                ));
                self
            }

            /// Remove this record from its method.
            ///
            /// When it was the last record, the method is no longer
            /// intercepted. Further mutators only affect the detached record.
            pub fn unset(&self) {
                self.0.unset();
            }

            /// Whether the record still answers calls.
            pub fn is_active(&self) -> bool {
                self.0.is_active()
            }

            pub fn method_name(&self) -> &str {
                self.0.method_name()
            }

            pub fn filter(&self) -> Option<$crate::Arguments> {
                self.0.filter()
            }

            pub fn behavior(&self) -> &std::rc::Rc<$crate::behavior::Behavior> {
                &self.0
            }
        }
    };
}

pub(crate) use impl_behavior_mutators;

/// Handle to a stub record.
#[derive(Debug, Clone)]
pub struct StubHandle(pub(crate) Rc<Behavior>);

impl_behavior_mutators!(StubHandle);

// =============================================================================
// Tests
// =============================================================================
