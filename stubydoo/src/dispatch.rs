//! Per-method dispatch sets.
//!
//! A [`DispatchSet`] holds every behavior record registered for one method
//! of one instance and decides which record answers each call.
//!
//! # Matching
//!
//! 1. Records with an argument filter are scanned in registration order;
//!    the first whose filter equals the call's arguments wins.
//! 2. Otherwise the most recently added record without a filter wins.
//! 3. Otherwise the call is unexpected.
//!
//! Registering a filtered record whose filter equals an existing one
//! replaces that record in place. The set notifies its registry as soon as
//! it becomes empty, which removes the interception.

use crate::behavior::Behavior;
use crate::registry::PatchRegistry;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use stubydoo_runtime::{Arguments, StubError, StubResult, Value};
use tracing::{debug, trace};

/// Record storage. Most methods carry one or two records.
type Records = SmallVec<[Rc<Behavior>; 2]>;

// =============================================================================
// Dispatch Set
// =============================================================================

/// Ordered behavior records for one (instance, method) pair.
pub struct DispatchSet {
    method_name: Rc<str>,
    registry: Weak<PatchRegistry>,
    specific: RefCell<Records>,
    generic: RefCell<Records>,
}

impl DispatchSet {
    pub(crate) fn new(method_name: Rc<str>, registry: Weak<PatchRegistry>) -> Rc<Self> {
        Rc::new(Self {
            method_name,
            registry,
            specific: RefCell::new(Records::new()),
            generic: RefCell::new(Records::new()),
        })
    }

    #[inline]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Number of records with a filter.
    pub fn specific_len(&self) -> usize {
        self.specific.borrow().len()
    }

    /// Number of records without a filter.
    pub fn generic_len(&self) -> usize {
        self.generic.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.specific.borrow().is_empty() && self.generic.borrow().is_empty()
    }

    /// All records, filtered ones first, each group in registration order.
    pub fn records(&self) -> Vec<Rc<Behavior>> {
        let specific = self.specific.borrow();
        let generic = self.generic.borrow();
        specific.iter().chain(generic.iter()).cloned().collect()
    }

    pub(crate) fn contains(&self, record: &Rc<Behavior>) -> bool {
        let same = |r: &Rc<Behavior>| Rc::ptr_eq(r, record);
        self.specific.borrow().iter().any(same) || self.generic.borrow().iter().any(same)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Add a record according to its filter.
    pub(crate) fn add(self: &Rc<Self>, record: Rc<Behavior>) {
        record.attach(self);
        match record.filter() {
            Some(filter) => {
                let replaced = {
                    let mut specific = self.specific.borrow_mut();
                    match specific.iter().position(|r| r.has_filter(&filter)) {
                        Some(index) => Some(std::mem::replace(&mut specific[index], record)),
                        None => {
                            specific.push(record);
                            None
                        }
                    }
                };
                if let Some(old) = replaced {
                    trace!(method = %self.method_name, "filtered record replaced");
                    old.detach();
                }
            }
            None => self.generic.borrow_mut().push(record),
        }
    }

    /// Take a record out of whichever list holds it.
    fn take(&self, record: &Rc<Behavior>) -> bool {
        for list in [&self.specific, &self.generic] {
            let mut list = list.borrow_mut();
            if let Some(index) = list.iter().position(|r| Rc::ptr_eq(r, record)) {
                list.remove(index);
                return true;
            }
        }
        false
    }

    /// Remove a record; idempotent.
    ///
    /// Emptying the set removes the interception from the instance.
    pub(crate) fn discard(&self, record: &Rc<Behavior>) {
        if !self.take(record) {
            return;
        }
        record.detach();
        if self.is_empty() {
            if let Some(registry) = self.registry.upgrade() {
                registry.remove(&self.method_name);
            }
        }
    }

    /// Re-file a record after its filter changed.
    pub(crate) fn reinsert(self: &Rc<Self>, record: &Rc<Behavior>) {
        if self.take(record) {
            self.add(Rc::clone(record));
        }
    }

    /// Detach every record and empty the set without notifying the registry.
    pub(crate) fn clear(&self) {
        let specific = std::mem::take(&mut *self.specific.borrow_mut());
        let generic = std::mem::take(&mut *self.generic.borrow_mut());
        for record in specific.iter().chain(generic.iter()) {
            record.detach();
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Pick the record answering `args`.
    pub fn select(&self, args: &Arguments) -> Option<Rc<Behavior>> {
        let specific = self
            .specific
            .borrow()
            .iter()
            .find(|record| record.accepts(args))
            .cloned();
        specific.or_else(|| self.generic.borrow().last().cloned())
    }

    /// Route one call.
    ///
    /// No borrow is held while the chosen record runs, so callbacks may
    /// call back into the same method or reconfigure it.
    pub fn run(&self, args: &Arguments) -> StubResult<Value> {
        match self.select(args) {
            Some(record) => {
                trace!(method = %self.method_name, filtered = record.filter().is_some(), "dispatch");
                record.invoke(args)
            }
            None => {
                debug!(method = %self.method_name, arguments = %args, "unexpected call");
                Err(StubError::unexpected_call(&self.method_name, args))
            }
        }
    }
}

impl fmt::Debug for DispatchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchSet")
            .field("method", &self.method_name)
            .field("specific", &self.specific_len())
            .field("generic", &self.generic_len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
