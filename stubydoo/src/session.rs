//! Expectation verification.
//!
//! A [`Session`] tracks every patched instance that received an expectation
//! since the last verification pass. Verifying checks each counted record,
//! then unconditionally unpatches the tracked instances and forgets them, so
//! a failing test never leaves objects patched.
//!
//! Sessions are cheap handles; clones share the same pending set. They are
//! neither `Send` nor `Sync`.

use crate::api;
use crate::config::SessionConfig;
use crate::expectation::Expectation;
use crate::registry::PatchRegistry;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use stubydoo_runtime::{BoundMethod, ObjectRef, StubError, StubResult, Unsatisfied};
use tracing::{debug, warn};

struct SessionInner {
    config: SessionConfig,
    pending: RefCell<Vec<Rc<PatchRegistry>>>,
}

/// Pending-expectation tracker and verifier.
#[derive(Clone)]
pub struct Session(Rc<SessionInner>);

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// A session with `config`, plus environment overrides unless the
    /// config ignores the environment.
    pub fn with_config(config: SessionConfig) -> Self {
        Self(Rc::new(SessionInner {
            config: config.apply_environment(),
            pending: RefCell::new(Vec::new()),
        }))
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.0.config
    }

    /// Number of instances with unverified expectations.
    pub fn pending(&self) -> usize {
        self.0.pending.borrow().len()
    }

    // =========================================================================
    // Expectations
    // =========================================================================

    /// Expect `method_name` on `instance` to be called (once, by default).
    pub fn expect(&self, instance: &ObjectRef, method_name: &str) -> Expectation {
        let (registry, record) = api::attach_counted(instance, method_name);
        self.track(registry);
        Expectation(record)
    }

    /// Expect a call through a method reference.
    pub fn expect_method(&self, method: &BoundMethod) -> Expectation {
        self.expect(method.receiver(), method.name())
    }

    fn track(&self, registry: Rc<PatchRegistry>) {
        let mut pending = self.0.pending.borrow_mut();
        if !pending.iter().any(|r| Rc::ptr_eq(r, &registry)) {
            pending.push(registry);
        }
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Run `body`, then verify and clear every pending expectation.
    ///
    /// Refuses to start when expectations from an earlier unverified run
    /// are pending (unless configured otherwise). Cleanup runs on every exit
    /// path, panics included. An error from `body` itself takes precedence
    /// over unsatisfied expectations.
    pub fn verify<T>(&self, body: impl FnOnce() -> StubResult<T>) -> StubResult<T> {
        let leftovers = self.pending();
        if leftovers > 0 && self.0.config.refuse_unverified {
            debug!(pending = leftovers, "refusing to run over unverified expectations");
            return Err(StubError::ExpectationsNotVerified { pending: leftovers });
        }

        let guard = CleanupGuard(self);
        let outcome = body();
        let unsatisfied = self.unsatisfied();
        drop(guard);

        match outcome {
            Err(err) => {
                if !unsatisfied.is_empty() {
                    warn!(
                        unsatisfied = unsatisfied.len(),
                        error = %err,
                        "body failed; unsatisfied expectations not reported"
                    );
                }
                Err(err)
            }
            Ok(value) => Self::report(unsatisfied).map(|()| value),
        }
    }

    /// Wrap `body` so that every invocation runs under [`verify`](Self::verify).
    pub fn wrap<T, F>(&self, body: F) -> impl Fn() -> StubResult<T> + use<T, F>
    where
        F: Fn() -> StubResult<T>,
    {
        let session = self.clone();
        move || session.verify(&body)
    }

    /// Verify and clear pending expectations at the end of a test body.
    pub fn assert_expectations(&self) -> StubResult<()> {
        let unsatisfied = self.unsatisfied();
        self.cleanup();
        Self::report(unsatisfied)
    }

    /// Descriptions of every pending record verification would reject.
    pub fn unsatisfied(&self) -> Vec<String> {
        let pending: Vec<Rc<PatchRegistry>> = self.0.pending.borrow().clone();
        pending.iter().flat_map(|r| r.unsatisfied()).collect()
    }

    fn report(unsatisfied: Vec<String>) -> StubResult<()> {
        if unsatisfied.is_empty() {
            return Ok(());
        }
        warn!(count = unsatisfied.len(), "unsatisfied expectations");
        Err(StubError::ExpectationNotSatisfied(Unsatisfied::Pending {
            expectations: unsatisfied,
        }))
    }

    /// Unpatch every tracked instance and forget them.
    fn cleanup(&self) {
        let pending = std::mem::take(&mut *self.0.pending.borrow_mut());
        if !pending.is_empty() {
            debug!(instances = pending.len(), "cleaning up pending expectations");
        }
        for registry in pending {
            registry.unpatch_all();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.0.config)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Runs cleanup when dropped, including during unwinding.
struct CleanupGuard<'a>(&'a Session);

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.0.cleanup();
    }
}

// =============================================================================
// Tests
// =============================================================================
