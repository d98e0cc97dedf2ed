//! Test groups.
//!
//! A [`TestGroup`] is a fixture factory plus a list of named cases. Wrapping
//! a group with a session puts every case whose name follows the test naming
//! convention under [`Session::verify`]; other members (helpers) are left as
//! they are.

use crate::session::Session;
use std::fmt;
use std::rc::Rc;
use stubydoo_runtime::{StubError, StubResult};

type CaseBody<F> = Rc<dyn Fn(&mut F) -> StubResult<()>>;

struct Case<F> {
    name: String,
    body: CaseBody<F>,
    verified: bool,
}

impl<F> Clone for Case<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            body: Rc::clone(&self.body),
            verified: self.verified,
        }
    }
}

/// Named cases sharing a fixture factory.
pub struct TestGroup<F> {
    name: String,
    prefix: String,
    setup: Rc<dyn Fn() -> F>,
    cases: Vec<Case<F>>,
}

impl<F: 'static> TestGroup<F> {
    /// A group whose cases each receive a fresh fixture from `setup`.
    pub fn new(name: impl Into<String>, setup: impl Fn() -> F + 'static) -> Self {
        Self {
            name: name.into(),
            prefix: "test".to_string(),
            setup: Rc::new(setup),
            cases: Vec::new(),
        }
    }

    /// Add a member. Names are unique; a repeated name replaces the earlier
    /// member.
    pub fn case(
        mut self,
        name: impl Into<String>,
        body: impl Fn(&mut F) -> StubResult<()> + 'static,
    ) -> Self {
        let case = Case {
            name: name.into(),
            body: Rc::new(body),
            verified: false,
        };
        match self.cases.iter().position(|c| c.name == case.name) {
            Some(index) => self.cases[index] = case,
            None => self.cases.push(case),
        }
        self
    }

    /// Wrap every test case with `session`'s verification.
    pub fn assert_expectations(self, session: &Session) -> Self {
        session.wrap_group(self)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member names in registration order.
    pub fn case_names(&self) -> Vec<&str> {
        self.cases.iter().map(|c| c.name.as_str()).collect()
    }

    /// Whether `name` is wrapped with verification.
    pub fn is_verified(&self, name: &str) -> bool {
        self.cases.iter().any(|c| c.name == name && c.verified)
    }

    fn is_test(&self, name: &str) -> bool {
        name.starts_with(self.prefix.as_str())
    }

    /// Run one member against a fresh fixture.
    pub fn run(&self, name: &str) -> StubResult<()> {
        let case = self
            .cases
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| StubError::AttributeError {
                type_name: self.name.clone(),
                attr: name.to_string(),
            })?;
        let mut fixture = (self.setup)();
        (case.body)(&mut fixture)
    }

    /// Run every test case (helpers excluded), in registration order.
    pub fn run_all(&self) -> Vec<(String, StubResult<()>)> {
        self.cases
            .iter()
            .filter(|c| self.is_test(&c.name))
            .map(|c| (c.name.clone(), self.run(&c.name)))
            .collect()
    }
}

impl<F> fmt::Debug for TestGroup<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestGroup")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("cases", &self.cases.iter().map(|c| &c.name).collect::<Vec<_>>())
            .finish()
    }
}

impl Session {
    /// Wrap each test case of `group` with [`Session::verify`].
    ///
    /// Cases already wrapped are left alone, so wrapping twice does not nest.
    pub fn wrap_group<F: 'static>(&self, mut group: TestGroup<F>) -> TestGroup<F> {
        group.prefix = self.config().test_prefix.clone();
        for index in 0..group.cases.len() {
            let case = group.cases[index].clone();
            if case.verified || !group.is_test(&case.name) {
                continue;
            }
            let session = self.clone();
            let inner = case.body;
            group.cases[index] = Case {
                name: case.name,
                body: Rc::new(move |fixture: &mut F| session.verify(|| inner(fixture))),
                verified: true,
            };
        }
        group
    }
}

// =============================================================================
// Tests
// =============================================================================
