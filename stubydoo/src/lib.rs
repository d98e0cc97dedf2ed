//! Stubs, expectations and test doubles for live objects.
//!
//! This crate provides:
//! - Per-instance method interception ([`stub`], [`unstub`]) that leaves
//!   sibling instances untouched and restores the original class exactly
//! - Argument-filtered behavior records with deterministic matching
//! - Call-count expectations verified by a [`Session`]
//! - Plain attribute overrides ([`stub_attributes`], [`unstub_attributes`])
//! - Ready-made doubles: [`double`], [`mock`] and the absorbing [`null`]
//!
//! ```
//! use stubydoo::{Class, ObjectRef, Session, Value, args, stub};
//!
//! let class = Class::builder("Store").build();
//! let store = ObjectRef::new(&class);
//!
//! stub(&store, "get").and_return(1);
//! stub(&store, "get").with_args(args![5]).and_return(2);
//! assert_eq!(store.call_method("get", &args![]).unwrap(), Value::Int(1));
//! assert_eq!(store.call_method("get", &args![5]).unwrap(), Value::Int(2));
//!
//! let session = Session::new();
//! let outcome = session.verify(|| {
//!     session.expect(&store, "save").once();
//!     store.call_method("save", &args![])?;
//!     Ok(())
//! });
//! assert!(outcome.is_ok());
//! ```
//!
//! # Threading
//!
//! The engine is single-threaded. Objects, handles and sessions are built on
//! `Rc` and `RefCell`, so they cannot cross threads.

pub mod api;
pub mod behavior;
pub mod config;
pub mod counter;
pub mod dispatch;
pub mod doubles;
pub mod expectation;
pub mod registry;
pub mod session;
pub mod suite;

pub use api::{
    expect, expect_method, is_patched, stub, stub_attributes, stub_method, unstub,
    unstub_attributes, unstub_method,
};
pub use behavior::{Action, Sequence, StubHandle};
pub use config::SessionConfig;
pub use counter::{CallCounter, CountState};
pub use doubles::{DoubleBuilder, Null, double, mock, null};
pub use expectation::Expectation;
pub use session::Session;
pub use suite::TestGroup;

pub use stubydoo_runtime::{
    Arguments, BoundMethod, Class, ClassFlags, Exception, Function, Keywords, Matcher,
    ObjectRef, StubError, StubResult, Unsatisfied, Value, args,
};
