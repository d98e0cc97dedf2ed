//! Dynamic object model for stubydoo.
//!
//! This crate provides:
//! - Dynamic values ([`Value`]) with structural, identity and matcher equality
//! - Argument snapshots ([`Arguments`]) and the [`args!`] macro
//! - Classes with method tables and a base chain ([`Class`])
//! - Shared instance handles with hidden typed extensions ([`ObjectRef`])
//! - The error taxonomy shared with the engine ([`StubError`])
//!
//! Everything here is single-threaded: handles are `Rc`-based and neither
//! `Send` nor `Sync`.

pub mod args;
pub mod error;
pub mod object;
pub mod value;

pub use args::{Arguments, Keywords, Positional};
pub use error::{Exception, StubError, StubResult, Unsatisfied};
pub use object::{
    BoundMethod, Class, ClassBuilder, ClassFlags, ClassId, Method, MethodSlot, ObjectId,
    ObjectRef, WeakObjectRef,
};
pub use value::{Function, Matcher, SeqIter, Value};
