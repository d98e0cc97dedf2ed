//! Free-function entry points.
//!
//! These are the calls test code makes directly: stubbing and unstubbing
//! methods and attributes, and registering expectations with a session.

use crate::behavior::{Behavior, StubHandle};
use crate::expectation::Expectation;
use crate::registry::{AttributeLedger, PatchRegistry};
use crate::session::Session;
use std::rc::Rc;
use stubydoo_runtime::{BoundMethod, ObjectRef, Value};

// =============================================================================
// Record Attachment
// =============================================================================

fn attach(instance: &ObjectRef, method_name: &str, record: Rc<Behavior>) -> Rc<PatchRegistry> {
    let registry = PatchRegistry::ensure(instance);
    registry.install(method_name).add(record);
    registry
}

pub(crate) fn attach_counted(
    instance: &ObjectRef,
    method_name: &str,
) -> (Rc<PatchRegistry>, Rc<Behavior>) {
    let record = Behavior::counted(Rc::from(method_name), instance.downgrade());
    let registry = attach(instance, method_name, Rc::clone(&record));
    (registry, record)
}

// =============================================================================
// Methods
// =============================================================================

/// Intercept `method_name` on `instance` only.
///
/// The method need not exist beforehand. Until configured, the new record
/// answers every call not claimed by a filtered record with `None`.
pub fn stub(instance: &ObjectRef, method_name: &str) -> StubHandle {
    let record = Behavior::new(Rc::from(method_name), instance.downgrade());
    attach(instance, method_name, Rc::clone(&record));
    StubHandle(record)
}

/// Intercept the method behind a method reference.
pub fn stub_method(method: &BoundMethod) -> StubHandle {
    stub(method.receiver(), method.name())
}

/// Remove every record for the referenced method, restoring it.
pub fn unstub(method: &BoundMethod) {
    unstub_method(method.receiver(), method.name());
}

/// Remove every record for `method_name`; no-op if it was never stubbed.
pub fn unstub_method(instance: &ObjectRef, method_name: &str) {
    if let Some(registry) = PatchRegistry::of(instance) {
        registry.remove(method_name);
    }
}

/// Whether any method of `instance` is currently intercepted.
pub fn is_patched(instance: &ObjectRef) -> bool {
    PatchRegistry::of(instance).is_some()
}

// =============================================================================
// Attributes
// =============================================================================

/// Override plain attributes, remembering their original values.
pub fn stub_attributes<I, K>(instance: &ObjectRef, attrs: I)
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    AttributeLedger::stub(instance, attrs);
}

/// Restore attributes overridden by [`stub_attributes`].
///
/// Attributes that did not exist before are deleted again; names never
/// stubbed are ignored.
pub fn unstub_attributes<I, K>(instance: &ObjectRef, names: I)
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    AttributeLedger::unstub(instance, names);
}

// =============================================================================
// Expectations
// =============================================================================

/// Same as [`Session::expect`].
pub fn expect(session: &Session, instance: &ObjectRef, method_name: &str) -> Expectation {
    session.expect(instance, method_name)
}

/// Same as [`Session::expect_method`].
pub fn expect_method(session: &Session, method: &BoundMethod) -> Expectation {
    session.expect_method(method)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stubydoo_runtime::{Class, StubError, args};

    fn object() -> ObjectRef {
        let class = Class::builder("Repo")
            .method("load", |_, args| Ok(args.get(0).cloned().unwrap_or_default()))
            .build();
        ObjectRef::new(&class)
    }

    #[test]
    fn test_stub_defaults_to_none() {
        let o = object();
        stub(&o, "load");
        assert_eq!(o.call_method("load", &args![1]).unwrap(), Value::None);
    }

    #[test]
    fn test_unstub_restores_real_method() {
        let o = object();
        stub(&o, "load").and_return(0);
        assert_eq!(o.call_method("load", &args![7]).unwrap(), Value::Int(0));

        unstub(&o.bound_method("load").unwrap());
        assert_eq!(o.call_method("load", &args![7]).unwrap(), Value::Int(7));
        assert!(!is_patched(&o));
    }

    #[test]
    fn test_unstub_never_stubbed_is_silent() {
        let o = object();
        unstub_method(&o, "load");
        unstub_method(&o, "missing");
        assert!(!is_patched(&o));
    }

    #[test]
    fn test_stub_unknown_method_then_unstub() {
        let o = object();
        stub(&o, "save").and_return(true);
        assert_eq!(o.call_method("save", &args![]).unwrap(), Value::Bool(true));
        unstub_method(&o, "save");
        assert!(matches!(
            o.call_method("save", &args![]),
            Err(StubError::AttributeError { .. })
        ));
    }

    #[test]
    fn test_stub_method_reference() {
        let o = object();
        let load = o.bound_method("load").unwrap();
        stub_method(&load).and_return("stubbed");
        assert_eq!(load.call(&args![]).unwrap(), Value::from("stubbed"));
    }
}
