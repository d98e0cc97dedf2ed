//! Per-instance patch state.
//!
//! [`PatchRegistry`] redirects method resolution for a single instance. On
//! first use it moves the instance onto a private patch layer derived from
//! its original class; each intercepted method becomes a layer method that
//! forwards to the method's [`DispatchSet`]. Sibling instances of the
//! original class never see the layer.
//!
//! When the last intercepted method is removed the instance goes back to its
//! original class and the registry is detached, leaving nothing behind.
//!
//! [`AttributeLedger`] is the separate record of plain attribute overrides;
//! it lives independently of method interception.

use crate::dispatch::DispatchSet;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use stubydoo_runtime::{Class, Method, ObjectRef, Value, WeakObjectRef};
use tracing::debug;

// =============================================================================
// Patch Registry
// =============================================================================

/// Method interceptions active on one instance.
pub struct PatchRegistry {
    instance: WeakObjectRef,
    original_class: Rc<Class>,
    layer: Rc<Class>,
    methods: RefCell<FxHashMap<Rc<str>, Rc<DispatchSet>>>,
}

impl PatchRegistry {
    /// The registry attached to `instance`, if it is patched.
    pub fn of(instance: &ObjectRef) -> Option<Rc<PatchRegistry>> {
        instance.extension::<PatchRegistry>()
    }

    /// Get the instance's registry, patching the instance if needed.
    pub fn ensure(instance: &ObjectRef) -> Rc<PatchRegistry> {
        if let Some(registry) = Self::of(instance) {
            return registry;
        }
        let original_class = instance.class();
        let layer = Class::derive(&original_class);
        instance.set_class(Rc::clone(&layer));

        let registry = Rc::new(PatchRegistry {
            instance: instance.downgrade(),
            original_class,
            layer,
            methods: RefCell::new(FxHashMap::default()),
        });
        instance.insert_extension(Rc::clone(&registry));
        debug!(instance = %instance, "instance patched");
        registry
    }

    #[inline]
    pub fn original_class(&self) -> &Rc<Class> {
        &self.original_class
    }

    /// Names of the intercepted methods, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.borrow().keys().map(|n| n.to_string()).collect();
        names.sort();
        names
    }

    pub fn dispatch_set(&self, method_name: &str) -> Option<Rc<DispatchSet>> {
        self.methods.borrow().get(method_name).cloned()
    }

    // =========================================================================
    // Interception
    // =========================================================================

    /// The dispatch set for `method_name`, installing the interception on
    /// first use.
    pub(crate) fn install(self: &Rc<Self>, method_name: &str) -> Rc<DispatchSet> {
        if let Some(set) = self.dispatch_set(method_name) {
            return set;
        }
        let name: Rc<str> = Rc::from(method_name);
        let set = DispatchSet::new(Rc::clone(&name), Rc::downgrade(self));

        let forward = Rc::clone(&set);
        self.layer
            .set_method(method_name, Method::new(move |_, args| forward.run(args)));
        self.methods.borrow_mut().insert(name, Rc::clone(&set));
        debug!(method = method_name, "method intercepted");
        set
    }

    /// Drop the interception of `method_name` and every record it held.
    ///
    /// Removing the last interception restores the instance.
    pub(crate) fn remove(&self, method_name: &str) {
        let Some(set) = self.methods.borrow_mut().remove(method_name) else {
            return;
        };
        self.layer.remove_method(method_name);
        set.clear();
        debug!(method = method_name, "method interception removed");

        if self.methods.borrow().is_empty() {
            self.restore();
        }
    }

    /// Remove every interception.
    pub(crate) fn unpatch_all(&self) {
        for name in self.method_names() {
            self.remove(&name);
        }
    }

    fn restore(&self) {
        let Some(instance) = self.instance.upgrade() else {
            return;
        };
        let attached = Self::of(&instance).is_some_and(|r| std::ptr::eq(Rc::as_ptr(&r), self));
        if !attached {
            return;
        }
        instance.set_class(Rc::clone(&self.original_class));
        instance.remove_extension::<PatchRegistry>();
        debug!(instance = %instance, "instance restored");
    }

    /// Descriptions of counted records that verification would reject.
    pub(crate) fn unsatisfied(&self) -> Vec<String> {
        let sets: Vec<Rc<DispatchSet>> = {
            let methods = self.methods.borrow();
            let mut names: Vec<&Rc<str>> = methods.keys().collect();
            names.sort();
            names.into_iter().filter_map(|n| methods.get(n).cloned()).collect()
        };
        sets.iter()
            .flat_map(|set| set.records())
            .filter(|record| record.with_counter(|c| !c.is_satisfied()).unwrap_or(false))
            .map(|record| record.describe())
            .collect()
    }
}

impl fmt::Debug for PatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchRegistry")
            .field("class", &self.original_class.name())
            .field("methods", &self.method_names())
            .finish()
    }
}

// =============================================================================
// Attribute Ledger
// =============================================================================

/// What an attribute held before it was first overridden.
#[derive(Debug, Clone)]
pub enum SavedAttribute {
    Present(Value),
    Absent,
}

/// Original values of stubbed plain attributes on one instance.
#[derive(Debug, Default)]
pub struct AttributeLedger {
    saved: RefCell<FxHashMap<String, SavedAttribute>>,
}

impl AttributeLedger {
    /// Override attributes, remembering each one's first original value.
    pub fn stub<I, K>(instance: &ObjectRef, attrs: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let ledger = match instance.extension::<AttributeLedger>() {
            Some(ledger) => ledger,
            None => {
                let ledger = Rc::new(AttributeLedger::default());
                instance.insert_extension(Rc::clone(&ledger));
                ledger
            }
        };
        for (name, value) in attrs {
            let name = name.into();
            ledger
                .saved
                .borrow_mut()
                .entry(name.clone())
                .or_insert_with(|| match instance.own_attr(&name) {
                    Some(original) => SavedAttribute::Present(original),
                    None => SavedAttribute::Absent,
                });
            instance.set_attr(name, value);
        }
    }

    /// Restore overridden attributes; names never stubbed are ignored.
    pub fn unstub<I, K>(instance: &ObjectRef, names: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let Some(ledger) = instance.extension::<AttributeLedger>() else {
            return;
        };
        for name in names {
            let name = name.as_ref();
            let saved = ledger.saved.borrow_mut().remove(name);
            match saved {
                Some(SavedAttribute::Present(original)) => instance.set_attr(name, original),
                Some(SavedAttribute::Absent) => {
                    instance.del_attr(name);
                }
                None => {}
            }
        }
        if ledger.saved.borrow().is_empty() {
            instance.remove_extension::<AttributeLedger>();
        }
    }

    /// Names currently overridden, sorted.
    pub fn stubbed_names(instance: &ObjectRef) -> Vec<String> {
        let Some(ledger) = instance.extension::<AttributeLedger>() else {
            return Vec::new();
        };
        let mut names: Vec<String> = ledger.saved.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stubydoo_runtime::{StubError, args};

    fn service() -> ObjectRef {
        let class = Class::builder("Service")
            .method("ping", |_, _| Ok(Value::from("pong")))
            .build();
        ObjectRef::new(&class)
    }

    // =========================================================================
    // Patching
    // =========================================================================

    #[test]
    fn test_ensure_is_lazy_and_shared() {
        let obj = service();
        assert!(PatchRegistry::of(&obj).is_none());

        let a = PatchRegistry::ensure(&obj);
        let b = PatchRegistry::ensure(&obj);
        assert!(Rc::ptr_eq(&a, &b));
        assert!(obj.class().is_patch_layer());
        assert_eq!(obj.type_name(), "Service");
    }

    #[test]
    fn test_install_and_remove_restores_class() {
        let obj = service();
        let original = obj.class();
        let registry = PatchRegistry::ensure(&obj);
        registry.install("ping");
        assert_eq!(registry.method_names(), vec!["ping".to_string()]);

        // An empty dispatch set answers nothing.
        assert!(matches!(
            obj.call_method("ping", &args![]),
            Err(StubError::UnexpectedCall { .. })
        ));

        registry.remove("ping");
        assert!(Rc::ptr_eq(&obj.class(), &original));
        assert!(PatchRegistry::of(&obj).is_none());
        assert_eq!(obj.extension_count(), 0);
        assert_eq!(obj.call_method("ping", &args![]).unwrap(), Value::from("pong"));
    }

    #[test]
    fn test_install_is_idempotent() {
        let obj = service();
        let registry = PatchRegistry::ensure(&obj);
        let a = registry.install("ping");
        let b = registry.install("ping");
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let obj = service();
        let registry = PatchRegistry::ensure(&obj);
        registry.install("ping");
        registry.remove("other");
        assert!(PatchRegistry::of(&obj).is_some());
    }

    #[test]
    fn test_stale_registry_leaves_new_one_alone() {
        let obj = service();
        let stale = PatchRegistry::ensure(&obj);
        stale.install("ping");
        stale.remove("ping");

        let fresh = PatchRegistry::ensure(&obj);
        fresh.install("ping");
        stale.unpatch_all();
        assert!(PatchRegistry::of(&obj).is_some_and(|r| Rc::ptr_eq(&r, &fresh)));
    }

    // =========================================================================
    // Attribute Ledger
    // =========================================================================

    #[test]
    fn test_attribute_roundtrip() {
        let obj = service();
        obj.set_attr("existing", 1);

        AttributeLedger::stub(&obj, [("existing", Value::from(2)), ("fresh", Value::from(3))]);
        assert_eq!(obj.get_attr("existing").unwrap(), Value::Int(2));
        assert_eq!(obj.get_attr("fresh").unwrap(), Value::Int(3));

        // Second override keeps the first original.
        AttributeLedger::stub(&obj, [("existing", Value::from(4))]);
        assert_eq!(AttributeLedger::stubbed_names(&obj), vec!["existing", "fresh"]);

        AttributeLedger::unstub(&obj, ["existing", "fresh", "never"]);
        assert_eq!(obj.get_attr("existing").unwrap(), Value::Int(1));
        assert!(!obj.has_attr("fresh"));
        assert_eq!(obj.extension_count(), 0);
    }

    #[test]
    fn test_unstub_without_stub_is_noop() {
        let obj = service();
        obj.set_attr("x", 1);
        AttributeLedger::unstub(&obj, ["x"]);
        assert_eq!(obj.get_attr("x").unwrap(), Value::Int(1));
    }
}
