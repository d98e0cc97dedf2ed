//! Class objects.
//!
//! A [`Class`] owns a method table and a class attribute dictionary, and
//! points at an optional base class. Method resolution walks the class
//! first, then its base chain.
//!
//! # Architecture
//!
//! ```text
//! Class
//! ├── id: ClassId (unique per class object)
//! ├── name: Rc<str>
//! ├── base: Option<Rc<Class>>
//! ├── flags: ClassFlags
//! ├── methods: name -> Method
//! └── attrs: name -> Value
//! ```
//!
//! Patch layers are ordinary classes derived from an instance's original
//! class and flagged [`ClassFlags::PATCH_LAYER`]. They carry the same name,
//! so nothing observable changes until a method is defined on them.

use crate::args::Arguments;
use crate::error::StubResult;
use crate::object::ObjectRef;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// Class Identity
// =============================================================================

static NEXT_CLASS_ID: AtomicU32 = AtomicU32::new(1);

/// Unique identifier of a class object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl ClassId {
    fn allocate() -> Self {
        Self(NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// =============================================================================
// Class Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags describing class behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassFlags: u32 {
        /// Private per-instance layer installed by the patch registry.
        const PATCH_LAYER = 1 << 0;
        /// Missing attributes are unexpected accesses, not lookup errors.
        const STRICT_ATTRS = 1 << 1;
        /// Missing attributes and methods yield the instance itself.
        const ABSORBING = 1 << 2;
    }
}

impl ClassFlags {
    /// Flags that decide what happens on a missing attribute.
    pub const POLICY: ClassFlags = ClassFlags::STRICT_ATTRS.union(ClassFlags::ABSORBING);
}

impl Default for ClassFlags {
    fn default() -> Self {
        Self::empty()
    }
}

// =============================================================================
// Methods
// =============================================================================

type MethodBody = dyn Fn(&ObjectRef, &Arguments) -> StubResult<Value>;

/// A method body; receives the receiver and the call arguments.
#[derive(Clone)]
pub struct Method(Rc<MethodBody>);

impl Method {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&ObjectRef, &Arguments) -> StubResult<Value> + 'static,
    {
        Self(Rc::new(body))
    }

    #[inline]
    pub fn call(&self, receiver: &ObjectRef, args: &Arguments) -> StubResult<Value> {
        (self.0)(receiver, args)
    }

    /// Identity comparison.
    #[inline]
    pub fn ptr_eq(&self, other: &Method) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<method at {:p}>", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Result of a method lookup along the base chain.
#[derive(Debug, Clone)]
pub struct MethodSlot {
    /// The method found.
    pub method: Method,
    /// Class whose table holds the method.
    pub defining_class: ClassId,
}

// =============================================================================
// Class
// =============================================================================

/// A class: method table, class attributes and an optional base.
#[derive(Debug)]
pub struct Class {
    id: ClassId,
    name: Rc<str>,
    base: Option<Rc<Class>>,
    flags: ClassFlags,
    methods: RefCell<FxHashMap<String, Method>>,
    attrs: RefCell<FxHashMap<String, Value>>,
}

impl Class {
    /// Create an empty class with no base.
    pub fn new(name: impl Into<Rc<str>>) -> Rc<Self> {
        Self::builder(name).build()
    }

    /// Start building a class.
    pub fn builder(name: impl Into<Rc<str>>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            base: None,
            flags: ClassFlags::empty(),
            methods: FxHashMap::default(),
            attrs: FxHashMap::default(),
        }
    }

    /// Create a patch layer over `base`.
    ///
    /// The layer keeps the base's name and missing-attribute policy, so an
    /// instance moved onto it is indistinguishable until methods are added.
    pub fn derive(base: &Rc<Class>) -> Rc<Self> {
        Rc::new(Self {
            id: ClassId::allocate(),
            name: Rc::clone(&base.name),
            base: Some(Rc::clone(base)),
            flags: (base.flags & ClassFlags::POLICY) | ClassFlags::PATCH_LAYER,
            methods: RefCell::new(FxHashMap::default()),
            attrs: RefCell::new(FxHashMap::default()),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn id(&self) -> ClassId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn base(&self) -> Option<&Rc<Class>> {
        self.base.as_ref()
    }

    #[inline]
    pub fn flags(&self) -> ClassFlags {
        self.flags
    }

    #[inline]
    pub fn is_patch_layer(&self) -> bool {
        self.flags.contains(ClassFlags::PATCH_LAYER)
    }

    // =========================================================================
    // Method Table
    // =========================================================================

    /// Define or replace a method on this class only.
    pub fn set_method(&self, name: impl Into<String>, method: Method) {
        self.methods.borrow_mut().insert(name.into(), method);
    }

    /// Remove a method from this class only.
    pub fn remove_method(&self, name: &str) -> Option<Method> {
        self.methods.borrow_mut().remove(name)
    }

    /// Method defined directly on this class.
    pub fn own_method(&self, name: &str) -> Option<Method> {
        self.methods.borrow().get(name).cloned()
    }

    /// Number of methods defined directly on this class.
    pub fn method_count(&self) -> usize {
        self.methods.borrow().len()
    }

    /// Look up a method by walking the base chain.
    pub fn lookup_method(&self, name: &str) -> Option<MethodSlot> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(method) = class.own_method(name) {
                return Some(MethodSlot {
                    method,
                    defining_class: class.id,
                });
            }
            current = class.base.as_deref();
        }
        None
    }

    // =========================================================================
    // Class Attributes
    // =========================================================================

    pub fn set_attr(&self, name: impl Into<String>, value: Value) {
        self.attrs.borrow_mut().insert(name.into(), value);
    }

    pub fn del_attr(&self, name: &str) -> Option<Value> {
        self.attrs.borrow_mut().remove(name)
    }

    /// Look up a class attribute along the base chain.
    pub fn lookup_attr(&self, name: &str) -> Option<Value> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(value) = class.attrs.borrow().get(name) {
                return Some(value.clone());
            }
            current = class.base.as_deref();
        }
        None
    }
}

// =============================================================================
// Class Builder
// =============================================================================

/// Builder for [`Class`].
pub struct ClassBuilder {
    name: Rc<str>,
    base: Option<Rc<Class>>,
    flags: ClassFlags,
    methods: FxHashMap<String, Method>,
    attrs: FxHashMap<String, Value>,
}

impl ClassBuilder {
    /// Inherit from `base`, including its missing-attribute policy.
    pub fn base(mut self, base: &Rc<Class>) -> Self {
        self.flags |= base.flags & ClassFlags::POLICY;
        self.base = Some(Rc::clone(base));
        self
    }

    pub fn flags(mut self, flags: ClassFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&ObjectRef, &Arguments) -> StubResult<Value> + 'static,
    {
        self.methods.insert(name.into(), Method::new(body));
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Rc<Class> {
        Rc::new(Class {
            id: ClassId::allocate(),
            name: self.name,
            base: self.base,
            flags: self.flags,
            methods: RefCell::new(self.methods),
            attrs: RefCell::new(self.attrs),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
