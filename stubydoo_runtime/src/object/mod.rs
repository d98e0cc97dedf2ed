//! Instances and references to them.
//!
//! An [`ObjectRef`] is a shared handle to one instance. Each instance holds
//! its current class, an attribute dictionary, and a set of hidden typed
//! extensions. Extensions let other crates attach private state to an
//! instance without it ever showing up through attribute access.
//!
//! Calls resolve in this order:
//! 1. a method found along the class chain (so a patch layer shadows the
//!    real method),
//! 2. a callable stored as an instance or class attribute,
//! 3. the class's missing-attribute policy.

pub mod class;

pub use class::{Class, ClassBuilder, ClassFlags, ClassId, Method, MethodSlot};

use crate::args::Arguments;
use crate::error::{StubError, StubResult};
use crate::value::{Function, Value};
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

// =============================================================================
// Object Storage
// =============================================================================

struct ObjectData {
    class: Rc<Class>,
    attrs: FxHashMap<String, Value>,
    extensions: FxHashMap<TypeId, Rc<dyn Any>>,
}

/// Identity of an instance, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

// =============================================================================
// ObjectRef
// =============================================================================

/// Shared handle to an instance.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<ObjectData>>);

impl ObjectRef {
    /// Instantiate `class` with an empty attribute dictionary.
    pub fn new(class: &Rc<Class>) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            class: Rc::clone(class),
            attrs: FxHashMap::default(),
            extensions: FxHashMap::default(),
        })))
    }

    /// Instantiate `class` with initial attributes.
    pub fn with_attrs<I, K>(class: &Rc<Class>, attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let object = Self::new(class);
        {
            let mut data = object.0.borrow_mut();
            data.attrs
                .extend(attrs.into_iter().map(|(name, value)| (name.into(), value)));
        }
        object
    }

    // =========================================================================
    // Identity & Class
    // =========================================================================

    #[inline]
    pub fn id(&self) -> ObjectId {
        ObjectId(Rc::as_ptr(&self.0) as *const () as usize)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The instance's current class.
    #[inline]
    pub fn class(&self) -> Rc<Class> {
        Rc::clone(&self.0.borrow().class)
    }

    /// Move the instance onto another class.
    pub fn set_class(&self, class: Rc<Class>) {
        self.0.borrow_mut().class = class;
    }

    /// Name of the instance's class.
    pub fn type_name(&self) -> String {
        self.0.borrow().class.name().to_string()
    }

    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Rc::downgrade(&self.0))
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Read an attribute.
    ///
    /// Instance attributes win over class attributes; methods come back as
    /// functions bound to this instance.
    pub fn get_attr(&self, name: &str) -> StubResult<Value> {
        if let Some(value) = self.own_attr(name) {
            return Ok(value);
        }
        let class = self.class();
        if let Some(value) = class.lookup_attr(name) {
            return Ok(value);
        }
        if let Some(slot) = class.lookup_method(name) {
            let receiver = self.clone();
            let method = slot.method;
            return Ok(Value::Function(Function::new(move |args| {
                method.call(&receiver, args)
            })));
        }
        self.missing(&class, name)
    }

    /// Write an instance attribute.
    pub fn set_attr(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().attrs.insert(name.into(), value.into());
    }

    /// Delete an instance attribute, returning it.
    pub fn del_attr(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().attrs.remove(name)
    }

    /// Whether attribute lookup would find something without falling back
    /// on the missing-attribute policy.
    pub fn has_attr(&self, name: &str) -> bool {
        if self.0.borrow().attrs.contains_key(name) {
            return true;
        }
        let class = self.class();
        class.lookup_attr(name).is_some() || class.lookup_method(name).is_some()
    }

    /// The instance's own attribute, ignoring class attributes and methods.
    pub fn own_attr(&self, name: &str) -> Option<Value> {
        self.0.borrow().attrs.get(name).cloned()
    }

    /// Names of the instance's own attributes, sorted.
    pub fn attr_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.borrow().attrs.keys().cloned().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Call a method by name.
    pub fn call_method(&self, name: &str, args: &Arguments) -> StubResult<Value> {
        let class = self.class();
        if let Some(slot) = class.lookup_method(name) {
            return slot.method.call(self, args);
        }
        if let Some(value) = self.own_attr(name).or_else(|| class.lookup_attr(name)) {
            return value.call(args);
        }
        self.missing(&class, name)
    }

    /// Call the instance itself, through `__call__`.
    pub fn call(&self, args: &Arguments) -> StubResult<Value> {
        self.call_method("__call__", args)
    }

    /// Reference a method of this instance.
    ///
    /// Fails like attribute access when the name resolves to nothing, and
    /// with a type error when it resolves to a non-callable value.
    pub fn bound_method(&self, name: &str) -> StubResult<BoundMethod> {
        let bound = BoundMethod {
            receiver: self.clone(),
            name: Rc::from(name),
        };
        let class = self.class();
        if class.lookup_method(name).is_some() {
            return Ok(bound);
        }
        match self.own_attr(name).or_else(|| class.lookup_attr(name)) {
            Some(value) if value.is_callable() => Ok(bound),
            Some(value) => Err(StubError::type_error(format!(
                "'{}' object is not callable",
                value.type_name()
            ))),
            None if class.flags().contains(ClassFlags::ABSORBING) => Ok(bound),
            None => self.missing(&class, name).map(|_| bound),
        }
    }

    fn missing(&self, class: &Class, name: &str) -> StubResult<Value> {
        let flags = class.flags();
        if flags.contains(ClassFlags::ABSORBING) {
            Ok(Value::Object(self.clone()))
        } else if flags.contains(ClassFlags::STRICT_ATTRS) {
            Err(StubError::UnexpectedAttributeAccess {
                type_name: class.name().to_string(),
                attr: name.to_string(),
            })
        } else {
            Err(StubError::AttributeError {
                type_name: class.name().to_string(),
                attr: name.to_string(),
            })
        }
    }

    // =========================================================================
    // Hidden Extensions
    // =========================================================================

    /// Fetch the extension of type `T`, if attached.
    pub fn extension<T: Any>(&self) -> Option<Rc<T>> {
        let data = self.0.borrow();
        let ext = data.extensions.get(&TypeId::of::<T>())?;
        Rc::clone(ext).downcast::<T>().ok()
    }

    /// Attach an extension, replacing any previous one of the same type.
    pub fn insert_extension<T: Any>(&self, ext: Rc<T>) {
        self.0
            .borrow_mut()
            .extensions
            .insert(TypeId::of::<T>(), ext as Rc<dyn Any>);
    }

    /// Detach the extension of type `T`.
    pub fn remove_extension<T: Any>(&self) -> Option<Rc<T>> {
        let ext = self.0.borrow_mut().extensions.remove(&TypeId::of::<T>())?;
        ext.downcast::<T>().ok()
    }

    /// Number of attached extensions.
    pub fn extension_count(&self) -> usize {
        self.0.borrow().extensions.len()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} object at {:#x}>", self.type_name(), self.id().0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &ObjectRef) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

// =============================================================================
// WeakObjectRef
// =============================================================================

/// Non-owning handle to an instance.
#[derive(Clone)]
pub struct WeakObjectRef(Weak<RefCell<ObjectData>>);

impl WeakObjectRef {
    #[inline]
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }
}

impl fmt::Debug for WeakObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(object) => write!(f, "Weak({})", object),
            None => write!(f, "Weak(<dropped>)"),
        }
    }
}

// =============================================================================
// BoundMethod
// =============================================================================

/// A method name together with the instance it belongs to.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    receiver: ObjectRef,
    name: Rc<str>,
}

impl BoundMethod {
    #[inline]
    pub fn receiver(&self) -> &ObjectRef {
        &self.receiver
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke through the receiver's current resolution.
    pub fn call(&self, args: &Arguments) -> StubResult<Value> {
        self.receiver.call_method(&self.name, args)
    }
}

impl fmt::Display for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<bound method {}.{} of {}>", self.receiver.type_name(), self.name, self.receiver)
    }
}

// =============================================================================
// Tests
// =============================================================================
