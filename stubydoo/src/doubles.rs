//! Ready-made test doubles.
//!
//! - [`double`]: an inert value holder.
//! - [`mock`]: like a double, but touching anything undeclared is an
//!   unexpected attribute access.
//! - [`null`]: absorbs every operation and evaluates to itself.
//!
//! [`DoubleBuilder`] pre-declares attributes and methods for any of the
//! three. Declared methods live on the double's own class, so they can be
//! stubbed through a method reference like any real method.

use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitXor, Deref, Div, Mul, Neg, Not, Rem, Shl, Shr, Sub};
use stubydoo_runtime::{Arguments, Class, ClassFlags, Method, ObjectRef, StubResult, Value};

// =============================================================================
// Builder
// =============================================================================

/// Declares the attributes and methods of a double.
#[derive(Default)]
pub struct DoubleBuilder {
    attrs: Vec<(String, Value)>,
    methods: Vec<(String, Method)>,
}

impl DoubleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Declare a method; `body` receives the call arguments.
    pub fn method<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Arguments) -> StubResult<Value> + 'static,
    {
        self.methods
            .push((name.into(), Method::new(move |_, args| body(args))));
        self
    }

    fn build(self, name: &str, flags: ClassFlags) -> ObjectRef {
        let class = Class::builder(name).flags(flags).build();
        for (method_name, method) in self.methods {
            class.set_method(method_name, method);
        }
        ObjectRef::with_attrs(&class, self.attrs)
    }

    pub fn double(self) -> ObjectRef {
        self.build("double", ClassFlags::empty())
    }

    pub fn mock(self) -> ObjectRef {
        self.build("mock", ClassFlags::STRICT_ATTRS)
    }

    pub fn null(self) -> Null {
        Null(self.build("null", ClassFlags::ABSORBING))
    }
}

impl fmt::Debug for DoubleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoubleBuilder")
            .field("attrs", &self.attrs)
            .field("methods", &self.methods.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

/// An inert double with no declared members.
pub fn double() -> ObjectRef {
    DoubleBuilder::new().double()
}

/// A strict double with no declared members.
pub fn mock() -> ObjectRef {
    DoubleBuilder::new().mock()
}

/// An absorbing null object.
pub fn null() -> Null {
    DoubleBuilder::new().null()
}

// =============================================================================
// Null Object
// =============================================================================

/// A value that absorbs every operation and always yields itself.
///
/// Operators, attribute and item access, and calls all return a handle to
/// the same instance. Attribute writes are stored; reading an attribute that
/// was never written (or was deleted) yields the null itself.
#[derive(Clone)]
pub struct Null(ObjectRef);

impl Null {
    /// The underlying object.
    #[inline]
    pub fn object(&self) -> &ObjectRef {
        &self.0
    }

    /// Identity with another null.
    #[inline]
    pub fn is(&self, other: &Null) -> bool {
        self.0.ptr_eq(&other.0)
    }

    /// Read an attribute; unknown names yield the null itself.
    pub fn get_attr(&self, name: &str) -> Value {
        self.0
            .get_attr(name)
            .unwrap_or_else(|_| Value::Object(self.0.clone()))
    }

    pub fn set_attr(&self, name: impl Into<String>, value: impl Into<Value>) -> Null {
        self.0.set_attr(name, value);
        self.clone()
    }

    pub fn del_attr(&self, name: &str) -> Null {
        self.0.del_attr(name);
        self.clone()
    }

    pub fn item(&self, _key: impl Into<Value>) -> Null {
        self.clone()
    }

    pub fn set_item(&self, _key: impl Into<Value>, _value: impl Into<Value>) -> Null {
        self.clone()
    }

    pub fn del_item(&self, _key: impl Into<Value>) -> Null {
        self.clone()
    }

    pub fn call(&self, _args: &Arguments) -> Null {
        self.clone()
    }

    pub fn pos(&self) -> Null {
        self.clone()
    }

    pub fn abs(&self) -> Null {
        self.clone()
    }

    pub fn pow<Rhs>(&self, _exponent: Rhs) -> Null {
        self.clone()
    }

    pub fn floor_div<Rhs>(&self, _rhs: Rhs) -> Null {
        self.clone()
    }

    pub fn invert(&self) -> Null {
        self.clone()
    }
}

impl Deref for Null {
    type Target = ObjectRef;

    fn deref(&self) -> &ObjectRef {
        &self.0
    }
}

impl fmt::Debug for Null {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Null({})", self.0)
    }
}

impl fmt::Display for Null {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl PartialEq for Null {
    fn eq(&self, other: &Null) -> bool {
        self.is(other)
    }
}

impl From<Null> for Value {
    fn from(null: Null) -> Value {
        Value::Object(null.0)
    }
}

impl From<&Null> for Value {
    fn from(null: &Null) -> Value {
        Value::Object(null.0.clone())
    }
}

impl From<Null> for ObjectRef {
    fn from(null: Null) -> ObjectRef {
        null.0
    }
}

/// Binary operators: `null op anything` and `&null op anything`.
macro_rules! absorb_binary {
    ($($trait:ident :: $method:ident),* $(,)?) => {$(
        impl<Rhs> $trait<Rhs> for Null {
            type Output = Null;

            #[inline]
            fn $method(self, _rhs: Rhs) -> Null {
                self
            }
        }

        impl<Rhs> $trait<Rhs> for &Null {
            type Output = Null;

            #[inline]
            fn $method(self, _rhs: Rhs) -> Null {
                self.clone()
            }
        }
    )*};
}

/// Reflected operators: `primitive op null`.
macro_rules! absorb_reflected {
    (@ops $prim:ty; $($trait:ident :: $method:ident),*) => {$(
        impl $trait<Null> for $prim {
            type Output = Null;

            #[inline]
            fn $method(self, rhs: Null) -> Null {
                rhs
            }
        }
    )*};
    ($($prim:ty),*) => {$(
        absorb_reflected!(@ops $prim;
            Add::add, Sub::sub, Mul::mul, Div::div, Rem::rem,
            BitAnd::bitand, BitOr::bitor, BitXor::bitxor, Shl::shl, Shr::shr);
    )*};
}

absorb_binary!(
    Add::add,
    Sub::sub,
    Mul::mul,
    Div::div,
    Rem::rem,
    BitAnd::bitand,
    BitOr::bitor,
    BitXor::bitxor,
    Shl::shl,
    Shr::shr,
);

absorb_reflected!(i32, i64, u32, u64, usize, f64, bool);

impl Neg for Null {
    type Output = Null;

    fn neg(self) -> Null {
        self
    }
}

impl Not for Null {
    type Output = Null;

    fn not(self) -> Null {
        self
    }
}

impl Neg for &Null {
    type Output = Null;

    fn neg(self) -> Null {
        self.clone()
    }
}

impl Not for &Null {
    type Output = Null;

    fn not(self) -> Null {
        self.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
