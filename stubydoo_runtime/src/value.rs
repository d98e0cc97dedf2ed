//! Dynamic values flowing through intercepted calls.
//!
//! A [`Value`] is what stubbed methods receive as arguments and hand back as
//! results. Scalars and containers compare structurally; objects, functions
//! and iterators compare by identity. A [`Matcher`] on either side of a
//! comparison decides the outcome, which is how callers plug loose argument
//! matching into the exact-equality filter pipeline.

use crate::args::Arguments;
use crate::error::{StubError, StubResult};
use crate::object::ObjectRef;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

// =============================================================================
// Matcher
// =============================================================================

/// A value whose equality is intentionally loose.
///
/// Implementations decide whether an actual argument is acceptable. Two
/// matchers compare equal when they are the same instance or when their
/// descriptions agree, so re-registering an identical matcher filter
/// replaces the earlier one.
pub trait Matcher {
    /// Whether `actual` satisfies this matcher.
    fn matches(&self, actual: &Value) -> bool;

    /// Human readable description, also used for matcher-to-matcher equality.
    fn describe(&self) -> String;
}

// =============================================================================
// Function
// =============================================================================

type FunctionBody = dyn Fn(&Arguments) -> StubResult<Value>;

/// A callable value: callbacks, sequence producers, lambda attributes.
#[derive(Clone)]
pub struct Function(Rc<FunctionBody>);

impl Function {
    /// Wrap a closure.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&Arguments) -> StubResult<Value> + 'static,
    {
        Self(Rc::new(body))
    }

    /// Invoke with the given arguments.
    #[inline]
    pub fn call(&self, args: &Arguments) -> StubResult<Value> {
        (self.0)(args)
    }

    /// Identity comparison.
    #[inline]
    pub fn ptr_eq(&self, other: &Function) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function at {:p}>", Rc::as_ptr(&self.0) as *const ())
    }
}

// =============================================================================
// Lazy Sequences
// =============================================================================

/// A shared, lazily evaluated sequence of values.
///
/// Clones share the same cursor, mirroring how a generator object behaves
/// when passed around.
#[derive(Clone)]
pub struct SeqIter(Rc<RefCell<Box<dyn Iterator<Item = Value>>>>);

impl SeqIter {
    /// Wrap any iterator of values.
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: 'static,
    {
        Self(Rc::new(RefCell::new(Box::new(items.into_iter()))))
    }

    /// Identity comparison.
    #[inline]
    pub fn ptr_eq(&self, other: &SeqIter) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Iterator for SeqIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.0.borrow_mut().next()
    }
}

impl fmt::Debug for SeqIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<iterator at {:p}>", Rc::as_ptr(&self.0))
    }
}

// =============================================================================
// Value
// =============================================================================

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Dict(Rc<BTreeMap<String, Value>>),
    Object(ObjectRef),
    Function(Function),
    Iter(SeqIter),
    Matcher(Rc<dyn Matcher>),
}

impl Value {
    /// Build a list value.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a dict value.
    pub fn dict<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Dict(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Wrap a closure as a callable value.
    pub fn function<F>(body: F) -> Self
    where
        F: Fn(&Arguments) -> StubResult<Value> + 'static,
    {
        Self::Function(Function::new(body))
    }

    /// Wrap an iterator as a lazy sequence value.
    pub fn iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: 'static,
    {
        Self::Iter(SeqIter::new(items))
    }

    /// Wrap a matcher.
    pub fn matcher<M: Matcher + 'static>(matcher: M) -> Self {
        Self::Matcher(Rc::new(matcher))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[inline]
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Whether calling this value can succeed.
    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_) | Self::Object(_))
    }

    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Self::None => "NoneType".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) => "int".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Str(_) => "str".to_string(),
            Self::List(_) => "list".to_string(),
            Self::Dict(_) => "dict".to_string(),
            Self::Object(o) => o.type_name(),
            Self::Function(_) => "function".to_string(),
            Self::Iter(_) => "iterator".to_string(),
            Self::Matcher(_) => "matcher".to_string(),
        }
    }

    // =========================================================================
    // Behavior
    // =========================================================================

    /// Call this value.
    pub fn call(&self, args: &Arguments) -> StubResult<Value> {
        match self {
            Self::Function(f) => f.call(args),
            Self::Object(o) => o.call(args),
            other => Err(StubError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    /// Drain a sequence value into a vector.
    ///
    /// Iterators are consumed; lists are copied.
    pub fn collect_items(&self) -> StubResult<Vec<Value>> {
        match self {
            Self::Iter(it) => Ok(it.clone().collect()),
            Self::List(items) => Ok(items.to_vec()),
            other => Err(StubError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Identity test.
    ///
    /// Reference values are identical only when they share an allocation;
    /// scalars are identical when equal.
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Iter(a), Self::Iter(b)) => a.ptr_eq(b),
            (Self::Matcher(a), Self::Matcher(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

// =============================================================================
// Equality
// =============================================================================

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Matcher(a), Self::Matcher(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)) || a.describe() == b.describe()
            }
            (Self::Matcher(m), actual) | (actual, Self::Matcher(m)) => m.matches(actual),
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Iter(a), Self::Iter(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

// =============================================================================
// Formatting
// =============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}': {}", key, value)?;
                }
                write!(f, "}}")
            }
            Self::Object(o) => write!(f, "{}", o),
            Self::Function(func) => write!(f, "{:?}", func),
            Self::Iter(it) => write!(f, "{:?}", it),
            Self::Matcher(m) => write!(f, "<{}>", m.describe()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::None
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! int_conversions {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(i: $ty) -> Self {
                    Self::Int(i as i64)
                }
            }
        )*
    };
}

int_conversions!(i8, i16, i32, i64, u8, u16, u32, usize);

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(Rc::from(items))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self::Dict(Rc::new(entries))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Self::Object(o)
    }
}

impl From<&ObjectRef> for Value {
    fn from(o: &ObjectRef) -> Self {
        Self::Object(o.clone())
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl From<SeqIter> for Value {
    fn from(it: SeqIter) -> Self {
        Self::Iter(it)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::None, Into::into)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    struct StartsWith(&'static str);

    impl Matcher for StartsWith {
        fn matches(&self, actual: &Value) -> bool {
            actual.as_str().is_some_and(|s| s.starts_with(self.0))
        }

        fn describe(&self) -> String {
            format!("starts with {:?}", self.0)
        }
    }

    // =========================================================================
    // Equality Tests
    // =========================================================================

    #[test]
    fn test_scalar_equality() {
        assert_eq!(Value::from(1), Value::Int(1));
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_eq!(Value::None, Value::from(()));
        assert_ne!(Value::None, Value::from(false));
    }

    #[test]
    fn test_container_equality_is_structural() {
        let a = Value::list([1, 2, 3]);
        let b = Value::list([1, 2, 3]);
        assert_eq!(a, b);
        assert!(!a.is(&b));
        assert!(a.is(&a.clone()));

        let d1 = Value::dict([("x", Value::from(1))]);
        let d2 = Value::dict([("x", Value::from(1))]);
        let d3 = Value::dict([("x", Value::from(1)), ("y", Value::from(2))]);
        assert_eq!(d1, d2);
        assert_ne!(d1, d3);
    }

    #[test]
    fn test_matcher_decides_either_side() {
        let m = Value::matcher(StartsWith("ab"));
        assert_eq!(m, Value::from("abc"));
        assert_eq!(Value::from("abc"), m);
        assert_ne!(m, Value::from("xbc"));
        assert_ne!(m, Value::from(1));
    }

    #[test]
    fn test_matchers_compare_by_description() {
        let a = Value::matcher(StartsWith("ab"));
        let b = Value::matcher(StartsWith("ab"));
        let c = Value::matcher(StartsWith("cd"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_functions_compare_by_identity() {
        let f = Value::function(|_| Ok(Value::None));
        let g = Value::function(|_| Ok(Value::None));
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }

    // =========================================================================
    // Behavior Tests
    // =========================================================================

    #[test]
    fn test_call_function_value() {
        let f = Value::function(|args| Ok(Value::from(args.positional().len())));
        assert_eq!(f.call(&args![1, 2]).unwrap(), Value::from(2));
    }

    #[test]
    fn test_call_non_callable() {
        let err = Value::from(3).call(&args![]).unwrap_err();
        assert!(matches!(err, StubError::TypeError { .. }));
        assert!(err.to_string().contains("'int' object is not callable"));
    }

    #[test]
    fn test_iter_is_lazy_and_shared() {
        let it = Value::iter(vec![Value::from(1), Value::from(2)]);
        let Value::Iter(mut cursor) = it.clone() else {
            panic!("expected iterator");
        };
        assert_eq!(cursor.next(), Some(Value::from(1)));
        assert_eq!(it.collect_items().unwrap(), vec![Value::from(2)]);
    }

    #[test]
    fn test_display_repr() {
        assert_eq!(Value::from("it's").to_string(), "'it\\'s'");
        assert_eq!(Value::list([1, 2]).to_string(), "[1, 2]");
        assert_eq!(
            Value::dict([("k", Value::from(true))]).to_string(),
            "{'k': True}"
        );
        assert_eq!(Value::from(1.5).to_string(), "1.5");
    }
}
