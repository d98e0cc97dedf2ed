//! Argument snapshots.
//!
//! [`Arguments`] captures one call's positional and keyword arguments. It
//! doubles as the argument filter stored on a behavior record: a filter
//! matches a call when the two snapshots compare equal, with each value's
//! own equality (matchers included) deciding element comparisons.

use crate::value::Value;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Inline storage for positional arguments; most calls pass few.
pub type Positional = SmallVec<[Value; 4]>;

// =============================================================================
// Keywords
// =============================================================================

/// Keyword arguments of a snapshot.
///
/// Calls always produce an exact [`Keywords::Map`]. Filters may instead hold
/// a single value (usually a matcher) compared against the whole mapping.
#[derive(Debug, Clone)]
pub enum Keywords {
    /// Exact mapping, compared key set and values.
    Map(BTreeMap<String, Value>),
    /// Loose comparison against the whole mapping.
    Matching(Value),
}

impl Keywords {
    /// An empty exact mapping.
    #[inline]
    pub fn empty() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// The exact mapping, if this is one.
    #[inline]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            Self::Matching(_) => None,
        }
    }

    /// Consume into the exact mapping, if this is one.
    #[inline]
    pub fn into_map(self) -> Option<BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            Self::Matching(_) => None,
        }
    }

    /// Whether there are no keyword arguments.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Map(map) => map.is_empty(),
            Self::Matching(_) => false,
        }
    }
}

impl Default for Keywords {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Keywords {
    fn eq(&self, other: &Keywords) -> bool {
        match (self, other) {
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Matching(a), Self::Matching(b)) => a == b,
            (Self::Matching(m), Self::Map(map)) | (Self::Map(map), Self::Matching(m)) => {
                *m == Value::Dict(Rc::new(map.clone()))
            }
        }
    }
}

impl From<BTreeMap<String, Value>> for Keywords {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

impl From<Value> for Keywords {
    fn from(value: Value) -> Self {
        match value {
            Value::Dict(map) => Self::Map((*map).clone()),
            other => Self::Matching(other),
        }
    }
}

impl<K: Into<String>, const N: usize> From<[(K, Value); N]> for Keywords {
    fn from(entries: [(K, Value); N]) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

// =============================================================================
// Arguments
// =============================================================================

/// Positional and keyword arguments of a single call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    positional: Positional,
    keyword: Keywords,
}

impl Arguments {
    /// No arguments.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parts.
    pub fn from_parts(positional: impl IntoIterator<Item = Value>, keyword: Keywords) -> Self {
        Self {
            positional: positional.into_iter().collect(),
            keyword,
        }
    }

    /// Split into parts.
    #[inline]
    pub fn into_parts(self) -> (Positional, Keywords) {
        (self.positional, self.keyword)
    }

    /// Append a positional argument.
    #[inline]
    pub fn push(&mut self, value: impl Into<Value>) {
        self.positional.push(value.into());
    }

    /// Set a keyword argument.
    ///
    /// A keyword matcher is replaced by an exact mapping holding only this
    /// entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        match &mut self.keyword {
            Keywords::Map(map) => {
                map.insert(key.into(), value.into());
            }
            Keywords::Matching(_) => {
                let mut map = BTreeMap::new();
                map.insert(key.into(), value.into());
                self.keyword = Keywords::Map(map);
            }
        }
    }

    /// Builder form of [`Arguments::push`].
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.push(value);
        self
    }

    /// Builder form of [`Arguments::insert`].
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Replace the keyword part, keeping positional arguments.
    pub fn with_keywords(mut self, keyword: impl Into<Keywords>) -> Self {
        self.keyword = keyword.into();
        self
    }

    #[inline]
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    #[inline]
    pub fn keyword(&self) -> &Keywords {
        &self.keyword
    }

    /// Look up a positional argument.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Look up a keyword argument in an exact mapping.
    #[inline]
    pub fn get_kw(&self, key: &str) -> Option<&Value> {
        self.keyword.as_map().and_then(|map| map.get(key))
    }

    /// Whether the call passed nothing at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Total argument count (a keyword matcher counts as one).
    pub fn len(&self) -> usize {
        let keywords = match &self.keyword {
            Keywords::Map(map) => map.len(),
            Keywords::Matching(_) => 1,
        };
        self.positional.len() + keywords
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        let mut first = true;
        for value in &self.positional {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}", value)?;
        }
        match &self.keyword {
            Keywords::Map(map) => {
                for (key, value) in map {
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{}={}", key, value)?;
                }
            }
            Keywords::Matching(matcher) => {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "**{}", matcher)?;
            }
        }
        write!(f, ")")
    }
}

impl<V: Into<Value>> FromIterator<V> for Arguments {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            positional: iter.into_iter().map(Into::into).collect(),
            keyword: Keywords::empty(),
        }
    }
}

/// Build an [`Arguments`] snapshot.
///
/// Positional values come first; keyword pairs follow a `;`.
///
/// ```
/// use stubydoo_runtime::{args, Value};
///
/// let a = args![1, "two"; flag = true];
/// assert_eq!(a.get(1), Some(&Value::from("two")));
/// assert_eq!(a.get_kw("flag"), Some(&Value::from(true)));
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Arguments::new()
    };
    ($($pos:expr),* ; $($key:ident = $val:expr),+ $(,)?) => {{
        #[allow(unused_mut)]
        let mut arguments = $crate::Arguments::new();
        $( arguments.push($crate::Value::from($pos)); )*
        $( arguments.insert(stringify!($key), $crate::Value::from($val)); )+
        arguments
    }};
    ($($pos:expr),+ $(,)?) => {{
        let mut arguments = $crate::Arguments::new();
        $( arguments.push($crate::Value::from($pos)); )+
        arguments
    }};
}

// =============================================================================
// Tests
// =============================================================================
