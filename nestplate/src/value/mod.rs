//! Provides the context value type.
//!
//! A [`Value`] is what templates are rendered against: a tree of mappings,
//! sequences and scalars.  Values are usually not created by hand but from
//! already parsed data, either through serde serialization
//! ([`Value::from_serialize`]) or by deserializing a document straight into
//! a value:
//!
//! ```
//! # use nestplate::value::Value;
//! let value: Value = serde_json::from_str(r#"{"person": {"name": "John"}}"#).unwrap();
//! assert_eq!(value.get_attr("person").and_then(|x| x.get_attr("name")),
//!            Some(&Value::from("John")));
//! ```
//!
//! # Basic Value Conversions
//!
//! Values can also be created via the [`From`] trait:
//!
//! ```
//! # use nestplate::value::Value;
//! let int_value = Value::from(42);
//! let none_value = Value::from(());
//! let true_value = Value::from(true);
//! let seq_value = Value::from(vec!["Python", "Java", "SQL"]);
//! ```
//!
//! Or via the [`FromIterator`] trait:
//!
//! ```
//! # use nestplate::value::Value;
//! // collection into a sequence
//! let value: Value = (1..10).collect();
//!
//! // collection into a map
//! let value: Value = [("key", "value")].into_iter().collect();
//! ```
//!
//! The special [`Undefined`](Value::UNDEFINED) value also exists but does not
//! have a rust equivalent.  It's what lookups of missing paths produce.
//!
//! # Memory Management
//!
//! Values are immutable and internally reference counted which means they
//! can be cloned cheaply.  Since a value can only ever be assembled from
//! values that already exist, value trees cannot contain cycles.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

pub use crate::value::serialize::ValueSerializer;

mod convert;
mod deserialize;
mod serialize;

/// The map type backing mapping values.
///
/// Keys are always strings and iteration follows insertion order.
pub type ValueMap = IndexMap<Arc<str>, Value>;

/// Describes the kind of value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ValueKind {
    /// The value is undefined
    Undefined,
    /// The value is the none singleton (`()`)
    None,
    /// The value is a [`bool`]
    Bool,
    /// The value is a number of a supported type.
    Number,
    /// The value is a string.
    String,
    /// The value is a sequence of other values.
    Seq,
    /// The value is a key/value mapping.
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            ValueKind::Undefined => "undefined",
            ValueKind::None => "none",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Seq => "sequence",
            ValueKind::Map => "map",
        })
    }
}

#[derive(Clone)]
pub(crate) enum ValueRepr {
    Undefined,
    None,
    Bool(bool),
    U64(u64),
    I64(i64),
    F64(f64),
    String(Arc<str>),
    Seq(Arc<Vec<Value>>),
    Map(Arc<ValueMap>),
}

impl fmt::Debug for ValueRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRepr::Undefined => f.write_str("undefined"),
            ValueRepr::None => f.write_str("none"),
            ValueRepr::Bool(val) => fmt::Debug::fmt(val, f),
            ValueRepr::U64(val) => fmt::Debug::fmt(val, f),
            ValueRepr::I64(val) => fmt::Debug::fmt(val, f),
            ValueRepr::F64(val) => fmt::Debug::fmt(val, f),
            ValueRepr::String(val) => fmt::Debug::fmt(val, f),
            ValueRepr::Seq(val) => f.debug_list().entries(val.iter()).finish(),
            ValueRepr::Map(val) => f.debug_map().entries(val.iter()).finish(),
        }
    }
}

/// Represents a dynamically typed context value.
#[derive(Clone)]
pub struct Value(pub(crate) ValueRepr);

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ValueRepr::Undefined | ValueRepr::None => Ok(()),
            ValueRepr::Bool(val) => val.fmt(f),
            ValueRepr::U64(val) => val.fmt(f),
            ValueRepr::I64(val) => val.fmt(f),
            ValueRepr::F64(val) => {
                if val.is_nan() {
                    f.write_str("NaN")
                } else if val.is_infinite() {
                    write!(f, "{}inf", if val.is_sign_negative() { "-" } else { "" })
                } else {
                    let mut num = val.to_string();
                    if !num.contains('.') {
                        num.push_str(".0");
                    }
                    f.write_str(&num)
                }
            }
            ValueRepr::String(val) => f.write_str(val),
            ValueRepr::Seq(items) => {
                ok!(f.write_str("["));
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        ok!(f.write_str(", "));
                    }
                    ok!(item.fmt_nested(f));
                }
                f.write_str("]")
            }
            ValueRepr::Map(entries) => {
                ok!(f.write_str("{"));
                for (idx, (key, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        ok!(f.write_str(", "));
                    }
                    ok!(write!(f, "{:?}: ", key));
                    ok!(value.fmt_nested(f));
                }
                f.write_str("}")
            }
        }
    }
}

impl Default for Value {
    fn default() -> Value {
        Value::UNDEFINED
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (ValueRepr::Undefined, ValueRepr::Undefined) => true,
            (ValueRepr::None, ValueRepr::None) => true,
            (ValueRepr::Bool(a), ValueRepr::Bool(b)) => a == b,
            (ValueRepr::String(a), ValueRepr::String(b)) => a == b,
            (ValueRepr::Seq(a), ValueRepr::Seq(b)) => a == b,
            (ValueRepr::Map(a), ValueRepr::Map(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            _ => match (self.as_i128(), other.as_i128()) {
                (Some(a), Some(b)) => a == b,
                _ => match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b) == Some(Ordering::Equal),
                    _ => false,
                },
            },
        }
    }
}

impl Value {
    /// The undefined value.
    ///
    /// This is what lookups of missing paths resolve to.  It renders as an
    /// empty string, iterates as an empty sequence and is falsy.
    pub const UNDEFINED: Value = Value(ValueRepr::Undefined);

    /// Returns the kind of the value.
    pub fn kind(&self) -> ValueKind {
        match self.0 {
            ValueRepr::Undefined => ValueKind::Undefined,
            ValueRepr::None => ValueKind::None,
            ValueRepr::Bool(_) => ValueKind::Bool,
            ValueRepr::U64(_) | ValueRepr::I64(_) | ValueRepr::F64(_) => ValueKind::Number,
            ValueRepr::String(_) => ValueKind::String,
            ValueRepr::Seq(_) => ValueKind::Seq,
            ValueRepr::Map(_) => ValueKind::Map,
        }
    }

    /// Is this value considered true?
    ///
    /// Undefined, none, `false`, zero, empty strings, empty sequences and
    /// empty mappings are false.  Everything else is true.
    pub fn is_true(&self) -> bool {
        match self.0 {
            ValueRepr::Undefined | ValueRepr::None => false,
            ValueRepr::Bool(val) => val,
            ValueRepr::U64(x) => x != 0,
            ValueRepr::I64(x) => x != 0,
            ValueRepr::F64(x) => x != 0.0,
            ValueRepr::String(ref x) => !x.is_empty(),
            ValueRepr::Seq(ref x) => !x.is_empty(),
            ValueRepr::Map(ref x) => !x.is_empty(),
        }
    }

    /// Returns `true` if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self.0, ValueRepr::Undefined)
    }

    /// Returns `true` if this value is none.
    pub fn is_none(&self) -> bool {
        matches!(self.0, ValueRepr::None)
    }

    /// If the value is a string, return it.
    pub fn as_str(&self) -> Option<&str> {
        match self.0 {
            ValueRepr::String(ref s) => Some(s),
            _ => None,
        }
    }

    /// If the value is a sequence, return its items.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self.0 {
            ValueRepr::Seq(ref items) => Some(&items[..]),
            _ => None,
        }
    }

    /// If the value is a mapping, return its entries.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self.0 {
            ValueRepr::Map(ref entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the length of the contained value.
    ///
    /// Strings report their length in characters, sequences and mappings
    /// their number of items.  All other values return `None`.
    pub fn len(&self) -> Option<usize> {
        match self.0 {
            ValueRepr::String(ref s) => Some(s.chars().count()),
            ValueRepr::Seq(ref items) => Some(items.len()),
            ValueRepr::Map(ref entries) => Some(entries.len()),
            _ => None,
        }
    }

    /// Looks up a key in a mapping.
    ///
    /// Returns `None` if the value is not a mapping or the key is absent.
    ///
    /// ```
    /// # use nestplate::{context, value::Value};
    /// let ctx = context!(name => "John");
    /// assert_eq!(ctx.get_attr("name"), Some(&Value::from("John")));
    /// assert_eq!(ctx.get_attr("age"), None);
    /// ```
    pub fn get_attr(&self, key: &str) -> Option<&Value> {
        match self.0 {
            ValueRepr::Map(ref entries) => entries.get(key),
            _ => None,
        }
    }

    /// Walks a dotted path of mapping keys starting at this value.
    ///
    /// ```
    /// # use nestplate::{context, value::Value};
    /// let ctx = context!(person => context!(name => "John"));
    /// assert_eq!(ctx.get_path("person.name"), Some(&Value::from("John")));
    /// assert_eq!(ctx.get_path("person.name.first"), None);
    /// ```
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut rv = self;
        for segment in path.split('.') {
            rv = some!(rv.get_attr(segment));
        }
        Some(rv)
    }

    /// Iterates over the value as if it was the target of a loop.
    ///
    /// Sequences yield their items, mappings yield their keys and all other
    /// values yield nothing.
    pub fn try_iter(&self) -> Option<impl Iterator<Item = Value> + '_> {
        enum Iter<'a> {
            Seq(std::slice::Iter<'a, Value>),
            Map(indexmap::map::Keys<'a, Arc<str>, Value>),
        }

        impl Iterator for Iter<'_> {
            type Item = Value;

            fn next(&mut self) -> Option<Value> {
                match self {
                    Iter::Seq(iter) => iter.next().cloned(),
                    Iter::Map(iter) => iter.next().map(|key| Value::from(key.clone())),
                }
            }
        }

        match self.0 {
            ValueRepr::Seq(ref items) => Some(Iter::Seq(items.iter())),
            ValueRepr::Map(ref entries) => Some(Iter::Map(entries.keys())),
            _ => None,
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ValueRepr::String(ref s) => write!(f, "{:?}", s),
            ValueRepr::None => f.write_str("none"),
            ValueRepr::Undefined => f.write_str("undefined"),
            _ => fmt::Display::fmt(self, f),
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self.0 {
            ValueRepr::U64(x) => Some(x as i128),
            ValueRepr::I64(x) => Some(x as i128),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self.0 {
            ValueRepr::U64(x) => Some(x as f64),
            ValueRepr::I64(x) => Some(x as f64),
            ValueRepr::F64(x) => Some(x),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_truthiness() {
        for falsy in [
            Value::UNDEFINED,
            Value::from(()),
            Value::from(false),
            Value::from(0),
            Value::from(0.0),
            Value::from(""),
            Value::from(Vec::<Value>::new()),
            Value::from(ValueMap::new()),
        ] {
            assert!(!falsy.is_true(), "{falsy:?} should be falsy");
        }
        for truthy in [
            Value::from(true),
            Value::from(1),
            Value::from(-1),
            Value::from(0.5),
            Value::from("x"),
            Value::from(vec![0]),
            [("k", "v")].into_iter().collect::<Value>(),
        ] {
            assert!(truthy.is_true(), "{truthy:?} should be truthy");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(30).to_string(), "30");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from(3.0).to_string(), "3.0");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(()).to_string(), "");
        assert_eq!(Value::UNDEFINED.to_string(), "");
        assert_eq!(Value::from("John").to_string(), "John");
        assert_eq!(
            Value::from(vec![Value::from("a"), Value::from(1), Value::from(())]).to_string(),
            r#"["a", 1, none]"#
        );
        let map: Value = [("type1", "bananas"), ("type2", "pineapples")]
            .into_iter()
            .collect();
        assert_eq!(
            map.to_string(),
            r#"{"type1": "bananas", "type2": "pineapples"}"#
        );
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(Value::from(42u64), Value::from(42i32));
        assert_eq!(Value::from(1.0), Value::from(1));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::from(()), Value::UNDEFINED);
    }

    #[test]
    fn test_get_path() {
        let value: Value = [(
            "food",
            [("fruits", [("citrics", "oranges")].into_iter().collect::<Value>())]
                .into_iter()
                .collect::<Value>(),
        )]
        .into_iter()
        .collect();
        assert_eq!(
            value.get_path("food.fruits.citrics"),
            Some(&Value::from("oranges"))
        );
        assert_eq!(value.get_path("food.vegetables"), None);
        assert_eq!(value.get_path("food.fruits.citrics.x"), None);
    }

    #[test]
    fn test_map_iteration_order() {
        let value: Value = [("zebra", 1), ("apple", 2), ("mango", 3)]
            .into_iter()
            .collect();
        let keys: Vec<_> = value.try_iter().unwrap().map(|x| x.to_string()).collect();
        assert_eq!(keys, vec!["zebra", "apple", "mango"]);
        assert!(Value::from(42).try_iter().is_none());
    }
}
