use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind};
use crate::value::{Value, ValueKind, ValueMap, ValueRepr};

impl From<ValueRepr> for Value {
    #[inline(always)]
    fn from(val: ValueRepr) -> Value {
        Value(val)
    }
}

impl<'a> From<&'a str> for Value {
    #[inline(always)]
    fn from(val: &'a str) -> Self {
        ValueRepr::String(Arc::from(val)).into()
    }
}

impl From<String> for Value {
    #[inline(always)]
    fn from(val: String) -> Self {
        ValueRepr::String(Arc::from(val)).into()
    }
}

impl From<Arc<str>> for Value {
    #[inline(always)]
    fn from(val: Arc<str>) -> Self {
        ValueRepr::String(val).into()
    }
}

impl<'a> From<Cow<'a, str>> for Value {
    #[inline(always)]
    fn from(val: Cow<'a, str>) -> Self {
        match val {
            Cow::Borrowed(x) => x.into(),
            Cow::Owned(x) => x.into(),
        }
    }
}

impl From<char> for Value {
    #[inline(always)]
    fn from(val: char) -> Self {
        let mut buf = [0u8; 4];
        ValueRepr::String(Arc::from(&*val.encode_utf8(&mut buf))).into()
    }
}

impl From<()> for Value {
    #[inline(always)]
    fn from(_: ()) -> Self {
        ValueRepr::None.into()
    }
}

impl From<bool> for Value {
    #[inline(always)]
    fn from(val: bool) -> Self {
        ValueRepr::Bool(val).into()
    }
}

macro_rules! value_from {
    ($src:ty, $dst:ident, $as:ty) => {
        impl From<$src> for Value {
            #[inline(always)]
            fn from(val: $src) -> Self {
                ValueRepr::$dst(val as $as).into()
            }
        }
    };
}

value_from!(u8, U64, u64);
value_from!(u16, U64, u64);
value_from!(u32, U64, u64);
value_from!(u64, U64, u64);
value_from!(usize, U64, u64);
value_from!(i8, I64, i64);
value_from!(i16, I64, i64);
value_from!(i32, I64, i64);
value_from!(i64, I64, i64);
value_from!(isize, I64, i64);
value_from!(f32, F64, f64);
value_from!(f64, F64, f64);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(val: Option<T>) -> Self {
        match val {
            Some(val) => val.into(),
            None => ValueRepr::None.into(),
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(val: Vec<T>) -> Self {
        ValueRepr::Seq(Arc::new(val.into_iter().map(Into::into).collect())).into()
    }
}

impl<K: Into<Arc<str>>, V: Into<Value>> From<IndexMap<K, V>> for Value {
    fn from(val: IndexMap<K, V>) -> Self {
        val.into_iter().collect()
    }
}

impl<K: Into<Arc<str>>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(val: BTreeMap<K, V>) -> Self {
        val.into_iter().collect()
    }
}

impl<K: Into<Arc<str>>, V: Into<Value>> From<HashMap<K, V>> for Value {
    fn from(val: HashMap<K, V>) -> Self {
        val.into_iter().collect()
    }
}

impl<V: Into<Value>> FromIterator<V> for Value {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        let vec = iter.into_iter().map(|v| v.into()).collect();
        ValueRepr::Seq(Arc::new(vec)).into()
    }
}

impl<K: Into<Arc<str>>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let map: ValueMap = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        ValueRepr::Map(Arc::new(map)).into()
    }
}

fn unsupported_conversion(kind: ValueKind, target: &str) -> Error {
    Error::new(
        ErrorKind::InvalidOperation,
        format!("cannot convert {kind} to {target}"),
    )
}

macro_rules! primitive_int_try_from {
    ($ty:ident) => {
        impl TryFrom<Value> for $ty {
            type Error = Error;

            fn try_from(value: Value) -> Result<Self, Self::Error> {
                let opt = match value.0 {
                    ValueRepr::I64(val) => TryFrom::try_from(val).ok(),
                    ValueRepr::U64(val) => TryFrom::try_from(val).ok(),
                    // floats only convert if they carry no fractional part
                    ValueRepr::F64(val) if (val as i64 as f64 == val) => {
                        TryFrom::try_from(val as i64).ok()
                    }
                    _ => None,
                };
                opt.ok_or_else(|| unsupported_conversion(value.kind(), stringify!($ty)))
            }
        }
    };
}

primitive_int_try_from!(u8);
primitive_int_try_from!(u16);
primitive_int_try_from!(u32);
primitive_int_try_from!(u64);
primitive_int_try_from!(i8);
primitive_int_try_from!(i16);
primitive_int_try_from!(i32);
primitive_int_try_from!(i64);
primitive_int_try_from!(usize);

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value.0 {
            ValueRepr::Bool(rv) => Ok(rv),
            _ => Err(unsupported_conversion(value.kind(), "bool")),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value.0 {
            ValueRepr::U64(x) => Ok(x as f64),
            ValueRepr::I64(x) => Ok(x as f64),
            ValueRepr::F64(x) => Ok(x),
            _ => Err(unsupported_conversion(value.kind(), "f64")),
        }
    }
}

impl From<Value> for String {
    fn from(val: Value) -> Self {
        val.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_int_conversions() {
        assert_eq!(i32::try_from(Value::from(30u64)).unwrap(), 30);
        assert_eq!(u8::try_from(Value::from(2.0)).unwrap(), 2);
        assert!(u8::try_from(Value::from(300)).is_err());
        assert!(i64::try_from(Value::from(2.5)).is_err());
        let err = u64::try_from(Value::from("42")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(
            err.to_string(),
            "invalid operation: cannot convert string to u64"
        );
    }

    #[test]
    fn test_option_and_collections() {
        assert!(Value::from(None::<i32>).is_none());
        assert_eq!(Value::from(Some("x")), Value::from("x"));
        let mut map = BTreeMap::new();
        map.insert("b", 2);
        map.insert("a", 1);
        let value = Value::from(map);
        let keys: Vec<_> = value.as_map().unwrap().keys().map(|x| x.to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
