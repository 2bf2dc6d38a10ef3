use std::fmt;
use std::sync::Arc;

use serde::de::{self, Deserialize, MapAccess, SeqAccess, Visitor};

use crate::value::serialize::value_to_key;
use crate::value::{Value, ValueMap, ValueRepr};

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

macro_rules! visit_value_primitive {
    ($name:ident, $ty:ty) => {
        fn $name<E>(self, v: $ty) -> Result<Value, E>
        where
            E: de::Error,
        {
            Ok(Value::from(v))
        }
    };
}

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str("a scalar, sequence or mapping")
    }

    visit_value_primitive!(visit_bool, bool);
    visit_value_primitive!(visit_i8, i8);
    visit_value_primitive!(visit_i16, i16);
    visit_value_primitive!(visit_i32, i32);
    visit_value_primitive!(visit_i64, i64);
    visit_value_primitive!(visit_u8, u8);
    visit_value_primitive!(visit_u16, u16);
    visit_value_primitive!(visit_u32, u32);
    visit_value_primitive!(visit_u64, u64);
    visit_value_primitive!(visit_f32, f32);
    visit_value_primitive!(visit_f64, f64);
    visit_value_primitive!(visit_char, char);
    visit_value_primitive!(visit_str, &str);
    visit_value_primitive!(visit_string, String);

    fn visit_i128<E>(self, v: i128) -> Result<Value, E>
    where
        E: de::Error,
    {
        i64::try_from(v)
            .map(Value::from)
            .map_err(|_| E::custom("integer out of range"))
    }

    fn visit_u128<E>(self, v: u128) -> Result<Value, E>
    where
        E: de::Error,
    {
        u64::try_from(v)
            .map(Value::from)
            .map_err(|_| E::custom("integer out of range"))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(v.iter().copied().collect())
    }

    fn visit_none<E>(self) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(()))
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer)
    }

    fn visit_unit<E>(self) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(()))
    }

    fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut visitor: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut rv = Vec::<Value>::with_capacity(visitor.size_hint().unwrap_or(0).min(1024));
        while let Some(e) = ok!(visitor.next_element()) {
            rv.push(e);
        }
        Ok(ValueRepr::Seq(Arc::new(rv)).into())
    }

    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut rv = ValueMap::with_capacity(map.size_hint().unwrap_or(0).min(1024));
        while let Some((key, value)) = ok!(map.next_entry::<Value, Value>()) {
            let key = ok!(value_to_key(key).map_err(de::Error::custom));
            rv.insert(key, value);
        }
        Ok(ValueRepr::Map(Arc::new(rv)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_yaml_document() {
        let value: Value = serde_yaml::from_str(
            "person:\n  name: John\n  age: 30\nskills: [Python, Java]\nmanager: ~\n2023: current\n",
        )
        .unwrap();
        assert_eq!(value.get_path("person.name"), Some(&Value::from("John")));
        assert_eq!(value.get_path("person.age"), Some(&Value::from(30)));
        assert_eq!(value.get_attr("skills").and_then(|x| x.len()), Some(2));
        assert!(value.get_attr("manager").unwrap().is_none());
        assert_eq!(value.get_attr("2023"), Some(&Value::from("current")));
        let keys: Vec<_> = value.as_map().unwrap().keys().map(|x| x.to_string()).collect();
        assert_eq!(keys, vec!["person", "skills", "manager", "2023"]);
    }

    #[test]
    fn test_json_document() {
        let value: Value = serde_json::from_str(r#"{"b": [1, 2.5, true, null], "a": {}}"#).unwrap();
        assert_eq!(value.to_string(), r#"{"b": [1, 2.5, true, none], "a": {}}"#);
    }
}
