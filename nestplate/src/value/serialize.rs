use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{ser, Serialize, Serializer};

use crate::error::{Error, ErrorKind};
use crate::value::{Value, ValueMap, ValueRepr};

// Values that are themselves passed through serde (for instance a `Value`
// nested in a user struct) are smuggled through the serializer by handle
// instead of being copied.  The handle travels as a unit variant.
const VALUE_HANDLE_MARKER: &str = "\x01__nestplate_ValueHandle";

thread_local! {
    static INTERNAL_SERIALIZATION: Cell<bool> = const { Cell::new(false) };
    static LAST_VALUE_HANDLE: Cell<u32> = const { Cell::new(0) };
    static VALUE_HANDLES: RefCell<BTreeMap<u32, Value>> = const { RefCell::new(BTreeMap::new()) };
}

struct InternalSerializationGuard(bool);

impl Drop for InternalSerializationGuard {
    fn drop(&mut self) {
        if !self.0 {
            INTERNAL_SERIALIZATION.with(|flag| flag.set(false));
        }
    }
}

fn mark_internal_serialization() -> InternalSerializationGuard {
    InternalSerializationGuard(INTERNAL_SERIALIZATION.with(|flag| flag.replace(true)))
}

fn serializing_for_value() -> bool {
    INTERNAL_SERIALIZATION.with(|flag| flag.get())
}

impl Value {
    /// Creates a value from something that can be serialized.
    ///
    /// This is what [`context!`](crate::context) and
    /// [`render`](crate::Template::render) use to turn rust data into a
    /// context.  Parts of the input that fail to serialize become
    /// [`UNDEFINED`](Self::UNDEFINED); use
    /// [`try_from_serialize`](Self::try_from_serialize) to surface the error
    /// instead.
    ///
    /// ```
    /// # use nestplate::value::Value;
    /// let val = Value::from_serialize(&vec![1, 2, 3]);
    /// assert_eq!(val.len(), Some(3));
    /// ```
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Value {
        Value::try_from_serialize(value).unwrap_or(Value::UNDEFINED)
    }

    /// Like [`from_serialize`](Self::from_serialize) but fails with a
    /// [`BadSerialization`](crate::ErrorKind::BadSerialization) error if the
    /// value cannot be represented.
    pub fn try_from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Value, Error> {
        let _serialization_guard = mark_internal_serialization();
        value.serialize(ValueSerializer)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializing_for_value() {
            let handle = LAST_VALUE_HANDLE.with(|x| {
                // wrapping is fine, handles only live for the duration of a
                // single serialization call
                let rv = x.get().wrapping_add(1);
                x.set(rv);
                rv
            });
            VALUE_HANDLES.with(|handles| handles.borrow_mut().insert(handle, self.clone()));
            return serializer.serialize_unit_variant(
                VALUE_HANDLE_MARKER,
                handle,
                VALUE_HANDLE_MARKER,
            );
        }

        match self.0 {
            ValueRepr::Undefined | ValueRepr::None => serializer.serialize_unit(),
            ValueRepr::Bool(b) => serializer.serialize_bool(b),
            ValueRepr::U64(u) => serializer.serialize_u64(u),
            ValueRepr::I64(i) => serializer.serialize_i64(i),
            ValueRepr::F64(f) => serializer.serialize_f64(f),
            ValueRepr::String(ref s) => serializer.serialize_str(s),
            ValueRepr::Seq(ref items) => items.serialize(serializer),
            ValueRepr::Map(ref entries) => {
                use serde::ser::SerializeMap;
                let mut map = ok!(serializer.serialize_map(Some(entries.len())));
                for (key, value) in entries.iter() {
                    ok!(map.serialize_entry(&**key, value));
                }
                map.end()
            }
        }
    }
}

fn bad_serialization(msg: &'static str) -> Error {
    Error::new(ErrorKind::BadSerialization, msg)
}

pub(super) fn value_to_key(key: Value) -> Result<Arc<str>, Error> {
    match key.0 {
        ValueRepr::String(s) => Ok(s),
        ValueRepr::Bool(_) | ValueRepr::U64(_) | ValueRepr::I64(_) | ValueRepr::F64(_) => {
            Ok(Arc::from(key.to_string()))
        }
        _ => Err(bad_serialization("map keys must be strings, numbers or bools")),
    }
}

/// Serializes rust values into a [`Value`].
///
/// Usually [`Value::from_serialize`] is the more convenient entry point.
pub struct ValueSerializer;

impl Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = SerializeSeq;
    type SerializeTuple = SerializeSeq;
    type SerializeTupleStruct = SerializeSeq;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeStruct;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<Value, Error> {
        Ok(ValueRepr::Bool(v).into())
    }

    fn serialize_i8(self, v: i8) -> Result<Value, Error> {
        Ok(ValueRepr::I64(v as i64).into())
    }

    fn serialize_i16(self, v: i16) -> Result<Value, Error> {
        Ok(ValueRepr::I64(v as i64).into())
    }

    fn serialize_i32(self, v: i32) -> Result<Value, Error> {
        Ok(ValueRepr::I64(v as i64).into())
    }

    fn serialize_i64(self, v: i64) -> Result<Value, Error> {
        Ok(ValueRepr::I64(v).into())
    }

    fn serialize_i128(self, v: i128) -> Result<Value, Error> {
        i64::try_from(v)
            .map(|v| ValueRepr::I64(v).into())
            .map_err(|_| bad_serialization("integer out of range"))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, Error> {
        Ok(ValueRepr::U64(v as u64).into())
    }

    fn serialize_u16(self, v: u16) -> Result<Value, Error> {
        Ok(ValueRepr::U64(v as u64).into())
    }

    fn serialize_u32(self, v: u32) -> Result<Value, Error> {
        Ok(ValueRepr::U64(v as u64).into())
    }

    fn serialize_u64(self, v: u64) -> Result<Value, Error> {
        Ok(ValueRepr::U64(v).into())
    }

    fn serialize_u128(self, v: u128) -> Result<Value, Error> {
        u64::try_from(v)
            .map(|v| ValueRepr::U64(v).into())
            .map_err(|_| bad_serialization("integer out of range"))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, Error> {
        Ok(ValueRepr::F64(v as f64).into())
    }

    fn serialize_f64(self, v: f64) -> Result<Value, Error> {
        Ok(ValueRepr::F64(v).into())
    }

    fn serialize_char(self, v: char) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_str(self, value: &str) -> Result<Value, Error> {
        Ok(Value::from(value))
    }

    fn serialize_bytes(self, value: &[u8]) -> Result<Value, Error> {
        Ok(value.iter().copied().collect())
    }

    fn serialize_none(self) -> Result<Value, Error> {
        Ok(ValueRepr::None.into())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, Error> {
        Ok(ValueRepr::None.into())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, Error> {
        Ok(ValueRepr::None.into())
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, Error> {
        if name == VALUE_HANDLE_MARKER && variant == VALUE_HANDLE_MARKER {
            VALUE_HANDLES
                .with(|handles| handles.borrow_mut().remove(&variant_index))
                .ok_or_else(|| bad_serialization("value handle not in registry"))
        } else {
            Ok(Value::from(variant))
        }
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, Error> {
        let mut map = ValueMap::with_capacity(1);
        map.insert(Arc::from(variant), ok!(value.serialize(ValueSerializer)));
        Ok(ValueRepr::Map(Arc::new(map)).into())
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeSeq, Error> {
        Ok(SerializeSeq {
            elements: Vec::with_capacity(len.unwrap_or(0).min(1024)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeSeq, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SerializeSeq, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant, Error> {
        Ok(SerializeTupleVariant {
            name: variant,
            fields: Vec::with_capacity(len.min(1024)),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<SerializeMap, Error> {
        Ok(SerializeMap {
            entries: ValueMap::with_capacity(len.unwrap_or(0).min(1024)),
            key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<SerializeStruct, Error> {
        Ok(SerializeStruct {
            fields: ValueMap::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeStructVariant, Error> {
        Ok(SerializeStructVariant {
            variant,
            map: ValueMap::with_capacity(len),
        })
    }
}

#[doc(hidden)]
pub struct SerializeSeq {
    elements: Vec<Value>,
}

impl ser::SerializeSeq for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.elements.push(ok!(value.serialize(ValueSerializer)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(ValueRepr::Seq(Arc::new(self.elements)).into())
    }
}

impl ser::SerializeTuple for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, Error> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeSeq {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, Error> {
        ser::SerializeSeq::end(self)
    }
}

#[doc(hidden)]
pub struct SerializeTupleVariant {
    name: &'static str,
    fields: Vec<Value>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        self.fields.push(ok!(value.serialize(ValueSerializer)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        let mut map = ValueMap::with_capacity(1);
        map.insert(
            Arc::from(self.name),
            ValueRepr::Seq(Arc::new(self.fields)).into(),
        );
        Ok(ValueRepr::Map(Arc::new(map)).into())
    }
}

#[doc(hidden)]
pub struct SerializeMap {
    entries: ValueMap,
    key: Option<Arc<str>>,
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Error> {
        self.key = Some(ok!(value_to_key(ok!(key.serialize(ValueSerializer)))));
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Error> {
        let key = ok!(self
            .key
            .take()
            .ok_or_else(|| bad_serialization("map value serialized before its key")));
        self.entries.insert(key, ok!(value.serialize(ValueSerializer)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(ValueRepr::Map(Arc::new(self.entries)).into())
    }
}

#[doc(hidden)]
pub struct SerializeStruct {
    fields: ValueMap,
}

impl ser::SerializeStruct for SerializeStruct {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.fields
            .insert(Arc::from(key), ok!(value.serialize(ValueSerializer)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        Ok(ValueRepr::Map(Arc::new(self.fields)).into())
    }
}

#[doc(hidden)]
pub struct SerializeStructVariant {
    variant: &'static str,
    map: ValueMap,
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.map
            .insert(Arc::from(key), ok!(value.serialize(ValueSerializer)));
        Ok(())
    }

    fn end(self) -> Result<Value, Error> {
        let mut rv = ValueMap::with_capacity(1);
        rv.insert(
            Arc::from(self.variant),
            ValueRepr::Map(Arc::new(self.map)).into(),
        );
        Ok(ValueRepr::Map(Arc::new(rv)).into())
    }
}
