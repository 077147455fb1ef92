use crate::error::InputError;
use crate::value::{Number, Value};
use indexmap::IndexMap;
use serde::ser::{self, Impossible, Serialize};
use std::convert::TryFrom;

/// Name `serde_json` gives the struct it serializes numbers as when
/// `arbitrary_precision` is on. The single field holds the literal.
const NUMBER_TOKEN: &str = "$serde_json::private::Number";

/// Converts any `Serialize` value into the JSON data model.
///
/// Values without a JSON representation fail eagerly: non-finite floats,
/// integers beyond 64 bits, and maps whose keys are not strings.
///
/// ```
/// use std::collections::HashMap;
///
/// let mut points = HashMap::new();
/// points.insert((1, 2), "a");
/// assert!(jsv::to_value(&points).is_err());
/// assert!(jsv::to_value(&f64::NAN).is_err());
/// assert!(jsv::to_value(&vec![1, 2, 3]).is_ok());
/// ```
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value, InputError> {
    value.serialize(ValueSerializer)
}

struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = InputError;

    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeStruct;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<Value, InputError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, InputError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, InputError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, InputError> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, InputError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, InputError> {
        if let Ok(u) = u64::try_from(v) {
            Ok(Value::Number(u.into()))
        } else if let Ok(i) = i64::try_from(v) {
            Ok(Value::Number(i.into()))
        } else {
            Err(InputError::IntegerOutOfRange(v.to_string()))
        }
    }

    fn serialize_u8(self, v: u8) -> Result<Value, InputError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, InputError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, InputError> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, InputError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, InputError> {
        u64::try_from(v)
            .map(|u| Value::Number(u.into()))
            .map_err(|_| InputError::IntegerOutOfRange(v.to_string()))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, InputError> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, InputError> {
        Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| InputError::NonFiniteNumber(v.to_string()))
    }

    fn serialize_char(self, v: char) -> Result<Value, InputError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, InputError> {
        Ok(Value::String(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, InputError> {
        Ok(Value::Array(
            v.iter().map(|&b| Value::Number(u64::from(b).into())).collect(),
        ))
    }

    fn serialize_none(self) -> Result<Value, InputError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, InputError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, InputError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, InputError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, InputError> {
        Ok(Value::String(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, InputError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, InputError> {
        let mut map = IndexMap::new();
        map.insert(variant.to_owned(), to_value(value)?);
        Ok(Value::Object(map))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec, InputError> {
        Ok(SerializeVec {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec, InputError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SerializeVec, InputError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant, InputError> {
        Ok(SerializeTupleVariant {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeMap, InputError> {
        Ok(SerializeMap {
            map: IndexMap::new(),
            next_key: None,
        })
    }

    fn serialize_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<SerializeStruct, InputError> {
        if name == NUMBER_TOKEN {
            Ok(SerializeStruct::Number(None))
        } else {
            self.serialize_map(Some(len)).map(SerializeStruct::Map)
        }
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SerializeStructVariant, InputError> {
        Ok(SerializeStructVariant {
            variant,
            map: IndexMap::new(),
        })
    }
}

struct SerializeVec {
    items: Vec<Value>,
}

struct SerializeTupleVariant {
    variant: &'static str,
    items: Vec<Value>,
}

struct SerializeMap {
    map: IndexMap<String, Value>,
    next_key: Option<String>,
}

enum SerializeStruct {
    Map(SerializeMap),
    Number(Option<Number>),
}

struct SerializeStructVariant {
    variant: &'static str,
    map: IndexMap<String, Value>,
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = Value;
    type Error = InputError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), InputError> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, InputError> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = Value;
    type Error = InputError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), InputError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, InputError> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = Value;
    type Error = InputError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), InputError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, InputError> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = Value;
    type Error = InputError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), InputError> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, InputError> {
        let mut map = IndexMap::new();
        map.insert(self.variant.to_owned(), Value::Array(self.items));
        Ok(Value::Object(map))
    }
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Value;
    type Error = InputError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), InputError> {
        self.next_key = Some(key.serialize(MapKeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), InputError> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| InputError::Custom("map value serialized before its key".to_owned()))?;
        self.map.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, InputError> {
        Ok(Value::Object(self.map))
    }
}

impl ser::SerializeStruct for SerializeStruct {
    type Ok = Value;
    type Error = InputError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), InputError> {
        match self {
            SerializeStruct::Map(map) => ser::SerializeMap::serialize_entry(map, key, value),
            SerializeStruct::Number(slot) => {
                let literal = value.serialize(MapKeySerializer)?;
                *slot = Some(Number::from_literal(&literal)?);
                Ok(())
            }
        }
    }

    fn end(self) -> Result<Value, InputError> {
        match self {
            SerializeStruct::Map(map) => ser::SerializeMap::end(map),
            SerializeStruct::Number(Some(n)) => Ok(Value::Number(n)),
            SerializeStruct::Number(None) => {
                Err(InputError::Custom("number without a literal".to_owned()))
            }
        }
    }
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = Value;
    type Error = InputError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), InputError> {
        self.map.insert(key.to_owned(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value, InputError> {
        let mut outer = IndexMap::new();
        outer.insert(self.variant.to_owned(), Value::Object(self.map));
        Ok(Value::Object(outer))
    }
}

/// Object keys: strings, plus the scalars `serde_json` also stringifies.
struct MapKeySerializer;

impl ser::Serializer for MapKeySerializer {
    type Ok = String;
    type Error = InputError;

    type SerializeSeq = Impossible<String, InputError>;
    type SerializeTuple = Impossible<String, InputError>;
    type SerializeTupleStruct = Impossible<String, InputError>;
    type SerializeTupleVariant = Impossible<String, InputError>;
    type SerializeMap = Impossible<String, InputError>;
    type SerializeStruct = Impossible<String, InputError>;
    type SerializeStructVariant = Impossible<String, InputError>;

    fn serialize_bool(self, v: bool) -> Result<String, InputError> {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> Result<String, InputError> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<String, InputError> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<String, InputError> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<String, InputError> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<String, InputError> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<String, InputError> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<String, InputError> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<String, InputError> {
        Ok(v.to_string())
    }

    fn serialize_f32(self, _v: f32) -> Result<String, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_f64(self, _v: f64) -> Result<String, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_char(self, v: char) -> Result<String, InputError> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<String, InputError> {
        Ok(v.to_owned())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_none(self) -> Result<String, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<String, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_unit(self) -> Result<String, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String, InputError> {
        Ok(variant.to_owned())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, InputError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, InputError> {
        Err(InputError::KeyMustBeString)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, InputError> {
        Err(InputError::KeyMustBeString)
    }
}
