//! Conversion of logged values into JSON Lines records
//!
//! A record is a flat JSON object. Its shape depends on what was logged:
//!
//! | Input                         | Record                                  |
//! |-------------------------------|-----------------------------------------|
//! | `()` / `None`                 | `{"File"}`                              |
//! | `str` / `String`              | `{"File", "Message"}`                   |
//! | error                         | `{"File", "Message", "Error"}`          |
//! | value serializing to object   | `{"File", ..fields}` (fields win)       |
//! | any other value               | `{"File", "Item"}`                      |
//!
//! Only values whose `Serialize` impl is a bare string become `Message`.
//! Enum variants, newtypes and `Some("..")` serialize to JSON strings too but
//! still nest under `Item`. Non-finite floats anywhere in a value are
//! rejected, since JSON has no representation for them.

use super::error::Result;
use serde::{ser, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;
use std::panic::Location;

pub const FILE_FIELD: &str = "File";
pub const MESSAGE_FIELD: &str = "Message";
pub const ERROR_FIELD: &str = "Error";
pub const ITEM_FIELD: &str = "Item";
pub const STACK_FIELD: &str = "Stack";

/// A single log record, serialized as one line of output
pub type Record = Map<String, Value>;

/// Format a caller location as `path/to/file.rs:line`
#[must_use]
pub fn format_location(location: &Location<'_>) -> String {
    format!("{}:{}", location.file(), location.line())
}

fn base_record(location: Option<&Location<'_>>) -> Record {
    let mut record = Record::new();
    if let Some(location) = location {
        record.insert(
            FILE_FIELD.to_string(),
            Value::String(format_location(location)),
        );
    }
    record
}

/// Build the record for a serializable value.
///
/// Object fields are merged after `File` is set, so a value carrying its own
/// `File` key replaces the caller location.
///
/// # Errors
///
/// Returns [`LoggerError::JsonError`](super::error::LoggerError::JsonError)
/// if the value fails to serialize or holds a non-finite float.
pub fn value_record<T: Serialize + ?Sized>(
    location: Option<&Location<'_>>,
    value: &T,
) -> Result<Record> {
    let shape = value.serialize(Inspector)?;
    let mut record = base_record(location);

    match serde_json::to_value(value)? {
        Value::Null => {}
        Value::String(message) if shape == Shape::Str => {
            record.insert(MESSAGE_FIELD.to_string(), Value::String(message));
        }
        Value::Object(fields) => record.extend(fields),
        item => {
            record.insert(ITEM_FIELD.to_string(), item);
        }
    }

    Ok(record)
}

/// Top-level shape of a value as seen by its `Serialize` impl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Str,
    Other,
}

type InspectResult<T> = std::result::Result<T, serde_json::Error>;

fn finite(value: f64) -> InspectResult<Shape> {
    if value.is_finite() {
        Ok(Shape::Other)
    } else {
        Err(ser::Error::custom(format_args!("unsupported value: {}", value)))
    }
}

/// Walks a value without building it, reporting whether the top level is a
/// plain string and failing on non-finite floats at any depth.
struct Inspector;

/// Compound values: every element is inspected, the shape is always `Other`
struct Nested;

impl ser::Serializer for Inspector {
    type Ok = Shape;
    type Error = serde_json::Error;
    type SerializeSeq = Nested;
    type SerializeTuple = Nested;
    type SerializeTupleStruct = Nested;
    type SerializeTupleVariant = Nested;
    type SerializeMap = Nested;
    type SerializeStruct = Nested;
    type SerializeStructVariant = Nested;

    fn serialize_str(self, _v: &str) -> InspectResult<Shape> {
        Ok(Shape::Str)
    }

    fn serialize_f32(self, v: f32) -> InspectResult<Shape> {
        finite(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> InspectResult<Shape> {
        finite(v)
    }

    fn serialize_bool(self, _v: bool) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_i8(self, _v: i8) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_i16(self, _v: i16) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_i32(self, _v: i32) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_i64(self, _v: i64) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_i128(self, _v: i128) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_u8(self, _v: u8) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_u16(self, _v: u16) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_u32(self, _v: u32) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_u64(self, _v: u64) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_u128(self, _v: u128) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_char(self, _v: char) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_bytes(self, _v: &[u8]) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_none(self) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> InspectResult<Shape> {
        value.serialize(Inspector).map(|_| Shape::Other)
    }

    fn serialize_unit(self) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> InspectResult<Shape> {
        value.serialize(Inspector).map(|_| Shape::Other)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> InspectResult<Shape> {
        value.serialize(Inspector).map(|_| Shape::Other)
    }

    fn serialize_seq(self, _len: Option<usize>) -> InspectResult<Nested> {
        Ok(Nested)
    }

    fn serialize_tuple(self, _len: usize) -> InspectResult<Nested> {
        Ok(Nested)
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> InspectResult<Nested> {
        Ok(Nested)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> InspectResult<Nested> {
        Ok(Nested)
    }

    fn serialize_map(self, _len: Option<usize>) -> InspectResult<Nested> {
        Ok(Nested)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> InspectResult<Nested> {
        Ok(Nested)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> InspectResult<Nested> {
        Ok(Nested)
    }
}

impl Nested {
    fn inspect<T: ?Sized + Serialize>(value: &T) -> InspectResult<()> {
        value.serialize(Inspector).map(|_| ())
    }
}

impl ser::SerializeSeq for Nested {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> InspectResult<()> {
        Nested::inspect(value)
    }

    fn end(self) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }
}

impl ser::SerializeTuple for Nested {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> InspectResult<()> {
        Nested::inspect(value)
    }

    fn end(self) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }
}

impl ser::SerializeTupleStruct for Nested {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> InspectResult<()> {
        Nested::inspect(value)
    }

    fn end(self) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }
}

impl ser::SerializeTupleVariant for Nested {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> InspectResult<()> {
        Nested::inspect(value)
    }

    fn end(self) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }
}

impl ser::SerializeMap for Nested {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> InspectResult<()> {
        Nested::inspect(key)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> InspectResult<()> {
        Nested::inspect(value)
    }

    fn end(self) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }
}

impl ser::SerializeStruct for Nested {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> InspectResult<()> {
        Nested::inspect(value)
    }

    fn end(self) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }
}

impl ser::SerializeStructVariant for Nested {
    type Ok = Shape;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> InspectResult<()> {
        Nested::inspect(value)
    }

    fn end(self) -> InspectResult<Shape> {
        Ok(Shape::Other)
    }
}

/// Build the record for an error value
pub fn error_record<E: Error + ?Sized>(location: Option<&Location<'_>>, err: &E) -> Record {
    let report = ErrorReport::new(err);
    let mut record = base_record(location);
    record.insert(
        MESSAGE_FIELD.to_string(),
        Value::String(report.message.clone()),
    );
    record.insert(ERROR_FIELD.to_string(), report.to_json_value());
    record
}

/// Structured form of an error value: its message and the messages of its
/// `source()` chain, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(rename = "Message")]
    pub message: String,

    #[serde(rename = "Sources", default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl ErrorReport {
    #[must_use]
    pub fn new<E: Error + ?Sized>(err: &E) -> Self {
        let mut sources = Vec::new();
        let mut next = err.source();
        while let Some(source) = next {
            sources.push(source.to_string());
            next = source.source();
        }

        Self {
            message: err.to_string(),
            sources,
        }
    }

    /// Convert to serde_json::Value without going through the serializer
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(
            MESSAGE_FIELD.to_string(),
            Value::String(self.message.clone()),
        );
        if !self.sources.is_empty() {
            object.insert(
                "Sources".to_string(),
                Value::Array(self.sources.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(object)
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ErrorReport {}
