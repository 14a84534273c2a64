//! Field values.
//!
//! [`Value`] is the tagged union of every value kind a field can hold.
//! Reading a value back out of a buffer goes through [`FromValue`], which
//! applies the engine's coercion rules: numeric kinds convert freely among
//! themselves and to and from text, while nested buffers, pointers and
//! embedded records only convert to their own kind.

use crate::buffer::FieldBuffer;
use crate::error::{FmlError, Result};
use crate::types::{FieldType, Wide};
use std::fmt;

/// Who is responsible for the memory behind a pointer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PtrOwnership {
    /// The pointee belongs to whoever holds the buffer.
    Owned,
    /// The pointee is on loan; the buffer never releases it.
    #[default]
    Borrowed,
}

impl PtrOwnership {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            Self::Owned => 0,
            Self::Borrowed => 1,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Owned),
            1 => Some(Self::Borrowed),
            _ => None,
        }
    }
}

/// An opaque pointer value. The engine stores and compares it but never
/// dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PtrValue {
    /// The address.
    pub address: u64,
    /// Ownership of the pointee.
    pub ownership: PtrOwnership,
}

impl PtrValue {
    /// A borrowed pointer.
    pub fn borrowed(address: u64) -> Self {
        Self {
            address,
            ownership: PtrOwnership::Borrowed,
        }
    }

    /// An owned pointer.
    pub fn owned(address: u64) -> Self {
        Self {
            address,
            ownership: PtrOwnership::Owned,
        }
    }
}

/// Packed multi-byte text together with its encoding name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MbString {
    /// Encoding name, e.g. `"UTF-8"` or `"SJIS"`.
    pub encoding: String,
    /// Encoded bytes.
    pub bytes: Vec<u8>,
}

impl MbString {
    /// Create a packed string.
    pub fn new(encoding: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            encoding: encoding.into(),
            bytes: bytes.into(),
        }
    }
}

/// A fixed-layout record carried as an opaque byte image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ViewRecord {
    /// Record type name.
    pub name: String,
    /// Record image.
    pub data: Vec<u8>,
}

impl ViewRecord {
    /// Create a record.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// One field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed 16-bit integer.
    Short(i16),
    /// Signed 64-bit integer.
    Long(i64),
    /// Single byte character.
    Char(u8),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Signed 32-bit integer.
    Int(i32),
    /// Text.
    String(String),
    /// Raw bytes.
    Carray(Vec<u8>),
    /// Packed multi-byte text.
    MbString(MbString),
    /// Nested wide buffer.
    Fml(FieldBuffer<Wide>),
    /// Opaque pointer.
    Ptr(PtrValue),
    /// Embedded record.
    View(ViewRecord),
}

impl Value {
    /// The value kind.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Short(_) => FieldType::Short,
            Self::Long(_) => FieldType::Long,
            Self::Char(_) => FieldType::Char,
            Self::Float(_) => FieldType::Float,
            Self::Double(_) => FieldType::Double,
            Self::Int(_) => FieldType::Int,
            Self::String(_) => FieldType::String,
            Self::Carray(_) => FieldType::Carray,
            Self::MbString(_) => FieldType::MbString,
            Self::Fml(_) => FieldType::Fml,
            Self::Ptr(_) => FieldType::Ptr,
            Self::View(_) => FieldType::View,
        }
    }

    /// The value a sparse-extended occurrence receives.
    pub fn default_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Short => Self::Short(0),
            FieldType::Long => Self::Long(0),
            FieldType::Char => Self::Char(0),
            FieldType::Float => Self::Float(0.0),
            FieldType::Double => Self::Double(0.0),
            FieldType::Int => Self::Int(0),
            FieldType::String => Self::String(String::new()),
            FieldType::Carray => Self::Carray(Vec::new()),
            FieldType::MbString => Self::MbString(MbString::default()),
            FieldType::Fml => Self::Fml(FieldBuffer::new()),
            FieldType::Ptr => Self::Ptr(PtrValue::default()),
            FieldType::View => Self::View(ViewRecord::default()),
        }
    }

    /// Numeric view of a numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Short(v) => Some(v as f64),
            Self::Long(v) => Some(v as f64),
            Self::Char(v) => Some(v as f64),
            Self::Float(v) => Some(v as f64),
            Self::Double(v) => Some(v),
            Self::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Integer view of a numeric value; floats truncate toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Short(v) => Some(v as i64),
            Self::Long(v) => Some(v),
            Self::Char(v) => Some(v as i64),
            Self::Float(v) => Some(v as i64),
            Self::Double(v) => Some(v as i64),
            Self::Int(v) => Some(v as i64),
            _ => None,
        }
    }

    /// Convert into a field of kind `target` under the storage rules:
    /// identical kinds pass through, numeric kinds convert among themselves,
    /// everything else is a mismatch.
    pub fn coerce_to(self, target: FieldType, field: &dyn fmt::Display) -> Result<Value> {
        let actual = self.field_type();
        if actual == target {
            return Ok(self);
        }
        if !(actual.is_numeric() && target.is_numeric()) {
            return Err(FmlError::type_mismatch(field, target, actual));
        }

        let integral = matches!(
            target,
            FieldType::Short | FieldType::Long | FieldType::Char | FieldType::Int
        );
        Ok(if integral {
            let v = self.as_i64().unwrap_or_default();
            match target {
                FieldType::Short => Self::Short(v as i16),
                FieldType::Long => Self::Long(v),
                FieldType::Char => Self::Char(v as u8),
                _ => Self::Int(v as i32),
            }
        } else {
            let v = self.as_f64().unwrap_or_default();
            match target {
                FieldType::Float => Self::Float(v as f32),
                _ => Self::Double(v),
            }
        })
    }

    /// Lossy text rendering used by expressions and regex matching.
    pub(crate) fn text_lossy(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Carray(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Self::MbString(m) => Some(String::from_utf8_lossy(&m.bytes).into_owned()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
            Self::Char(v) => write!(f, "{}", *v as char),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::String(s) => f.write_str(s),
            Self::Carray(b) => write!(f, "<{} bytes>", b.len()),
            Self::MbString(m) => write!(f, "<{} bytes {}>", m.bytes.len(), m.encoding),
            Self::Fml(b) => write!(f, "<fml32 {} fields>", b.len()),
            Self::Ptr(p) => write!(f, "0x{:x}", p.address),
            Self::View(v) => write!(f, "<view {}>", v.name),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    i16 => Short,
    i64 => Long,
    u8 => Char,
    f32 => Float,
    f64 => Double,
    i32 => Int,
    String => String,
    Vec<u8> => Carray,
    MbString => MbString,
    FieldBuffer<Wide> => Fml,
    PtrValue => Ptr,
    ViewRecord => View,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Carray(v.to_vec())
    }
}

/// Conversion out of a stored [`Value`] for typed reads.
pub trait FromValue: Sized {
    /// The kind reported in mismatch errors.
    const EXPECTED: &'static str;

    /// Convert `value`, read from `field`.
    fn from_value(value: Value, field: &dyn fmt::Display) -> Result<Self>;
}

impl FromValue for Value {
    const EXPECTED: &'static str = "any";

    fn from_value(value: Value, _field: &dyn fmt::Display) -> Result<Self> {
        Ok(value)
    }
}

fn parse_text<T: std::str::FromStr>(
    value: &Value,
    field: &dyn fmt::Display,
    expected: &str,
) -> Result<T> {
    value
        .text_lossy()
        .and_then(|s| s.trim().trim_end_matches('\0').parse().ok())
        .ok_or_else(|| FmlError::type_mismatch(field, expected, value.field_type()))
}

macro_rules! numeric_from_value {
    ($($ty:ty => $expected:literal, $via:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                const EXPECTED: &'static str = $expected;

                fn from_value(value: Value, field: &dyn fmt::Display) -> Result<Self> {
                    if let Some(v) = value.$via() {
                        return Ok(v as $ty);
                    }
                    parse_text(&value, field, Self::EXPECTED)
                }
            }
        )*
    };
}

numeric_from_value! {
    i16 => "short", as_i64,
    i32 => "int", as_i64,
    i64 => "long", as_i64,
    f32 => "float", as_f64,
    f64 => "double", as_f64,
}

impl FromValue for u8 {
    const EXPECTED: &'static str = "char";

    fn from_value(value: Value, field: &dyn fmt::Display) -> Result<Self> {
        if let Some(v) = value.as_i64() {
            return Ok(v as u8);
        }
        match &value {
            Value::String(s) if s.len() == 1 => Ok(s.as_bytes()[0]),
            _ => parse_text(&value, field, Self::EXPECTED),
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: Value, field: &dyn fmt::Display) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            Value::Carray(b) => String::from_utf8(b)
                .map_err(|_| FmlError::type_mismatch(field, Self::EXPECTED, FieldType::Carray)),
            Value::MbString(m) => String::from_utf8(m.bytes)
                .map_err(|_| FmlError::type_mismatch(field, Self::EXPECTED, FieldType::MbString)),
            v @ (Value::Short(_)
            | Value::Long(_)
            | Value::Char(_)
            | Value::Float(_)
            | Value::Double(_)
            | Value::Int(_)) => Ok(v.to_string()),
            other => Err(FmlError::type_mismatch(
                field,
                Self::EXPECTED,
                other.field_type(),
            )),
        }
    }
}

impl FromValue for Vec<u8> {
    const EXPECTED: &'static str = "carray";

    fn from_value(value: Value, field: &dyn fmt::Display) -> Result<Self> {
        match value {
            Value::Carray(b) => Ok(b),
            Value::String(s) => Ok(s.into_bytes()),
            Value::MbString(m) => Ok(m.bytes),
            other => Err(FmlError::type_mismatch(
                field,
                Self::EXPECTED,
                other.field_type(),
            )),
        }
    }
}

macro_rules! exact_from_value {
    ($($ty:ty => $variant:ident, $expected:literal),* $(,)?) => {
        $(
            impl FromValue for $ty {
                const EXPECTED: &'static str = $expected;

                fn from_value(value: Value, field: &dyn fmt::Display) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(FmlError::type_mismatch(
                            field,
                            Self::EXPECTED,
                            other.field_type(),
                        )),
                    }
                }
            }
        )*
    };
}

exact_from_value! {
    MbString => MbString, "mbstring",
    FieldBuffer<Wide> => Fml, "fml32",
    PtrValue => Ptr, "ptr",
    ViewRecord => View, "view32",
}
