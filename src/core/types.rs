//! Purpose: Closed type vocabulary shared by the descriptor, the registry, and the bridge.
//! Exports: `ClType`, `Value`.
//! Role: Single mapping between descriptor type names, C ABI widths, and Rust values.
//! Invariants: Type names are the lowercase descriptor spellings (`uint`, `ullong`, ...).
//! Invariants: Integer widths follow the target C ABI (`long` is `c_long`).
//! Invariants: `Value::parse(ty, &v.render())` returns `v` for every non-NaN value.
use std::fmt;
use std::os::raw::{
    c_char, c_int, c_long, c_longlong, c_short, c_uchar, c_uint, c_ulong, c_ulonglong, c_ushort,
};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClType {
    Int,
    UInt,
    Char,
    UChar,
    SInt,
    USInt,
    Float,
    Double,
    Long,
    ULong,
    LLong,
    ULLong,
    Boolean,
    String,
    Void,
    Pointer,
}

impl ClType {
    pub const ALL: [ClType; 16] = [
        ClType::Int,
        ClType::UInt,
        ClType::Char,
        ClType::UChar,
        ClType::SInt,
        ClType::USInt,
        ClType::Float,
        ClType::Double,
        ClType::Long,
        ClType::ULong,
        ClType::LLong,
        ClType::ULLong,
        ClType::Boolean,
        ClType::String,
        ClType::Void,
        ClType::Pointer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClType::Int => "int",
            ClType::UInt => "uint",
            ClType::Char => "char",
            ClType::UChar => "uchar",
            ClType::SInt => "sint",
            ClType::USInt => "usint",
            ClType::Float => "float",
            ClType::Double => "double",
            ClType::Long => "long",
            ClType::ULong => "ulong",
            ClType::LLong => "llong",
            ClType::ULLong => "ullong",
            ClType::Boolean => "boolean",
            ClType::String => "string",
            ClType::Void => "void",
            ClType::Pointer => "pointer",
        }
    }

    /// Types a capability may declare as its return value. Pointers travel
    /// only as arguments across this ABI.
    pub fn is_return_type(&self) -> bool {
        !matches!(self, ClType::Pointer)
    }

    pub fn is_argument_type(&self) -> bool {
        !matches!(self, ClType::Void)
    }
}

impl fmt::Display for ClType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClType::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| Error::new(ErrorKind::Usage).with_message(format!("unknown type: {s}")))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Void,
    Int(c_int),
    UInt(c_uint),
    Char(c_char),
    UChar(c_uchar),
    SInt(c_short),
    USInt(c_ushort),
    Float(f32),
    Double(f64),
    Long(c_long),
    ULong(c_ulong),
    LLong(c_longlong),
    ULLong(c_ulonglong),
    Boolean(bool),
    String(String),
    Pointer(usize),
}

impl Value {
    pub fn ty(&self) -> ClType {
        match self {
            Value::Void => ClType::Void,
            Value::Int(_) => ClType::Int,
            Value::UInt(_) => ClType::UInt,
            Value::Char(_) => ClType::Char,
            Value::UChar(_) => ClType::UChar,
            Value::SInt(_) => ClType::SInt,
            Value::USInt(_) => ClType::USInt,
            Value::Float(_) => ClType::Float,
            Value::Double(_) => ClType::Double,
            Value::Long(_) => ClType::Long,
            Value::ULong(_) => ClType::ULong,
            Value::LLong(_) => ClType::LLong,
            Value::ULLong(_) => ClType::ULLong,
            Value::Boolean(_) => ClType::Boolean,
            Value::String(_) => ClType::String,
            Value::Pointer(_) => ClType::Pointer,
        }
    }

    /// Textual form used by the object bridge.
    pub fn render(&self) -> String {
        match self {
            Value::Void => String::new(),
            Value::Int(v) => v.to_string(),
            Value::UInt(v) => v.to_string(),
            Value::Char(v) => v.to_string(),
            Value::UChar(v) => v.to_string(),
            Value::SInt(v) => v.to_string(),
            Value::USInt(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::ULong(v) => v.to_string(),
            Value::LLong(v) => v.to_string(),
            Value::ULLong(v) => v.to_string(),
            Value::Boolean(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Pointer(v) => format!("{v:#x}"),
        }
    }

    pub fn parse(ty: ClType, text: &str) -> Result<Value, Error> {
        let value = match ty {
            ClType::Void => {
                if !text.is_empty() {
                    return Err(decode_error(ty, text));
                }
                Value::Void
            }
            ClType::Int => Value::Int(parse_num(ty, text)?),
            ClType::UInt => Value::UInt(parse_num(ty, text)?),
            ClType::Char => Value::Char(parse_num(ty, text)?),
            ClType::UChar => Value::UChar(parse_num(ty, text)?),
            ClType::SInt => Value::SInt(parse_num(ty, text)?),
            ClType::USInt => Value::USInt(parse_num(ty, text)?),
            ClType::Float => Value::Float(parse_num(ty, text)?),
            ClType::Double => Value::Double(parse_num(ty, text)?),
            ClType::Long => Value::Long(parse_num(ty, text)?),
            ClType::ULong => Value::ULong(parse_num(ty, text)?),
            ClType::LLong => Value::LLong(parse_num(ty, text)?),
            ClType::ULLong => Value::ULLong(parse_num(ty, text)?),
            ClType::Boolean => match text {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                _ => return Err(decode_error(ty, text)),
            },
            ClType::String => Value::String(text.to_string()),
            ClType::Pointer => {
                let digits = text
                    .strip_prefix("0x")
                    .ok_or_else(|| decode_error(ty, text))?;
                let address =
                    usize::from_str_radix(digits, 16).map_err(|_| decode_error(ty, text))?;
                Value::Pointer(address)
            }
        };
        Ok(value)
    }

    /// Converts a decoded JSON argument into the declared type, rejecting
    /// values that do not fit the target width.
    pub fn from_json(ty: ClType, json: &JsonValue) -> Result<Value, Error> {
        let mismatch = || {
            Error::new(ErrorKind::Argument)
                .with_message(format!("expected {ty}, got {json}"))
        };
        let value = match ty {
            ClType::Void => match json {
                JsonValue::Null => Value::Void,
                _ => return Err(mismatch()),
            },
            ClType::Int => Value::Int(json_signed(json).ok_or_else(mismatch)?),
            ClType::SInt => Value::SInt(json_signed(json).ok_or_else(mismatch)?),
            ClType::Long => Value::Long(json_signed(json).ok_or_else(mismatch)?),
            ClType::LLong => Value::LLong(json_signed(json).ok_or_else(mismatch)?),
            ClType::UInt => Value::UInt(json_unsigned(json).ok_or_else(mismatch)?),
            ClType::USInt => Value::USInt(json_unsigned(json).ok_or_else(mismatch)?),
            ClType::ULong => Value::ULong(json_unsigned(json).ok_or_else(mismatch)?),
            ClType::ULLong => Value::ULLong(json_unsigned(json).ok_or_else(mismatch)?),
            ClType::UChar => Value::UChar(json_unsigned(json).ok_or_else(mismatch)?),
            ClType::Char => match json {
                JsonValue::String(s) => {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) if c.is_ascii() => Value::Char(c as u8 as c_char),
                        _ => return Err(mismatch()),
                    }
                }
                _ => Value::Char(json_signed(json).ok_or_else(mismatch)?),
            },
            ClType::Float => Value::Float(json.as_f64().ok_or_else(mismatch)? as f32),
            ClType::Double => Value::Double(json.as_f64().ok_or_else(mismatch)?),
            ClType::Boolean => Value::Boolean(json.as_bool().ok_or_else(mismatch)?),
            ClType::String => Value::String(json.as_str().ok_or_else(mismatch)?.to_string()),
            ClType::Pointer => Value::Pointer(json_unsigned(json).ok_or_else(mismatch)?),
        };
        Ok(value)
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Void => JsonValue::Null,
            Value::Int(v) => JsonValue::from(*v),
            Value::UInt(v) => JsonValue::from(*v),
            Value::Char(v) => JsonValue::from(*v),
            Value::UChar(v) => JsonValue::from(*v),
            Value::SInt(v) => JsonValue::from(*v),
            Value::USInt(v) => JsonValue::from(*v),
            Value::Float(v) => JsonValue::from(*v),
            Value::Double(v) => JsonValue::from(*v),
            Value::Long(v) => JsonValue::from(*v),
            Value::ULong(v) => JsonValue::from(*v),
            Value::LLong(v) => JsonValue::from(*v),
            Value::ULLong(v) => JsonValue::from(*v),
            Value::Boolean(v) => JsonValue::from(*v),
            Value::String(v) => JsonValue::from(v.as_str()),
            Value::Pointer(v) => JsonValue::from(format!("{v:#x}")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn parse_num<T: FromStr>(ty: ClType, text: &str) -> Result<T, Error> {
    text.parse::<T>().map_err(|_| decode_error(ty, text))
}

fn decode_error(ty: ClType, text: &str) -> Error {
    Error::new(ErrorKind::Decode).with_message(format!("cannot read {text:?} as {ty}"))
}

fn json_signed<T: TryFrom<i64>>(json: &JsonValue) -> Option<T> {
    json.as_i64().and_then(|v| T::try_from(v).ok())
}

fn json_unsigned<T: TryFrom<u64>>(json: &JsonValue) -> Option<T> {
    json.as_u64().and_then(|v| T::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::{ClType, Value};
    use crate::core::error::ErrorKind;
    use serde_json::json;
    use std::os::raw::{
        c_char, c_int, c_long, c_longlong, c_short, c_uchar, c_uint, c_ulong, c_ulonglong,
        c_ushort,
    };

    fn assert_round_trip(value: Value) {
        let text = value.render();
        let parsed = Value::parse(value.ty(), &text).expect("parse rendered value");
        assert_eq!(parsed, value, "round trip through {text:?}");
    }

    #[test]
    fn integer_boundaries_round_trip_through_text() {
        let values = [
            Value::Int(0),
            Value::Int(c_int::MIN),
            Value::Int(c_int::MAX),
            Value::UInt(0),
            Value::UInt(c_uint::MAX),
            Value::Char(0),
            Value::Char(c_char::MIN),
            Value::Char(c_char::MAX),
            Value::UChar(0),
            Value::UChar(c_uchar::MAX),
            Value::SInt(c_short::MIN),
            Value::SInt(c_short::MAX),
            Value::USInt(c_ushort::MAX),
            Value::Long(c_long::MIN),
            Value::Long(c_long::MAX),
            Value::ULong(c_ulong::MAX),
            Value::LLong(c_longlong::MIN),
            Value::LLong(c_longlong::MAX),
            Value::ULLong(0),
            Value::ULLong(c_ulonglong::MAX),
        ];
        for value in values {
            assert_round_trip(value);
        }
    }

    #[test]
    fn float_boundaries_round_trip_through_text() {
        let values = [
            Value::Float(0.0),
            Value::Float(f32::MIN),
            Value::Float(f32::MAX),
            Value::Float(f32::MIN_POSITIVE),
            Value::Float(42.5),
            Value::Double(0.0),
            Value::Double(f64::MIN),
            Value::Double(f64::MAX),
            Value::Double(4.2),
            Value::Double(f64::INFINITY),
        ];
        for value in values {
            assert_round_trip(value);
        }
    }

    #[test]
    fn non_numeric_values_round_trip_through_text() {
        assert_round_trip(Value::Boolean(true));
        assert_round_trip(Value::Boolean(false));
        assert_round_trip(Value::String("hello, plugin".to_string()));
        assert_round_trip(Value::Pointer(0));
        assert_round_trip(Value::Pointer(0xdead_beef));
        assert_round_trip(Value::Void);
    }

    #[test]
    fn out_of_range_text_is_a_decode_error() {
        let err = Value::parse(ClType::UChar, "256").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        let err = Value::parse(ClType::UInt, "-1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        let err = Value::parse(ClType::Boolean, "yes").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn type_names_parse_and_display() {
        for ty in ClType::ALL {
            assert_eq!(ty.as_str().parse::<ClType>().unwrap(), ty);
            let encoded = serde_json::to_value(ty).unwrap();
            assert_eq!(encoded, json!(ty.as_str()));
        }
        let err = "quad".parse::<ClType>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn only_pointer_is_argument_only() {
        let returnable: Vec<ClType> = ClType::ALL
            .into_iter()
            .filter(ClType::is_return_type)
            .collect();
        assert_eq!(returnable.len(), 15);
        assert!(ClType::String.is_return_type());
        assert!(ClType::Void.is_return_type());
        assert!(!ClType::Pointer.is_return_type());
    }

    #[test]
    fn json_conversion_checks_width() {
        assert_eq!(
            Value::from_json(ClType::UChar, &json!(230)).unwrap(),
            Value::UChar(230)
        );
        assert_eq!(
            Value::from_json(ClType::Char, &json!("b")).unwrap(),
            Value::Char(b'b' as c_char)
        );
        let err = Value::from_json(ClType::SInt, &json!(70000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        let err = Value::from_json(ClType::UInt, &json!(-3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        let err = Value::from_json(ClType::Boolean, &json!("true")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }
}
