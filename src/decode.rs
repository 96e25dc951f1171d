//! Purpose: Best-effort decoding of JSON-encoded capability arguments.
//! Exports: `decode_arguments`, `decode_c_arguments`, `typed_arguments`, `ParseFailureCategory`.
//! Role: Single seam for argument JSON so capability functions avoid ad hoc parsing.
//! Invariants: Failures are reported to the supplied sink and yield `None`; nothing panics.
//! Invariants: Diagnostics carry category and position only, never the raw payload.
use std::ffi::CStr;
use std::os::raw::c_char;

use serde_json::error::Category;
use serde_json::{Map, Value as JsonValue, json};

use crate::core::error::{Error, ErrorKind};
use crate::core::types::{ClType, Value};
use crate::diag::{Diagnostic, DiagnosticSink};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseFailureCategory {
    Syntax,
    Eof,
    Data,
    Io,
    NotObject,
    Utf8,
    Null,
}

impl ParseFailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseFailureCategory::Syntax => "syntax",
            ParseFailureCategory::Eof => "eof",
            ParseFailureCategory::Data => "data",
            ParseFailureCategory::Io => "io",
            ParseFailureCategory::NotObject => "not-object",
            ParseFailureCategory::Utf8 => "utf8",
            ParseFailureCategory::Null => "null",
        }
    }
}

pub fn categorize_error(err: &serde_json::Error) -> ParseFailureCategory {
    match err.classify() {
        Category::Syntax => ParseFailureCategory::Syntax,
        Category::Eof => ParseFailureCategory::Eof,
        Category::Data => ParseFailureCategory::Data,
        Category::Io => ParseFailureCategory::Io,
    }
}

fn report(
    sink: &dyn DiagnosticSink,
    function: &str,
    category: ParseFailureCategory,
    message: &str,
) {
    sink.report(
        Diagnostic::new(ErrorKind::Decode, function, message)
            .with_detail("category", json!(category.as_str())),
    );
}

/// Decodes `text` as a JSON object of named arguments.
pub fn decode_arguments(
    function: &str,
    text: &str,
    sink: &dyn DiagnosticSink,
) -> Option<Map<String, JsonValue>> {
    match serde_json::from_str::<JsonValue>(text) {
        Ok(JsonValue::Object(map)) => Some(map),
        Ok(_) => {
            report(
                sink,
                function,
                ParseFailureCategory::NotObject,
                "arguments must be a JSON object",
            );
            None
        }
        Err(err) => {
            let diagnostic = Diagnostic::new(ErrorKind::Decode, function, "invalid argument json")
                .with_detail("category", json!(categorize_error(&err).as_str()))
                .with_detail("line", json!(err.line()))
                .with_detail("column", json!(err.column()));
            sink.report(diagnostic);
            None
        }
    }
}

/// # Safety
///
/// `args` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub unsafe fn decode_c_arguments(
    function: &str,
    args: *const c_char,
    sink: &dyn DiagnosticSink,
) -> Option<Map<String, JsonValue>> {
    if args.is_null() {
        report(sink, function, ParseFailureCategory::Null, "arguments pointer is null");
        return None;
    }
    let raw = unsafe { CStr::from_ptr(args) };
    match raw.to_str() {
        Ok(text) => decode_arguments(function, text, sink),
        Err(_) => {
            report(
                sink,
                function,
                ParseFailureCategory::Utf8,
                "arguments are not valid UTF-8",
            );
            None
        }
    }
}

/// Converts decoded arguments to the declared types. Any missing or
/// mistyped argument is reported and the whole set is rejected.
pub fn typed_arguments(
    function: &str,
    arguments: &Map<String, JsonValue>,
    declared: &[(String, ClType)],
    sink: &dyn DiagnosticSink,
) -> Option<Vec<(String, Value)>> {
    let mut values = Vec::with_capacity(declared.len());
    for (name, ty) in declared {
        let result = arguments
            .get(name)
            .ok_or_else(|| Error::new(ErrorKind::Argument).with_message("argument not found"))
            .and_then(|json| Value::from_json(*ty, json));
        match result {
            Ok(value) => values.push((name.clone(), value)),
            Err(err) => {
                sink.report(Diagnostic::from_error(function, &err.with_argument(name.as_str())));
                return None;
            }
        }
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::{ParseFailureCategory, decode_arguments, decode_c_arguments, typed_arguments};
    use crate::core::error::ErrorKind;
    use crate::core::types::{ClType, Value};
    use crate::diag::MemorySink;
    use std::ffi::CString;
    use std::ptr;

    #[test]
    fn valid_object_decodes_without_diagnostics() {
        let sink = MemorySink::new();
        let map = decode_arguments("foo_args", r#"{"arg1": 1}"#, &sink).expect("object");
        assert_eq!(map.get("arg1").and_then(|v| v.as_i64()), Some(1));
        assert!(sink.is_empty());
    }

    #[test]
    fn malformed_json_is_reported_with_category() {
        let sink = MemorySink::new();
        assert!(decode_arguments("foo_args", r#"{"a":}"#, &sink).is_none());
        assert!(decode_arguments("foo_args", r#"{"a":1"#, &sink).is_none());
        assert!(decode_arguments("foo_args", "[1, 2]", &sink).is_none());
        let categories: Vec<_> = sink
            .take()
            .into_iter()
            .map(|d| {
                assert_eq!(d.kind, ErrorKind::Decode);
                d.details
                    .get("category")
                    .and_then(|v| v.as_str())
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(
            categories,
            vec![
                ParseFailureCategory::Syntax.as_str(),
                ParseFailureCategory::Eof.as_str(),
                ParseFailureCategory::NotObject.as_str(),
            ]
        );
    }

    #[test]
    fn null_and_non_utf8_pointers_are_reported() {
        let sink = MemorySink::new();
        assert!(unsafe { decode_c_arguments("foo_args", ptr::null(), &sink) }.is_none());
        let bad = CString::new(vec![0xff, b'{', b'}']).unwrap();
        assert!(unsafe { decode_c_arguments("foo_args", bad.as_ptr(), &sink) }.is_none());
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn typed_arguments_follow_declaration() {
        let sink = MemorySink::new();
        let map = decode_arguments("f", r#"{"a": 5, "b": "x", "c": true}"#, &sink).unwrap();
        let declared = vec![
            ("a".to_string(), ClType::USInt),
            ("b".to_string(), ClType::String),
            ("c".to_string(), ClType::Boolean),
        ];
        let values = typed_arguments("f", &map, &declared, &sink).expect("typed");
        assert_eq!(values[0].1, Value::USInt(5));
        assert_eq!(values[1].1, Value::String("x".to_string()));
        assert_eq!(values[2].1, Value::Boolean(true));

        let declared = vec![("missing".to_string(), ClType::Int)];
        assert!(typed_arguments("f", &map, &declared, &sink).is_none());
        let reported = sink.take();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].kind, ErrorKind::Argument);
        assert_eq!(
            reported[0].details.get("argument").and_then(|v| v.as_str()),
            Some("missing")
        );
    }
}
