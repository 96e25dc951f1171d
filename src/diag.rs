//! Purpose: Injectable sink for non-fatal diagnostics raised inside capability calls.
//! Exports: `Diagnostic`, `DiagnosticSink`, `TracingSink`, `MemorySink`, `diagnostic_json`.
//! Role: Replaces ad hoc printing in decode paths; callers pass the sink explicitly.
//! Invariants: Reporting never fails and never alters a call's return value.
//! Invariants: JSON schema is additive-only once published.
use std::sync::Mutex;

use serde_json::{Map, Value, json};
use tracing::warn;

use crate::core::error::{Error, ErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub function: String,
    pub message: String,
    pub details: Map<String, Value>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, function: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            function: function.into(),
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn from_error(function: impl Into<String>, err: &Error) -> Self {
        let mut diagnostic = Self::new(
            err.kind(),
            function,
            err.message().unwrap_or("unspecified failure"),
        );
        if let Some(argument) = err.argument() {
            diagnostic = diagnostic.with_detail("argument", json!(argument));
        }
        if let Some(code) = err.native_code() {
            diagnostic = diagnostic.with_detail("native_code", json!(code));
        }
        diagnostic
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to the `tracing` subscriber at `warn`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        let details = Value::Object(diagnostic.details.clone());
        warn!(
            kind = ?diagnostic.kind,
            function = %diagnostic.function,
            details = %details,
            "{}",
            diagnostic.message
        );
    }
}

/// Keeps every reported diagnostic; used where callers inspect them afterwards.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }
}

pub fn diagnostic_json(diagnostic: &Diagnostic) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", diagnostic.kind)));
    inner.insert("function".to_string(), json!(diagnostic.function));
    inner.insert("message".to_string(), json!(diagnostic.message));
    inner.insert(
        "details".to_string(),
        Value::Object(diagnostic.details.clone()),
    );

    let mut outer = Map::new();
    outer.insert("diagnostic".to_string(), Value::Object(inner));
    Value::Object(outer)
}
