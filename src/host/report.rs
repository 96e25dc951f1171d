//! Purpose: Run a plugin through the ABI contract and record what happened.
//! Exports: `ConformanceReport`, `Check`, `Outcome`, `run_conformance`.
//! Role: Shared by the conformance CLI and the integration tests.
//! Invariants: Capabilities are called only after `plugin_init` returned zero.
//! Invariants: Report JSON is additive-only once published.
use serde::Serialize;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

use crate::core::error::{Error, to_status_code};
use crate::core::registry::CallShape;
use crate::host::library::SymbolTable;
use crate::host::plugin::{LoadedPlugin, PluginInfo};

/// Text handed to JSON-argument capabilities to prove malformed input is survivable.
pub const MALFORMED_ARGUMENTS: &str = "{\"arg1\": ";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A lifecycle step completed.
    Passed,
    /// A zero-argument capability returned a value of its declared type.
    Returned {
        #[serde(rename = "type")]
        ty: String,
        value: JsonValue,
    },
    /// A capability was called with malformed or null input and returned.
    Survived,
    /// The symbol resolved but needs a native argument bag to call.
    Resolved,
    Failed {
        kind: String,
        code: i32,
        message: String,
    },
}

impl Outcome {
    fn failed(err: &Error) -> Self {
        Outcome::Failed {
            kind: format!("{:?}", err.kind()),
            code: to_status_code(err.kind()),
            message: err.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Check {
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConformanceReport {
    pub checked_at: String,
    pub plugin: Option<PluginInfo>,
    pub passed: bool,
    pub checks: Vec<Check>,
}

impl ConformanceReport {
    fn new() -> Self {
        Self {
            checked_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            plugin: None,
            passed: true,
            checks: Vec::new(),
        }
    }

    fn record(&mut self, name: &str, outcome: Outcome) {
        if outcome.is_failure() {
            warn!(check = name, ?outcome, "conformance check failed");
            self.passed = false;
        }
        self.checks.push(Check {
            name: name.to_string(),
            outcome,
        });
    }

    fn fail(mut self, name: &str, err: &Error) -> Self {
        self.record(name, Outcome::failed(err));
        self
    }

    /// `0` when every check passed, otherwise the status code of the first failure.
    pub fn exit_code(&self) -> i32 {
        self.checks
            .iter()
            .find_map(|check| match &check.outcome {
                Outcome::Failed { code, .. } => Some(*code),
                _ => None,
            })
            .unwrap_or(0)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|check| check.outcome.is_failure())
    }
}

/// Loads, initializes, exercises, and shuts down the plugin behind `symbols`.
pub fn run_conformance<S: SymbolTable>(symbols: S) -> ConformanceReport {
    let mut report = ConformanceReport::new();

    let loaded = match LoadedPlugin::load(symbols) {
        Ok(loaded) => loaded,
        Err(err) => return report.fail("load", &err),
    };
    report.plugin = Some(loaded.info().clone());
    report.record("load", Outcome::Passed);

    let signatures: Vec<_> = loaded.registry().signatures().cloned().collect();
    let ready = match loaded.init() {
        Ok(ready) => ready,
        Err(failure) => return report.fail("plugin_init", &failure.error),
    };
    report.record("plugin_init", Outcome::Passed);

    for signature in &signatures {
        let name = signature.name.as_str();
        let result = match signature.call_shape() {
            CallShape::Nullary => ready.call(name).map(|value| Outcome::Returned {
                ty: value.ty().to_string(),
                value: value.to_json(),
            }),
            CallShape::Json => ready
                .call_with_text(name, MALFORMED_ARGUMENTS)
                .map(|_| Outcome::Survived),
            // SAFETY: a null pointer is the documented "no value" sentinel.
            CallShape::Pointer => unsafe { ready.call_with_pointer(name, std::ptr::null_mut()) }
                .map(|_| Outcome::Survived),
            CallShape::Bag => Ok(Outcome::Resolved),
        };
        match result {
            Ok(outcome) => report.record(name, outcome),
            Err(err) => report.record(name, Outcome::failed(&err)),
        }
    }

    if ready.shutdown().is_some() {
        report.record("plugin_uninit", Outcome::Passed);
    }
    info!(
        passed = report.passed,
        checks = report.checks.len(),
        "conformance run finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::{Outcome, run_conformance};
    use crate::abi::exported_symbols;
    use crate::core::error::{ErrorKind, to_status_code};

    #[test]
    fn builtin_plugin_passes() {
        let report = run_conformance(exported_symbols());
        assert!(report.passed, "{:?}", report.failures().collect::<Vec<_>>());
        assert_eq!(report.exit_code(), 0);
        let foo_uint = report
            .checks
            .iter()
            .find(|check| check.name == "foo_uint")
            .expect("foo_uint checked");
        assert_eq!(
            foo_uint.outcome,
            Outcome::Returned {
                ty: "uint".to_string(),
                value: serde_json::json!(420)
            }
        );
        assert_eq!(report.checks.last().unwrap().name, "plugin_uninit");
    }

    #[test]
    fn missing_capability_fails_load() {
        let mut symbols = exported_symbols();
        symbols.remove("foo_double");
        let report = run_conformance(symbols);
        assert!(!report.passed);
        assert!(report.plugin.is_none());
        assert_eq!(report.exit_code(), to_status_code(ErrorKind::NotFound));
    }

    #[test]
    fn report_serializes_flat_checks() {
        let report = run_conformance(exported_symbols());
        let json = serde_json::to_value(&report).unwrap();
        let first = &json["checks"][0];
        assert_eq!(first["name"], "load");
        assert_eq!(first["outcome"], "passed");
        assert_eq!(json["plugin"]["name"], "RUST-PLUGIN");
        assert!(json["checked_at"].as_str().is_some_and(|s| !s.is_empty()));
    }
}
