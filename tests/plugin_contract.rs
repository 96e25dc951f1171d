// The exported plugin surface exercised through the in-process symbol table.
use std::collections::BTreeSet;
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use cl_plugin::abi::{api_document, decoded_argument_calls, exported_symbols};
use cl_plugin::core::error::ErrorKind;
use cl_plugin::core::registry::{CallShape, MANDATORY_SYMBOLS};
use cl_plugin::core::types::{ClType, Value};
use cl_plugin::host::{LoadedPlugin, MALFORMED_ARGUMENTS, Outcome, SymbolTable, run_conformance};

static FAKE_UNINITS: AtomicUsize = AtomicUsize::new(0);
static FAILED_PLUGIN_UNINITS: AtomicUsize = AtomicUsize::new(0);

extern "C" fn failing_init() -> c_int {
    3
}

extern "C" fn counting_uninit() {
    FAKE_UNINITS.fetch_add(1, Ordering::SeqCst);
}

extern "C" fn failed_plugin_uninit() {
    FAILED_PLUGIN_UNINITS.fetch_add(1, Ordering::SeqCst);
}

extern "C" fn string_api() -> *const c_char {
    cr#"{"API":[
        {"name":"foo_string","return_type":"string"},
        {"name":"foo_nothing","return_type":"string"}
    ]}"#
    .as_ptr()
}

extern "C" fn foo_string() -> *const c_char {
    c"hello from a plugin".as_ptr()
}

extern "C" fn foo_nothing() -> *const c_char {
    ptr::null()
}

#[test]
fn descriptor_lists_exactly_the_exported_capabilities() {
    let symbols = exported_symbols();
    let api = api_document();
    let declared: BTreeSet<&str> = api.function_names().into_iter().collect();

    for name in &declared {
        assert!(symbols.address(name).is_some(), "{name} not exported");
    }
    for name in MANDATORY_SYMBOLS {
        assert!(symbols.address(name).is_some(), "{name} not exported");
    }
    assert!(symbols.address("plugin_api").is_some());
    // metadata + lifecycle + plugin_api + capabilities
    assert_eq!(symbols.len(), MANDATORY_SYMBOLS.len() + 1 + declared.len());
}

#[test]
fn live_return_types_match_descriptor() {
    let ready = LoadedPlugin::load(exported_symbols())
        .expect("load")
        .init()
        .expect("init");
    let registry = ready.registry().expect("ready").clone();
    let mut called = 0;
    for signature in registry.signatures() {
        if signature.call_shape() != CallShape::Nullary {
            continue;
        }
        let value = ready.call(&signature.name).expect("call");
        assert_eq!(value.ty(), signature.return_type, "{}", signature.name);
        called += 1;
    }
    assert_eq!(called, 13);
    assert_eq!(ready.call("foo_uchar").unwrap().render(), "230");
}

#[test]
fn failed_init_blocks_capability_calls() {
    let mut symbols = exported_symbols();
    symbols.insert("plugin_init", failing_init as extern "C" fn() -> c_int as *const _);
    symbols.insert("plugin_uninit", failed_plugin_uninit as extern "C" fn() as *const _);

    let loaded = LoadedPlugin::load(symbols).expect("load");
    let failure = loaded.init().err().expect("init must fail");
    assert_eq!(failure.error.kind(), ErrorKind::Lifecycle);
    assert_eq!(failure.error.native_code(), Some(3));
    drop(failure);
    assert_eq!(FAILED_PLUGIN_UNINITS.load(Ordering::SeqCst), 0);

    let mut symbols = exported_symbols();
    symbols.insert("plugin_init", failing_init as extern "C" fn() -> c_int as *const _);
    let report = run_conformance(symbols);
    assert!(!report.passed);
    let last = report.checks.last().expect("checks");
    assert_eq!(last.name, "plugin_init");
    assert!(last.outcome.is_failure());
    assert!(
        report
            .checks
            .iter()
            .all(|check| !check.name.starts_with("foo_"))
    );
}

#[test]
fn uninit_runs_once_after_successful_init() {
    let mut symbols = exported_symbols();
    symbols.insert("plugin_uninit", counting_uninit as extern "C" fn() as *const _);
    let before = FAKE_UNINITS.load(Ordering::SeqCst);
    {
        let ready = LoadedPlugin::load(symbols).unwrap().init().unwrap();
        assert!(ready.call("foo_int").is_ok());
    }
    assert_eq!(FAKE_UNINITS.load(Ordering::SeqCst), before + 1);
}

#[test]
fn malformed_json_leaves_state_unchanged() {
    let ready = LoadedPlugin::load(exported_symbols())
        .unwrap()
        .init()
        .unwrap();
    let before = decoded_argument_calls();
    for text in [MALFORMED_ARGUMENTS, "", "[]", "null", "{\"arg1\": \"one\"}"] {
        ready.call_with_text("foo_args", text).expect("call returns");
    }
    assert_eq!(decoded_argument_calls(), before);

    let valid = serde_json::json!({
        "arg1": 1, "arg2": 2, "arg3": -3, "arg4": 4, "arg5": "c", "arg6": 6,
        "arg7": 7.5, "arg8": 8.25, "arg9": -9, "arg10": 10, "arg11": -11,
        "arg12": 12, "arg13": true, "arg14": "fourteen"
    });
    ready
        .call_with_text("foo_args", &valid.to_string())
        .expect("valid call");
    assert!(decoded_argument_calls() > before);
}

#[test]
fn conformance_report_covers_every_capability() {
    let report = run_conformance(exported_symbols());
    assert!(report.passed);
    let api = api_document();
    for name in api.function_names() {
        let check = report
            .checks
            .iter()
            .find(|check| check.name == name)
            .unwrap_or_else(|| panic!("{name} not checked"));
        match api.return_type(name).unwrap() {
            ClType::Void => assert!(matches!(
                check.outcome,
                Outcome::Survived | Outcome::Resolved
            )),
            ty => match &check.outcome {
                Outcome::Returned { ty: reported, .. } => assert_eq!(reported, ty.as_str()),
                other => assert!(matches!(other, Outcome::Resolved), "{name}: {other:?}"),
            },
        }
    }
}

#[test]
fn string_returning_capabilities_are_copied_out() {
    let mut symbols = exported_symbols();
    symbols.insert("plugin_api", string_api as extern "C" fn() -> *const c_char as *const _);
    symbols.insert("foo_string", foo_string as extern "C" fn() -> *const c_char as *const _);
    symbols.insert("foo_nothing", foo_nothing as extern "C" fn() -> *const c_char as *const _);

    let ready = LoadedPlugin::load(symbols.clone())
        .expect("load")
        .init()
        .expect("init");
    assert_eq!(
        ready.call("foo_string").unwrap(),
        Value::String("hello from a plugin".to_string())
    );
    let err = ready.call("foo_nothing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(err.function(), Some("foo_nothing"));
    drop(ready);

    let report = run_conformance(symbols);
    let check = report
        .checks
        .iter()
        .find(|check| check.name == "foo_string")
        .expect("foo_string checked");
    assert_eq!(
        check.outcome,
        Outcome::Returned {
            ty: "string".to_string(),
            value: serde_json::json!("hello from a plugin"),
        }
    );
    assert!(!report.passed);
}
