//! Purpose: The exported plugin surface loaded by a libcollections host.
//! Exports: `plugin_*` metadata and lifecycle symbols, the `foo_*` capabilities,
//! `api_document`, `exported_symbols`, `sum_arguments`.
//! Role: Stable C ABI; everything behind it is safe Rust with `Result` returns.
//! Invariants: The descriptor and the exported capabilities come from one table.
//! Invariants: No exported function panics or unwraps; failures become logs or sentinels.
//! Invariants: Metadata pointers are static and never freed by the host.
use std::ffi::{CStr, CString};
use std::os::raw::{
    c_char, c_int, c_long, c_longlong, c_short, c_uchar, c_uint, c_ulong, c_ulonglong, c_ushort,
    c_void,
};
use std::ptr::NonNull;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::bridge::{Arguments, Runtime};
use crate::core::api::{ApiDocument, FunctionDescriptor};
use crate::core::error::{Error, ErrorKind, to_status_code};
use crate::core::types::{ClType, Value};
use crate::decode::{decode_c_arguments, typed_arguments};
use crate::diag::TracingSink;
use crate::host::StaticSymbols;

/// Environment variable holding the plugin's log filter directives.
pub const LOG_ENV: &str = "CL_PLUGIN_LOG";

/// Returned by `foo_arguments` when an argument is missing, mistyped, or the
/// sum overflows.
pub const ARGUMENT_SENTINEL: c_int = -1;

const NAME: &CStr = c"RUST-PLUGIN";
const AUTHOR: &CStr = c"cl-plugin contributors";
const DESCRIPTION: &CStr = c"Rust plugin example";
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

const FOO_ARGS: [(&str, ClType); 14] = [
    ("arg1", ClType::Int),
    ("arg2", ClType::UInt),
    ("arg3", ClType::SInt),
    ("arg4", ClType::USInt),
    ("arg5", ClType::Char),
    ("arg6", ClType::UChar),
    ("arg7", ClType::Float),
    ("arg8", ClType::Double),
    ("arg9", ClType::Long),
    ("arg10", ClType::ULong),
    ("arg11", ClType::LLong),
    ("arg12", ClType::ULLong),
    ("arg13", ClType::Boolean),
    ("arg14", ClType::String),
];

static DECODED_ARGUMENT_CALLS: AtomicU64 = AtomicU64::new(0);

/// One exported capability: its descriptor entry and its address.
struct Capability {
    descriptor: FunctionDescriptor,
    address: *const c_void,
}

macro_rules! constant_capabilities {
    ($($name:ident -> $rust:ty : $ty:ident = $value:expr;)*) => {
        $(
            #[unsafe(no_mangle)]
            pub extern "C" fn $name() -> $rust {
                $value
            }
        )*

        fn constant_capabilities() -> Vec<Capability> {
            vec![$(
                Capability {
                    descriptor: FunctionDescriptor::new(stringify!($name), ClType::$ty),
                    address: $name as extern "C" fn() -> $rust as *const c_void,
                },
            )*]
        }
    };
}

constant_capabilities! {
    foo_int -> c_int: Int = 42;
    foo_uint -> c_uint: UInt = 420;
    foo_char -> c_char: Char = b'a' as c_char;
    foo_uchar -> c_uchar: UChar = 230;
    foo_sint -> c_short: SInt = 421;
    foo_usint -> c_ushort: USInt = 4201;
    foo_float -> f32: Float = 42.5;
    foo_double -> f64: Double = 4.2;
    foo_long -> c_long: Long = 42000;
    foo_ulong -> c_ulong: ULong = 420001;
    foo_llong -> c_longlong: LLong = 420009;
    foo_ullong -> c_ulonglong: ULLong = 4200019;
    foo_boolean -> bool: Boolean = false;
}

fn capabilities() -> Vec<Capability> {
    let mut table = constant_capabilities();
    table.push(Capability {
        descriptor: FOO_ARGS
            .iter()
            .fold(FunctionDescriptor::new("foo_args", ClType::Void), |f, (name, ty)| {
                f.with_argument(*name, *ty)
            }),
        address: foo_args as unsafe extern "C" fn(*const c_char) as *const c_void,
    });
    table.push(Capability {
        descriptor: FunctionDescriptor::new("foo_pointer", ClType::Void)
            .with_argument("ptr", ClType::Pointer),
        address: foo_pointer as extern "C" fn(*mut c_void) as *const c_void,
    });
    #[cfg(feature = "libcollections")]
    table.push(Capability {
        descriptor: FunctionDescriptor::new("foo_arguments", ClType::Int).variadic(),
        address: foo_arguments as unsafe extern "C" fn(*mut c_void) -> c_int as *const c_void,
    });
    table
}

/// The descriptor served by `plugin_api`.
pub fn api_document() -> ApiDocument {
    ApiDocument::new(
        capabilities()
            .into_iter()
            .map(|capability| capability.descriptor)
            .collect(),
    )
}

/// Every symbol this plugin exports, resolved in-process.
pub fn exported_symbols() -> StaticSymbols {
    let mut symbols = StaticSymbols::new();
    symbols.insert("plugin_name", plugin_name as extern "C" fn() -> *const c_char as *const c_void);
    symbols.insert("plugin_version", plugin_version as extern "C" fn() -> *const c_char as *const c_void);
    symbols.insert("plugin_author", plugin_author as extern "C" fn() -> *const c_char as *const c_void);
    symbols.insert(
        "plugin_description",
        plugin_description as extern "C" fn() -> *const c_char as *const c_void,
    );
    symbols.insert("plugin_api", plugin_api as extern "C" fn() -> *const c_char as *const c_void);
    symbols.insert("plugin_init", plugin_init as extern "C" fn() -> c_int as *const c_void);
    symbols.insert("plugin_uninit", plugin_uninit as extern "C" fn() as *const c_void);
    for capability in capabilities() {
        symbols.insert(capability.descriptor.name.as_str(), capability.address);
    }
    symbols
}

/// Number of `foo_args` calls whose arguments decoded completely.
pub fn decoded_argument_calls() -> u64 {
    DECODED_ARGUMENT_CALLS.load(Ordering::Relaxed)
}

/// Installs the plugin's subscriber. A subscriber the host already installed wins.
pub fn init_logging(directives: Option<&str>) -> Result<(), Error> {
    let filter = match directives {
        Some(directives) => EnvFilter::try_new(directives).map_err(|err| {
            Error::new(ErrorKind::Usage).with_message(format!("invalid {LOG_ENV} filter: {err}"))
        })?,
        None => EnvFilter::new("info"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

/// Reads `a` and `b` from the argument bag and returns their sum.
pub fn sum_arguments<R: Runtime + ?Sized>(arguments: &Arguments<'_, R>) -> Result<c_int, Error> {
    let a = arguments.int("a")?;
    let b = arguments.int("b")?;
    a.checked_add(b).ok_or_else(|| {
        Error::new(ErrorKind::Argument)
            .with_message("sum overflows int")
            .with_function("foo_arguments")
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn plugin_name() -> *const c_char {
    NAME.as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn plugin_version() -> *const c_char {
    VERSION.as_ptr().cast()
}

#[unsafe(no_mangle)]
pub extern "C" fn plugin_author() -> *const c_char {
    AUTHOR.as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn plugin_description() -> *const c_char {
    DESCRIPTION.as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn plugin_api() -> *const c_char {
    static API: OnceLock<CString> = OnceLock::new();
    API.get_or_init(|| {
        api_document()
            .to_json(false)
            .ok()
            .and_then(|text| CString::new(text).ok())
            .unwrap_or_else(|| CString::from(c"{\"API\":[]}"))
    })
    .as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn plugin_init() -> c_int {
    let directives = std::env::var(LOG_ENV).ok();
    if let Err(err) = init_logging(directives.as_deref()) {
        eprintln!("{err}");
        return to_status_code(err.kind());
    }
    info!(
        name = %NAME.to_string_lossy(),
        version = env!("CARGO_PKG_VERSION"),
        "plugin init"
    );
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn plugin_uninit() {
    info!(name = %NAME.to_string_lossy(), "plugin uninit");
}

/// # Safety
///
/// `args` must be null or a NUL-terminated string valid for the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn foo_args(args: *const c_char) {
    let sink = TracingSink;
    let Some(decoded) = (unsafe { decode_c_arguments("foo_args", args, &sink) }) else {
        return;
    };
    let declared: Vec<(String, ClType)> = FOO_ARGS
        .iter()
        .map(|(name, ty)| (name.to_string(), *ty))
        .collect();
    let Some(values) = typed_arguments("foo_args", &decoded, &declared, &sink) else {
        return;
    };
    DECODED_ARGUMENT_CALLS.fetch_add(1, Ordering::Relaxed);
    for (name, value) in &values {
        debug!(argument = %name, ty = %value.ty(), "{value}");
    }
    if let Some((_, Value::Int(arg1))) = values.first() {
        info!(arg1 = *arg1, "foo_args");
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn foo_pointer(ptr: *mut c_void) {
    match NonNull::new(ptr) {
        Some(ptr) => info!(address = ?ptr, "foo_pointer"),
        None => info!("foo_pointer received null"),
    }
}

/// # Safety
///
/// `bag` must be null or a live `cl_plugin_arg_t` handed over by the host for this call.
#[cfg(feature = "libcollections")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn foo_arguments(bag: *mut c_void) -> c_int {
    use crate::bridge::Linked;
    use crate::diag::{Diagnostic, DiagnosticSink};

    let result = unsafe { Arguments::from_raw(&Linked, bag) }
        .and_then(|arguments| sum_arguments(&arguments));
    match result {
        Ok(sum) => sum,
        Err(err) => {
            TracingSink.report(Diagnostic::from_error("foo_arguments", &err));
            ARGUMENT_SENTINEL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ARGUMENT_SENTINEL, api_document, decoded_argument_calls, foo_args, foo_boolean, foo_char,
        foo_long, init_logging, plugin_api, plugin_name, plugin_version, sum_arguments,
    };
    use crate::bridge::{Arguments, Loopback};
    use crate::core::api::ApiDocument;
    use crate::core::error::ErrorKind;
    use crate::core::types::{ClType, Value};
    use std::ffi::{CStr, CString};

    #[test]
    fn metadata_is_nul_terminated_text() {
        let name = unsafe { CStr::from_ptr(plugin_name()) };
        assert_eq!(name.to_str().unwrap(), "RUST-PLUGIN");
        let version = unsafe { CStr::from_ptr(plugin_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn plugin_api_matches_capability_table() {
        let text = unsafe { CStr::from_ptr(plugin_api()) }.to_str().unwrap();
        let parsed = ApiDocument::parse(text).expect("descriptor parses");
        assert_eq!(parsed, api_document());
        assert_eq!(parsed.return_type("foo_long").unwrap(), ClType::Long);
        assert_eq!(parsed.argument_type("foo_args", "arg14").unwrap(), ClType::String);
        assert_eq!(
            parsed.argument_type("foo_pointer", "ptr").unwrap(),
            ClType::Pointer
        );
        assert_eq!(
            parsed.function("foo_arguments").is_some(),
            cfg!(feature = "libcollections")
        );
    }

    #[test]
    fn constant_capabilities_return_declared_values() {
        assert_eq!(foo_char(), b'a' as std::os::raw::c_char);
        assert_eq!(foo_long(), 42000);
        assert!(!foo_boolean());
    }

    #[test]
    fn foo_args_ignores_malformed_input() {
        let before = decoded_argument_calls();
        let bad = CString::new(r#"{"arg1": 1,"#).unwrap();
        unsafe { foo_args(bad.as_ptr()) };
        unsafe { foo_args(std::ptr::null()) };
        assert_eq!(decoded_argument_calls(), before);
    }

    #[test]
    fn invalid_log_filter_is_rejected() {
        let err = init_logging(Some("cl_plugin=notalevel")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn sum_arguments_reads_the_bag() {
        let runtime = Loopback::new();
        let bag = runtime.new_arguments(vec![
            ("a".to_string(), Value::Int(40)),
            ("b".to_string(), Value::Int(2)),
        ]);
        let arguments = unsafe { Arguments::from_raw(&runtime, bag.as_ptr()) }.unwrap();
        assert_eq!(sum_arguments(&arguments).unwrap(), 42);

        let bag = runtime.new_arguments(vec![("a".to_string(), Value::Int(i32::MAX))]);
        let arguments = unsafe { Arguments::from_raw(&runtime, bag.as_ptr()) }.unwrap();
        let err = sum_arguments(&arguments).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert_eq!(err.argument(), Some("b"));
        assert_ne!(ARGUMENT_SENTINEL, 0);
    }
}
