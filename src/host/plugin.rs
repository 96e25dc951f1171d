//! Purpose: Drive a plugin through its lifecycle and call its capabilities.
//! Exports: `PluginInfo`, `LoadedPlugin`, `InitFailure`, `ReadyPlugin`.
//! Role: Typestate wrapper so capability calls exist only after a successful init.
//! Invariants: `ReadyPlugin` is produced only by a zero `plugin_init` status.
//! Invariants: `plugin_uninit` runs exactly once per successful init.
//! Invariants: Every call is checked against the registry before the address is used.
use std::ffi::CStr;
use std::fmt;
use std::os::raw::{
    c_char, c_int, c_long, c_longlong, c_short, c_uchar, c_uint, c_ulong, c_ulonglong, c_ushort,
    c_void,
};
use std::ptr::NonNull;

use serde::Serialize;
use tracing::{debug, warn};

use crate::bridge::c_text;
use crate::core::api::ApiDocument;
use crate::core::error::{Error, ErrorKind};
use crate::core::registry::{CallShape, CapabilityRegistry, Signature, SymbolResolver};
use crate::core::types::{ClType, Value};
use crate::host::library::SymbolTable;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
}

/// A plugin whose metadata, descriptor, and symbols have been checked.
pub struct LoadedPlugin<S: SymbolTable> {
    symbols: S,
    info: PluginInfo,
    api: ApiDocument,
    registry: CapabilityRegistry,
}

/// `plugin_init` returned non-zero; the plugin is handed back unusable for calls.
pub struct InitFailure<S: SymbolTable> {
    pub plugin: LoadedPlugin<S>,
    pub error: Error,
}

impl<S: SymbolTable> fmt::Debug for InitFailure<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitFailure")
            .field("plugin", &self.plugin.info.name)
            .field("error", &self.error)
            .finish()
    }
}

/// An initialized plugin. Dropping it runs `plugin_uninit`.
pub struct ReadyPlugin<S: SymbolTable> {
    inner: Option<LoadedPlugin<S>>,
}

struct Resolved<'a, S>(&'a S);

impl<S: SymbolTable> SymbolResolver for Resolved<'_, S> {
    fn has_symbol(&self, name: &str) -> bool {
        self.0.address(name).is_some()
    }
}

enum CallArg {
    None,
    Pointer(*mut c_void),
    Text(*const c_char),
}

macro_rules! invoke {
    ($address:expr, ($($arg_ty:ty),*), ($($arg:expr),*), $ret:ty) => {{
        // SAFETY: the caller checked the declared signature for this address.
        let f = unsafe {
            std::mem::transmute::<*mut c_void, unsafe extern "C" fn($($arg_ty),*) -> $ret>($address)
        };
        unsafe { f($($arg),*) }
    }};
}

macro_rules! returning {
    ($address:expr, $arg:expr, $ret:ty) => {
        match $arg {
            CallArg::None => invoke!($address, (), (), $ret),
            CallArg::Pointer(ptr) => invoke!($address, (*mut c_void), (ptr), $ret),
            CallArg::Text(text) => invoke!($address, (*const c_char), (text), $ret),
        }
    };
}

/// # Safety
///
/// `address` must be a function whose C signature matches `return_type` and `arg`.
unsafe fn dispatch(address: NonNull<c_void>, return_type: ClType, arg: CallArg) -> Result<Value, Error> {
    let address = address.as_ptr();
    let value = match return_type {
        ClType::Int => Value::Int(returning!(address, arg, c_int)),
        ClType::UInt => Value::UInt(returning!(address, arg, c_uint)),
        ClType::Char => Value::Char(returning!(address, arg, c_char)),
        ClType::UChar => Value::UChar(returning!(address, arg, c_uchar)),
        ClType::SInt => Value::SInt(returning!(address, arg, c_short)),
        ClType::USInt => Value::USInt(returning!(address, arg, c_ushort)),
        ClType::Long => Value::Long(returning!(address, arg, c_long)),
        ClType::ULong => Value::ULong(returning!(address, arg, c_ulong)),
        ClType::LLong => Value::LLong(returning!(address, arg, c_longlong)),
        ClType::ULLong => Value::ULLong(returning!(address, arg, c_ulonglong)),
        ClType::Float => Value::Float(returning!(address, arg, f32)),
        ClType::Double => Value::Double(returning!(address, arg, f64)),
        ClType::Boolean => Value::Boolean(returning!(address, arg, bool)),
        ClType::Void => {
            returning!(address, arg, ());
            Value::Void
        }
        ClType::String => {
            let text = returning!(address, arg, *const c_char);
            if text.is_null() {
                return Err(Error::new(ErrorKind::Decode).with_message("string result is null"));
            }
            // SAFETY: a non-null string result is NUL-terminated and outlives this copy.
            let text = unsafe { CStr::from_ptr(text) };
            Value::String(text.to_str().map(str::to_string).map_err(|err| {
                Error::new(ErrorKind::Decode)
                    .with_message("string result is not valid UTF-8")
                    .with_source(err)
            })?)
        }
        ClType::Pointer => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("{return_type} is not a return type")));
        }
    };
    Ok(value)
}

fn require<S: SymbolTable>(symbols: &S, name: &str) -> Result<NonNull<c_void>, Error> {
    symbols.address(name).ok_or_else(|| {
        Error::new(ErrorKind::NotFound)
            .with_message("symbol not exported")
            .with_function(name)
    })
}

fn metadata<S: SymbolTable>(symbols: &S, name: &str) -> Result<String, Error> {
    let address = require(symbols, name)?;
    // SAFETY: metadata symbols are `fn() -> *const c_char` by the plugin ABI.
    let text = invoke!(address.as_ptr(), (), (), *const c_char);
    if text.is_null() {
        return Err(Error::new(ErrorKind::Decode)
            .with_message("metadata is null")
            .with_function(name));
    }
    // SAFETY: non-null metadata points to static NUL-terminated text.
    let text = unsafe { CStr::from_ptr(text) };
    text.to_str().map(str::to_string).map_err(|err| {
        Error::new(ErrorKind::Decode)
            .with_message("metadata is not valid UTF-8")
            .with_function(name)
            .with_source(err)
    })
}

impl<S: SymbolTable> LoadedPlugin<S> {
    /// Reads metadata and the descriptor, then checks every declared symbol resolves.
    pub fn load(symbols: S) -> Result<Self, Error> {
        let info = PluginInfo {
            name: metadata(&symbols, "plugin_name")?,
            version: metadata(&symbols, "plugin_version")?,
            author: metadata(&symbols, "plugin_author")?,
            description: metadata(&symbols, "plugin_description")?,
        };
        let api = match symbols.address("plugin_api") {
            Some(_) => ApiDocument::parse(&metadata(&symbols, "plugin_api")?)
                .map_err(|err| err.with_function("plugin_api"))?,
            None => ApiDocument::new(Vec::new()),
        };
        let registry = CapabilityRegistry::from_descriptor(&api)?;
        registry.validate_symbols(&Resolved(&symbols))?;
        debug!(plugin = %info.name, capabilities = registry.len(), "plugin loaded");
        Ok(Self {
            symbols,
            info,
            api,
            registry,
        })
    }

    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    pub fn api(&self) -> &ApiDocument {
        &self.api
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn symbols(&self) -> &S {
        &self.symbols
    }

    /// Runs `plugin_init`; only a zero status yields a callable plugin.
    pub fn init(self) -> Result<ReadyPlugin<S>, InitFailure<S>> {
        let status = match require(&self.symbols, "plugin_init") {
            // SAFETY: `plugin_init` is `fn() -> c_int` by the plugin ABI.
            Ok(address) => invoke!(address.as_ptr(), (), (), c_int),
            Err(error) => return Err(InitFailure { plugin: self, error }),
        };
        if status != 0 {
            let error = Error::new(ErrorKind::Lifecycle)
                .with_message(format!("plugin_init returned {status}"))
                .with_function("plugin_init")
                .with_native_code(status);
            return Err(InitFailure { plugin: self, error });
        }
        Ok(ReadyPlugin { inner: Some(self) })
    }

    fn uninit(&self) {
        match require(&self.symbols, "plugin_uninit") {
            // SAFETY: `plugin_uninit` is `fn()` by the plugin ABI.
            Ok(address) => invoke!(address.as_ptr(), (), (), ()),
            Err(err) => warn!(plugin = %self.info.name, "{err}"),
        }
    }
}

impl<S: SymbolTable> ReadyPlugin<S> {
    fn loaded(&self) -> Result<&LoadedPlugin<S>, Error> {
        self.inner
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::Lifecycle).with_message("plugin is shut down"))
    }

    pub fn info(&self) -> Option<&PluginInfo> {
        self.inner.as_ref().map(LoadedPlugin::info)
    }

    pub fn registry(&self) -> Option<&CapabilityRegistry> {
        self.inner.as_ref().map(LoadedPlugin::registry)
    }

    fn prepare(&self, name: &str, shape: CallShape) -> Result<(NonNull<c_void>, &Signature), Error> {
        let plugin = self.loaded()?;
        let signature = plugin.registry.get(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message("capability not registered")
                .with_function(name)
        })?;
        if signature.call_shape() != shape {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "capability takes {:?} arguments, not {:?}",
                    signature.call_shape(),
                    shape
                ))
                .with_function(name));
        }
        Ok((require(&plugin.symbols, name)?, signature))
    }

    /// Calls a zero-argument capability.
    pub fn call(&self, name: &str) -> Result<Value, Error> {
        let (address, signature) = self.prepare(name, CallShape::Nullary)?;
        unsafe { dispatch(address, signature.return_type, CallArg::None) }
            .map_err(|err| err.with_function(name))
    }

    /// Calls a capability that takes its fixed arguments as one JSON string.
    pub fn call_with_text(&self, name: &str, text: &str) -> Result<Value, Error> {
        let (address, signature) = self.prepare(name, CallShape::Json)?;
        let text = c_text("argument text", text).map_err(|err| err.with_function(name))?;
        unsafe { dispatch(address, signature.return_type, CallArg::Text(text.as_ptr())) }
            .map_err(|err| err.with_function(name))
    }

    /// # Safety
    ///
    /// The capability receives `ptr` as-is; it must be valid for whatever the
    /// capability does with it.
    pub unsafe fn call_with_pointer(&self, name: &str, ptr: *mut c_void) -> Result<Value, Error> {
        let (address, signature) = self.prepare(name, CallShape::Pointer)?;
        unsafe { dispatch(address, signature.return_type, CallArg::Pointer(ptr)) }
            .map_err(|err| err.with_function(name))
    }

    /// Runs `plugin_uninit` now and returns the loaded plugin.
    pub fn shutdown(mut self) -> Option<LoadedPlugin<S>> {
        let plugin = self.inner.take()?;
        plugin.uninit();
        Some(plugin)
    }
}

impl<S: SymbolTable> Drop for ReadyPlugin<S> {
    fn drop(&mut self) {
        if let Some(plugin) = self.inner.take() {
            plugin.uninit();
        }
    }
}
