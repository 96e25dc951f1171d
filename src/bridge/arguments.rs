use std::os::raw::{
    c_char, c_int, c_long, c_longlong, c_short, c_uchar, c_uint, c_ulong, c_ulonglong, c_ushort,
    c_void,
};
use std::ptr;

use crate::bridge::{RawHandle, Runtime, c_text, require_handle};
use crate::core::error::{Error, ErrorKind};
use crate::core::registry::{ArgumentMode, Signature};
use crate::core::types::{ClType, Value};

/// Borrowed argument bag (`cl_plugin_arg_t`) handed to a capability call.
pub struct Arguments<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    handle: RawHandle,
}

macro_rules! typed_accessor {
    ($name:ident, $rust:ty, $variant:ident) => {
        pub fn $name(&self, argument: &str) -> Result<$rust, Error> {
            match self.value(argument, ClType::$variant)? {
                Value::$variant(value) => Ok(value),
                other => Err(mismatch(argument, ClType::$variant, &other)),
            }
        }
    };
}

impl<'a, R: Runtime + ?Sized> Arguments<'a, R> {
    /// # Safety
    ///
    /// `ptr` must be null or an argument bag of `runtime` that stays live for `'a`.
    pub unsafe fn from_raw(runtime: &'a R, ptr: *mut c_void) -> Result<Self, Error> {
        let handle = require_handle("argument bag", ptr)?;
        Ok(Self { runtime, handle })
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    pub fn value(&self, argument: &str, ty: ClType) -> Result<Value, Error> {
        if !ty.is_argument_type() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("{ty} is not an argument type"))
                .with_argument(argument));
        }
        let name = c_text("argument name", argument)?;
        let present = self
            .runtime
            .argument_present(self.handle, &name)
            .map_err(|err| err.with_argument(argument))?;
        if !present {
            return Err(Error::new(ErrorKind::Argument)
                .with_message("argument not found")
                .with_argument(argument));
        }
        self.runtime
            .argument(self.handle, &name, ty)
            .map_err(|err| err.with_argument(argument))
    }

    typed_accessor!(int, c_int, Int);
    typed_accessor!(uint, c_uint, UInt);
    typed_accessor!(char, c_char, Char);
    typed_accessor!(uchar, c_uchar, UChar);
    typed_accessor!(sint, c_short, SInt);
    typed_accessor!(usint, c_ushort, USInt);
    typed_accessor!(long, c_long, Long);
    typed_accessor!(ulong, c_ulong, ULong);
    typed_accessor!(llong, c_longlong, LLong);
    typed_accessor!(ullong, c_ulonglong, ULLong);
    typed_accessor!(float, f32, Float);
    typed_accessor!(double, f64, Double);
    typed_accessor!(boolean, bool, Boolean);
    typed_accessor!(string, String, String);

    pub fn pointer(&self, argument: &str) -> Result<*mut c_void, Error> {
        match self.value(argument, ClType::Pointer)? {
            Value::Pointer(address) => Ok(address as *mut c_void),
            other => Err(mismatch(argument, ClType::Pointer, &other)),
        }
    }

    /// Missing or mistyped pointer arguments read as null.
    pub fn pointer_or_null(&self, argument: &str) -> *mut c_void {
        self.pointer(argument).unwrap_or(ptr::null_mut())
    }

    /// Reads every argument a fixed signature declares, in declaration order.
    pub fn read_declared(&self, signature: &Signature) -> Result<Vec<(String, Value)>, Error> {
        let ArgumentMode::Fixed(declared) = &signature.arguments else {
            return Ok(Vec::new());
        };
        declared
            .iter()
            .map(|(name, ty)| {
                self.value(name, *ty)
                    .map(|value| (name.clone(), value))
                    .map_err(|err| err.with_function(signature.name.as_str()))
            })
            .collect()
    }
}

fn mismatch(argument: &str, expected: ClType, got: &Value) -> Error {
    Error::new(ErrorKind::Argument)
        .with_message(format!("expected {expected}, runtime returned {}", got.ty()))
        .with_argument(argument)
}
