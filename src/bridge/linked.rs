//! Purpose: `Runtime` backed by the linked libcollections shared library.
//! Role: Production runtime for plugins loaded by a libcollections host.
//! Invariants: Every raw call is checked for a null result, a non-zero status, or a
//! non-zero `cl_get_last_error`, and mapped to `ErrorKind::Native`/`Argument`.
//! Invariants: Typed argument readers do not flag a missing key, so presence is
//! asked of the bag's hashtable separately.
//! Invariants: Strings returned by the library are copied before the call returns.
use std::ffi::CStr;
use std::os::raw::c_void;
use std::ptr;

use crate::bridge::{RawHandle, Runtime, native_failure, sys};
use crate::core::error::{Error, ErrorKind};
use crate::core::types::{ClType, Value};

#[derive(Clone, Copy, Debug, Default)]
pub struct Linked;

impl Linked {
    fn check_status(&self, call: &str, status: i32) -> Result<(), Error> {
        if status != 0 {
            return Err(native_failure(call, self.last_error()));
        }
        Ok(())
    }

    fn check_handle(&self, call: &str, ptr: *mut c_void) -> Result<RawHandle, Error> {
        // SAFETY: non-null results of libcollections constructors are live handles.
        unsafe { RawHandle::from_ptr(ptr) }.ok_or_else(|| native_failure(call, self.last_error()))
    }

    fn argument_error(&self) -> Option<Error> {
        let code = self.last_error();
        if code == 0 {
            return None;
        }
        Some(
            Error::new(ErrorKind::Argument)
                .with_message("argument missing or mistyped")
                .with_native_code(code),
        )
    }
}

impl Runtime for Linked {
    fn last_error(&self) -> i32 {
        unsafe { sys::cl_get_last_error() }
    }

    fn string_get(&self, string: RawHandle) -> Result<String, Error> {
        let raw = unsafe { sys::cl_string_valueof(string.as_ptr()) };
        if raw.is_null() {
            return Err(native_failure("cl_string_valueof", self.last_error()));
        }
        let text = unsafe { CStr::from_ptr(raw) };
        text.to_str().map(str::to_string).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("native string is not valid UTF-8")
                .with_source(err)
        })
    }

    fn string_set(&self, string: RawHandle, content: &CStr) -> Result<(), Error> {
        let status = unsafe { sys::cl_string_set_content(string.as_ptr(), content.as_ptr()) };
        self.check_status("cl_string_set_content", status)
    }

    fn string_release(&self, string: RawHandle) -> Result<(), Error> {
        let status = unsafe { sys::cl_string_unref(string.as_ptr()) };
        self.check_status("cl_string_unref", status)
    }

    fn object_render(&self, object: RawHandle) -> Result<RawHandle, Error> {
        let rendered = unsafe { sys::cl_object_to_cstring(object.as_ptr()) };
        self.check_handle("cl_object_to_cstring", rendered)
    }

    fn object_set(&self, object: RawHandle, content: &CStr) -> Result<(), Error> {
        let status = unsafe { sys::cl_object_set_ex(object.as_ptr(), content.as_ptr()) };
        self.check_status("cl_object_set_ex", status)
    }

    fn object_release(&self, object: RawHandle) -> Result<(), Error> {
        let status = unsafe { sys::cl_object_unref(object.as_ptr()) };
        self.check_status("cl_object_unref", status)
    }

    fn cfg_lookup(&self, cfg: RawHandle, block: &CStr, entry: &CStr) -> Result<RawHandle, Error> {
        let object = unsafe { sys::cl_cfg_get_value(cfg.as_ptr(), block.as_ptr(), entry.as_ptr()) };
        self.check_handle("cl_cfg_get_value", object)
    }

    fn cfg_set(
        &self,
        cfg: RawHandle,
        block: &CStr,
        entry: &CStr,
        content: &CStr,
    ) -> Result<(), Error> {
        let status = unsafe {
            sys::cl_cfg_set_value_ex(cfg.as_ptr(), block.as_ptr(), entry.as_ptr(), content.as_ptr())
        };
        self.check_status("cl_cfg_set_value_ex", status)
    }

    fn argument_present(&self, bag: RawHandle, name: &CStr) -> Result<bool, Error> {
        let present = unsafe { sys::cl_hashtable_contains_key(bag.as_ptr(), name.as_ptr()) };
        match self.last_error() {
            0 => Ok(present),
            code => Err(native_failure("cl_hashtable_contains_key", code)),
        }
    }

    fn argument(&self, bag: RawHandle, name: &CStr, ty: ClType) -> Result<Value, Error> {
        let args = bag.as_ptr();
        let name = name.as_ptr();
        let value = unsafe {
            match ty {
                ClType::Int => Value::Int(sys::cl_plugin_argument_int(args, name)),
                ClType::UInt => Value::UInt(sys::cl_plugin_argument_uint(args, name)),
                ClType::Char => Value::Char(sys::cl_plugin_argument_char(args, name)),
                ClType::UChar => Value::UChar(sys::cl_plugin_argument_uchar(args, name)),
                ClType::SInt => Value::SInt(sys::cl_plugin_argument_sint(args, name)),
                ClType::USInt => Value::USInt(sys::cl_plugin_argument_usint(args, name)),
                ClType::Long => Value::Long(sys::cl_plugin_argument_long(args, name)),
                ClType::ULong => Value::ULong(sys::cl_plugin_argument_ulong(args, name)),
                ClType::LLong => Value::LLong(sys::cl_plugin_argument_llong(args, name)),
                ClType::ULLong => Value::ULLong(sys::cl_plugin_argument_ullong(args, name)),
                ClType::Float => Value::Float(sys::cl_plugin_argument_float(args, name)),
                ClType::Double => Value::Double(sys::cl_plugin_argument_double(args, name)),
                ClType::Boolean => Value::Boolean(sys::cl_plugin_argument_bool(args, name)),
                ClType::String => {
                    let raw = sys::cl_plugin_argument_string(args, name);
                    if raw.is_null() {
                        return Err(self.argument_error().unwrap_or_else(|| {
                            Error::new(ErrorKind::Argument).with_message("string argument is null")
                        }));
                    }
                    let text = CStr::from_ptr(raw).to_str().map_err(|err| {
                        Error::new(ErrorKind::Decode)
                            .with_message("string argument is not valid UTF-8")
                            .with_source(err)
                    })?;
                    Value::String(text.to_string())
                }
                ClType::Pointer => {
                    let mut out: *mut c_void = ptr::null_mut();
                    let status = sys::cl_plugin_argument_pointer(args, name, &mut out);
                    if status != 0 {
                        return Err(self.argument_error().unwrap_or_else(|| {
                            Error::new(ErrorKind::Argument).with_message("pointer argument unavailable")
                        }));
                    }
                    Value::Pointer(out as usize)
                }
                ClType::Void => {
                    return Err(Error::new(ErrorKind::Usage).with_message("void is not an argument type"));
                }
            }
        };
        match self.argument_error() {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }
}
