//! Purpose: Safe marshaling between Rust values and libcollections handle types.
//! Exports: `Runtime`, `RawHandle`, `ClString`, `OwnedString`, `ClObject`, `OwnedObject`,
//! `ConfigFile`, `Arguments`, `Loopback`, and `Linked` (feature `libcollections`).
//! Role: The only layer that touches native handles; callers see `Result` values.
//! Invariants: Wrappers borrow handles for `'a`; owning guards release exactly once on drop.
//! Invariants: Text crossing the boundary is NUL-checked before any native call.
//! Invariants: Native failures surface as `ErrorKind::Native` with the native error code.
use std::ffi::{CStr, CString};
use std::os::raw::c_void;
use std::ptr::NonNull;

use crate::core::error::{Error, ErrorKind};
use crate::core::types::{ClType, Value};

mod arguments;
mod cfg;
#[cfg(feature = "libcollections")]
mod linked;
mod loopback;
mod object;
mod string;
#[cfg(feature = "libcollections")]
pub mod sys;

pub use arguments::Arguments;
pub use cfg::ConfigFile;
#[cfg(feature = "libcollections")]
pub use linked::Linked;
pub use loopback::Loopback;
pub use object::{ClObject, OwnedObject};
pub use string::{ClString, OwnedString};

/// Non-null opaque handle owned by the runtime that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawHandle(NonNull<c_void>);

impl RawHandle {
    /// # Safety
    ///
    /// `ptr` must be null or a live handle of the runtime it is passed to, and
    /// must stay live for as long as the returned value is used.
    pub unsafe fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(RawHandle)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// The consumed C interface of the external library, one method per native
/// entry point this crate calls.
pub trait Runtime {
    fn last_error(&self) -> i32;

    fn string_get(&self, string: RawHandle) -> Result<String, Error>;
    fn string_set(&self, string: RawHandle, content: &CStr) -> Result<(), Error>;
    fn string_release(&self, string: RawHandle) -> Result<(), Error>;

    /// Renders an object into a new string handle the caller must release.
    fn object_render(&self, object: RawHandle) -> Result<RawHandle, Error>;
    fn object_set(&self, object: RawHandle, content: &CStr) -> Result<(), Error>;
    fn object_release(&self, object: RawHandle) -> Result<(), Error>;

    /// Looks up `(block, entry)`; the returned object is a new reference.
    fn cfg_lookup(&self, cfg: RawHandle, block: &CStr, entry: &CStr) -> Result<RawHandle, Error>;
    fn cfg_set(
        &self,
        cfg: RawHandle,
        block: &CStr,
        entry: &CStr,
        content: &CStr,
    ) -> Result<(), Error>;

    /// Whether the bag holds `name` at all.
    fn argument_present(&self, bag: RawHandle, name: &CStr) -> Result<bool, Error>;
    /// Typed read. A missing scalar reads as the library's miss value (`-1`, `0`,
    /// `false`) with no error set, so callers check presence first.
    fn argument(&self, bag: RawHandle, name: &CStr, ty: ClType) -> Result<Value, Error>;
}

pub(crate) fn c_text(field: &str, text: &str) -> Result<CString, Error> {
    CString::new(text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("{field} contains an interior NUL byte"))
            .with_source(err)
    })
}

pub(crate) fn require_handle(kind: &str, ptr: *mut c_void) -> Result<RawHandle, Error> {
    // SAFETY: forwarded from the caller of the wrapper's `from_raw`.
    unsafe { RawHandle::from_ptr(ptr) }
        .ok_or_else(|| Error::new(ErrorKind::Usage).with_message(format!("{kind} handle is null")))
}

pub(crate) fn native_failure(call: &str, code: i32) -> Error {
    Error::new(ErrorKind::Native)
        .with_message(format!("{call} failed"))
        .with_native_code(code)
}
