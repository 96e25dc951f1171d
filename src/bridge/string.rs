use std::os::raw::c_void;

use tracing::warn;

use crate::bridge::{RawHandle, Runtime, c_text, require_handle};
use crate::core::error::Error;

/// Borrowed `cl_string_t` owned by the runtime.
pub struct ClString<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    handle: RawHandle,
}

impl<'a, R: Runtime + ?Sized> ClString<'a, R> {
    /// # Safety
    ///
    /// `ptr` must be null or a string handle of `runtime` that stays live for `'a`.
    pub unsafe fn from_raw(runtime: &'a R, ptr: *mut c_void) -> Result<Self, Error> {
        let handle = require_handle("string", ptr)?;
        Ok(Self::borrowed(runtime, handle))
    }

    pub(crate) fn borrowed(runtime: &'a R, handle: RawHandle) -> Self {
        Self { runtime, handle }
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    pub fn get(&self) -> Result<String, Error> {
        self.runtime.string_get(self.handle)
    }

    pub fn set(&self, content: &str) -> Result<(), Error> {
        let content = c_text("string content", content)?;
        self.runtime.string_set(self.handle, &content)
    }
}

/// A string handle this layer received ownership of; released on drop.
pub struct OwnedString<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    handle: RawHandle,
}

impl<'a, R: Runtime + ?Sized> OwnedString<'a, R> {
    pub(crate) fn adopt(runtime: &'a R, handle: RawHandle) -> Self {
        Self { runtime, handle }
    }

    pub fn as_string(&self) -> ClString<'_, R> {
        ClString::borrowed(self.runtime, self.handle)
    }

    pub fn get(&self) -> Result<String, Error> {
        self.as_string().get()
    }
}

impl<R: Runtime + ?Sized> Drop for OwnedString<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.runtime.string_release(self.handle) {
            warn!(error = %err, "failed to release native string");
        }
    }
}
