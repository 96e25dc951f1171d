use std::mem::ManuallyDrop;
use std::os::raw::c_void;

use tracing::warn;

use crate::bridge::{OwnedString, RawHandle, Runtime, c_text, require_handle};
use crate::core::error::Error;
use crate::core::types::{ClType, Value};

/// Borrowed `cl_object_t`. Reads always go through the object's textual form.
pub struct ClObject<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    handle: RawHandle,
}

impl<'a, R: Runtime + ?Sized> ClObject<'a, R> {
    /// # Safety
    ///
    /// `ptr` must be null or an object handle of `runtime` that stays live for `'a`.
    pub unsafe fn from_raw(runtime: &'a R, ptr: *mut c_void) -> Result<Self, Error> {
        let handle = require_handle("object", ptr)?;
        Ok(Self { runtime, handle })
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    pub fn get(&self) -> Result<String, Error> {
        let rendered = OwnedString::adopt(self.runtime, self.runtime.object_render(self.handle)?);
        rendered.get()
    }

    /// Reads the textual form back as a value of `ty`.
    pub fn get_as(&self, ty: ClType) -> Result<Value, Error> {
        Value::parse(ty, &self.get()?)
    }

    pub fn set(&self, content: &str) -> Result<(), Error> {
        let content = c_text("object content", content)?;
        self.runtime.object_set(self.handle, &content)
    }

    pub fn set_value(&self, value: &Value) -> Result<(), Error> {
        self.set(&value.render())
    }
}

/// An object reference returned by a runtime call; released exactly once on drop.
pub struct OwnedObject<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    handle: RawHandle,
}

impl<'a, R: Runtime + ?Sized> OwnedObject<'a, R> {
    pub(crate) fn adopt(runtime: &'a R, handle: RawHandle) -> Self {
        Self { runtime, handle }
    }

    pub fn as_object(&self) -> ClObject<'_, R> {
        ClObject {
            runtime: self.runtime,
            handle: self.handle,
        }
    }

    pub fn get(&self) -> Result<String, Error> {
        self.as_object().get()
    }

    pub fn set(&self, content: &str) -> Result<(), Error> {
        self.as_object().set(content)
    }

    /// Hands the reference back to native code without releasing it.
    pub fn into_raw(self) -> *mut c_void {
        let this = ManuallyDrop::new(self);
        this.handle.as_ptr()
    }
}

impl<R: Runtime + ?Sized> Drop for OwnedObject<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.runtime.object_release(self.handle) {
            warn!(error = %err, "failed to release native object");
        }
    }
}
