use std::os::raw::c_void;

use crate::bridge::{OwnedObject, RawHandle, Runtime, c_text, require_handle};
use crate::core::error::Error;
use crate::core::types::{ClType, Value};

/// Borrowed `cl_cfg_file_t`, addressed by `(block, entry)` pairs.
pub struct ConfigFile<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    handle: RawHandle,
}

impl<'a, R: Runtime + ?Sized> ConfigFile<'a, R> {
    /// # Safety
    ///
    /// `ptr` must be null or a configuration handle of `runtime` that stays live for `'a`.
    pub unsafe fn from_raw(runtime: &'a R, ptr: *mut c_void) -> Result<Self, Error> {
        let handle = require_handle("config", ptr)?;
        Ok(Self { runtime, handle })
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// The looked-up object is released before returning, whether or not its
    /// text could be extracted.
    pub fn get(&self, block: &str, entry: &str) -> Result<String, Error> {
        self.lookup(block, entry)?.get()
    }

    pub fn get_as(&self, block: &str, entry: &str, ty: ClType) -> Result<Value, Error> {
        Value::parse(ty, &self.get(block, entry)?)
    }

    pub fn set(&self, block: &str, entry: &str, content: &str) -> Result<(), Error> {
        let block = c_text("block", block)?;
        let entry = c_text("entry", entry)?;
        let content = c_text("entry content", content)?;
        self.runtime.cfg_set(self.handle, &block, &entry, &content)
    }

    pub fn lookup(&self, block: &str, entry: &str) -> Result<OwnedObject<'a, R>, Error> {
        let c_block = c_text("block", block)?;
        let c_entry = c_text("entry", entry)?;
        let object = self
            .runtime
            .cfg_lookup(self.handle, &c_block, &c_entry)
            .map_err(|err| err.with_argument(format!("{block}.{entry}")))?;
        Ok(OwnedObject::adopt(self.runtime, object))
    }
}
