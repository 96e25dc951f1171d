use std::collections::HashMap;
use std::os::raw::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::Library;

use crate::core::error::{Error, ErrorKind};

/// Resolves exported symbol names to addresses.
pub trait SymbolTable {
    fn address(&self, name: &str) -> Option<NonNull<c_void>>;
}

/// A plugin shared object opened with `libloading`.
pub struct DynamicLibrary {
    path: PathBuf,
    library: Library,
}

impl DynamicLibrary {
    /// # Safety
    ///
    /// Opening a shared object runs its initializers; the caller vouches for
    /// the library at `path`.
    pub unsafe fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let library = unsafe { Library::new(&path) }.map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to load {}", path.display()))
                .with_source(err)
        })?;
        Ok(Self { path, library })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SymbolTable for DynamicLibrary {
    fn address(&self, name: &str) -> Option<NonNull<c_void>> {
        // SAFETY: the symbol is only read as an address; its type is checked
        // against the descriptor before any call.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        NonNull::new(*symbol)
    }
}

/// Symbols registered by address, for plugins linked into the current process.
#[derive(Clone, Debug, Default)]
pub struct StaticSymbols {
    entries: HashMap<String, NonNull<c_void>>,
}

impl StaticSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Null addresses are ignored.
    pub fn insert(&mut self, name: &str, address: *const c_void) {
        if let Some(address) = NonNull::new(address.cast_mut()) {
            self.entries.insert(name.to_string(), address);
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SymbolTable for StaticSymbols {
    fn address(&self, name: &str) -> Option<NonNull<c_void>> {
        self.entries.get(name).copied()
    }
}
