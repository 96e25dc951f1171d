//! Purpose: In-process `Runtime` backed by a slot table of single-owner handles.
//! Exports: `Loopback`.
//! Role: Stands in for the native library in tests and in the conformance runner.
//! Invariants: Handles are never dereferenced; they are opaque keys into a slot table.
//! Invariants: A released handle is gone; any later use fails with `ErrorKind::Native`.
//! Notes: Single-threaded by construction (`RefCell`), matching the per-call model.
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::ffi::CStr;
use std::os::raw::c_void;

use crate::bridge::{RawHandle, Runtime, native_failure};
use crate::core::error::{Error, ErrorKind};
use crate::core::types::{ClType, Value};

/// Error codes reported through `last_error`.
pub const STALE_HANDLE: i32 = 1;
pub const WRONG_KIND: i32 = 2;
pub const NOT_FOUND: i32 = 3;
pub const INJECTED: i32 = 99;

#[derive(Debug)]
enum Slot {
    String(String),
    Object(Value),
    Config(BTreeMap<(String, String), Value>),
    Arguments(Vec<(String, Value)>),
}

#[derive(Debug, Default)]
pub struct Loopback {
    slots: RefCell<HashMap<usize, Slot>>,
    next: Cell<usize>,
    last_error: Cell<i32>,
    fail_in: Cell<Option<usize>>,
    releases: Cell<usize>,
}

impl Loopback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_string(&self, content: &str) -> RawHandle {
        self.insert(Slot::String(content.to_string()))
    }

    pub fn new_object(&self, value: Value) -> RawHandle {
        self.insert(Slot::Object(value))
    }

    pub fn new_config(&self) -> RawHandle {
        self.insert(Slot::Config(BTreeMap::new()))
    }

    pub fn new_arguments(&self, arguments: Vec<(String, Value)>) -> RawHandle {
        self.insert(Slot::Arguments(arguments))
    }

    pub fn config_insert(&self, cfg: RawHandle, block: &str, entry: &str, value: Value) {
        if let Some(Slot::Config(entries)) = self.slots.borrow_mut().get_mut(&key(cfg)) {
            entries.insert((block.to_string(), entry.to_string()), value);
        }
    }

    pub fn config_value(&self, cfg: RawHandle, block: &str, entry: &str) -> Option<Value> {
        match self.slots.borrow().get(&key(cfg)) {
            Some(Slot::Config(entries)) => entries
                .get(&(block.to_string(), entry.to_string()))
                .cloned(),
            _ => None,
        }
    }

    pub fn object_value(&self, object: RawHandle) -> Option<Value> {
        match self.slots.borrow().get(&key(object)) {
            Some(Slot::Object(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_live(&self, handle: RawHandle) -> bool {
        self.slots.borrow().contains_key(&key(handle))
    }

    pub fn live_handles(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn releases(&self) -> usize {
        self.releases.get()
    }

    /// Makes the next runtime call fail with `INJECTED`.
    pub fn fail_next_call(&self) {
        self.fail_call_after(0);
    }

    /// Lets `calls` runtime calls succeed, then fails the one after with `INJECTED`.
    pub fn fail_call_after(&self, calls: usize) {
        self.fail_in.set(Some(calls));
    }

    /// Drops a handle the host side owns, as the library would at scope end.
    pub fn dispose(&self, handle: RawHandle) {
        self.slots.borrow_mut().remove(&key(handle));
    }

    fn insert(&self, slot: Slot) -> RawHandle {
        let id = self.next.get() + 1;
        self.next.set(id);
        self.slots.borrow_mut().insert(id, slot);
        // SAFETY: loopback handles are opaque keys and never dereferenced.
        unsafe { RawHandle::from_ptr(id as *mut c_void) }.expect("slot ids start at 1")
    }

    fn enter(&self, call: &str) -> Result<(), Error> {
        match self.fail_in.get() {
            Some(0) => {
                self.fail_in.set(None);
                return Err(self.fail(call, INJECTED));
            }
            Some(remaining) => self.fail_in.set(Some(remaining - 1)),
            None => {}
        }
        self.last_error.set(0);
        Ok(())
    }

    fn fail(&self, call: &str, code: i32) -> Error {
        self.last_error.set(code);
        native_failure(call, code)
    }

    fn with_slot<T>(
        &self,
        call: &str,
        handle: RawHandle,
        f: impl FnOnce(&mut Slot) -> Result<T, i32>,
    ) -> Result<T, Error> {
        self.enter(call)?;
        let result = match self.slots.borrow_mut().get_mut(&key(handle)) {
            Some(slot) => f(slot),
            None => Err(STALE_HANDLE),
        };
        result.map_err(|code| self.fail(call, code))
    }

    fn release(
        &self,
        call: &str,
        handle: RawHandle,
        is_kind: fn(&Slot) -> bool,
    ) -> Result<(), Error> {
        self.enter(call)?;
        let mut slots = self.slots.borrow_mut();
        match slots.get(&key(handle)).map(is_kind) {
            Some(true) => {
                slots.remove(&key(handle));
                self.releases.set(self.releases.get() + 1);
                Ok(())
            }
            Some(false) => Err(self.fail(call, WRONG_KIND)),
            None => Err(self.fail(call, STALE_HANDLE)),
        }
    }
}

fn key(handle: RawHandle) -> usize {
    handle.as_ptr() as usize
}

fn text(content: &CStr) -> Result<&str, i32> {
    content.to_str().map_err(|_| WRONG_KIND)
}

impl Runtime for Loopback {
    fn last_error(&self) -> i32 {
        self.last_error.get()
    }

    fn string_get(&self, string: RawHandle) -> Result<String, Error> {
        self.with_slot("string_get", string, |slot| match slot {
            Slot::String(content) => Ok(content.clone()),
            _ => Err(WRONG_KIND),
        })
    }

    fn string_set(&self, string: RawHandle, content: &CStr) -> Result<(), Error> {
        self.with_slot("string_set", string, |slot| match slot {
            Slot::String(current) => {
                *current = text(content)?.to_string();
                Ok(())
            }
            _ => Err(WRONG_KIND),
        })
    }

    fn string_release(&self, string: RawHandle) -> Result<(), Error> {
        self.release("string_release", string, |slot| matches!(slot, Slot::String(_)))
    }

    fn object_render(&self, object: RawHandle) -> Result<RawHandle, Error> {
        let rendered = self.with_slot("object_render", object, |slot| match slot {
            Slot::Object(value) => Ok(value.render()),
            _ => Err(WRONG_KIND),
        })?;
        Ok(self.new_string(&rendered))
    }

    fn object_set(&self, object: RawHandle, content: &CStr) -> Result<(), Error> {
        let mut decode_error = None;
        let result = self.with_slot("object_set", object, |slot| match slot {
            Slot::Object(value) => {
                let parsed = Value::parse(value.ty(), text(content)?).map_err(|err| {
                    decode_error = Some(err);
                    WRONG_KIND
                })?;
                *value = parsed;
                Ok(())
            }
            _ => Err(WRONG_KIND),
        });
        match decode_error {
            Some(err) => Err(err),
            None => result,
        }
    }

    fn object_release(&self, object: RawHandle) -> Result<(), Error> {
        self.release("object_release", object, |slot| matches!(slot, Slot::Object(_)))
    }

    fn cfg_lookup(&self, cfg: RawHandle, block: &CStr, entry: &CStr) -> Result<RawHandle, Error> {
        let value = self.with_slot("cfg_lookup", cfg, |slot| match slot {
            Slot::Config(entries) => entries
                .get(&(text(block)?.to_string(), text(entry)?.to_string()))
                .cloned()
                .ok_or(NOT_FOUND),
            _ => Err(WRONG_KIND),
        })?;
        Ok(self.new_object(value))
    }

    fn cfg_set(
        &self,
        cfg: RawHandle,
        block: &CStr,
        entry: &CStr,
        content: &CStr,
    ) -> Result<(), Error> {
        self.with_slot("cfg_set", cfg, |slot| match slot {
            Slot::Config(entries) => {
                let slot_key = (text(block)?.to_string(), text(entry)?.to_string());
                let content = text(content)?;
                let value = match entries.get(&slot_key) {
                    Some(current) => Value::parse(current.ty(), content).map_err(|_| WRONG_KIND)?,
                    None => Value::String(content.to_string()),
                };
                entries.insert(slot_key, value);
                Ok(())
            }
            _ => Err(WRONG_KIND),
        })
    }

    fn argument_present(&self, bag: RawHandle, name: &CStr) -> Result<bool, Error> {
        let name = name.to_string_lossy();
        self.with_slot("argument_present", bag, |slot| match slot {
            Slot::Arguments(arguments) => Ok(arguments.iter().any(|(candidate, _)| *candidate == name)),
            _ => Err(WRONG_KIND),
        })
    }

    fn argument(&self, bag: RawHandle, name: &CStr, ty: ClType) -> Result<Value, Error> {
        let name_text = name.to_string_lossy();
        let found = self.with_slot("argument", bag, |slot| match slot {
            Slot::Arguments(arguments) => Ok(arguments
                .iter()
                .find(|(candidate, _)| *candidate == name_text)
                .map(|(_, value)| value.clone())),
            _ => Err(WRONG_KIND),
        })?;
        match found {
            Some(value) if value.ty() == ty => Ok(value),
            Some(value) => {
                self.last_error.set(WRONG_KIND);
                Err(Error::new(ErrorKind::Argument)
                    .with_message(format!("expected {ty}, bag holds {}", value.ty()))
                    .with_native_code(WRONG_KIND))
            }
            // the native readers answer a miss without setting an error
            None => miss_value(ty).ok_or_else(|| {
                Error::new(ErrorKind::Argument).with_message(format!("{ty} argument unavailable"))
            }),
        }
    }
}

/// What the native typed readers return for a key the bag does not hold.
/// Strings and pointers have no in-band miss value.
fn miss_value(ty: ClType) -> Option<Value> {
    let value = match ty {
        ClType::Int => Value::Int(-1),
        ClType::UInt => Value::UInt(0),
        ClType::Char => Value::Char(-1),
        ClType::UChar => Value::UChar(0),
        ClType::SInt => Value::SInt(-1),
        ClType::USInt => Value::USInt(0),
        ClType::Long => Value::Long(-1),
        ClType::ULong => Value::ULong(0),
        ClType::LLong => Value::LLong(-1),
        ClType::ULLong => Value::ULLong(0),
        ClType::Float => Value::Float(-1.0),
        ClType::Double => Value::Double(0.0),
        ClType::Boolean => Value::Boolean(false),
        ClType::String | ClType::Pointer | ClType::Void => return None,
    };
    Some(value)
}
