//! Purpose: Capability registry built from a validated API descriptor.
//! Exports: `CapabilityRegistry`, `Signature`, `ArgumentMode`, `CallShape`, `SymbolResolver`,
//! `MANDATORY_SYMBOLS`.
//! Role: Lets a host check calls against declared signatures before making them.
//! Invariants: Registry entries mirror descriptor order; lookups are by exact name.
//! Invariants: Symbol validation reports every missing name, not just the first.
use std::collections::HashMap;

use crate::core::api::{ApiDocument, FunctionDescriptor};
use crate::core::error::{Error, ErrorKind};
use crate::core::types::{ClType, Value};

/// Symbols every plugin must export. `plugin_api` is optional.
pub const MANDATORY_SYMBOLS: [&str; 6] = [
    "plugin_name",
    "plugin_version",
    "plugin_author",
    "plugin_description",
    "plugin_init",
    "plugin_uninit",
];

#[derive(Clone, Debug, PartialEq)]
pub enum ArgumentMode {
    None,
    Fixed(Vec<(String, ClType)>),
    Variadic,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub name: String,
    pub return_type: ClType,
    pub arguments: ArgumentMode,
}

/// Native calling convention a signature maps to.
///
/// - `Nullary`: `fn() -> R`
/// - `Pointer`: `fn(*mut c_void) -> R`, a single declared `pointer` argument
/// - `Json`: `fn(*const c_char) -> R`, fixed arguments encoded as one JSON object
/// - `Bag`: `fn(*mut c_void) -> R`, variadic arguments in an argument bag
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallShape {
    Nullary,
    Pointer,
    Json,
    Bag,
}

impl Signature {
    pub fn call_shape(&self) -> CallShape {
        match &self.arguments {
            ArgumentMode::None => CallShape::Nullary,
            ArgumentMode::Variadic => CallShape::Bag,
            ArgumentMode::Fixed(declared) => match declared.as_slice() {
                [(_, ClType::Pointer)] => CallShape::Pointer,
                _ => CallShape::Json,
            },
        }
    }
}

impl From<&FunctionDescriptor> for Signature {
    fn from(function: &FunctionDescriptor) -> Self {
        let arguments = match (&function.arguments, function.varargs) {
            (Some(arguments), _) => ArgumentMode::Fixed(
                arguments
                    .iter()
                    .map(|argument| (argument.name.clone(), argument.ty))
                    .collect(),
            ),
            (None, true) => ArgumentMode::Variadic,
            (None, false) => ArgumentMode::None,
        };
        Signature {
            name: function.name.clone(),
            return_type: function.return_type,
            arguments,
        }
    }
}

pub trait SymbolResolver {
    fn has_symbol(&self, name: &str) -> bool;
}

#[derive(Clone, Debug, Default)]
pub struct CapabilityRegistry {
    order: Vec<String>,
    signatures: HashMap<String, Signature>,
}

impl CapabilityRegistry {
    pub fn from_descriptor(api: &ApiDocument) -> Result<Self, Error> {
        api.validate()?;
        let mut registry = CapabilityRegistry::default();
        for function in &api.functions {
            registry.order.push(function.name.clone());
            registry
                .signatures
                .insert(function.name.clone(), Signature::from(function));
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Signature> {
        self.signatures.get(name)
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.order.iter().filter_map(|name| self.signatures.get(name))
    }

    pub fn validate_symbols(&self, resolver: &dyn SymbolResolver) -> Result<(), Error> {
        let missing: Vec<&str> = MANDATORY_SYMBOLS
            .iter()
            .copied()
            .chain(self.order.iter().map(String::as_str))
            .filter(|name| !resolver.has_symbol(name))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::new(ErrorKind::NotFound)
            .with_message(format!("unresolved symbols: {}", missing.join(", "))))
    }

    /// Checks a proposed call's named arguments against the declared signature.
    pub fn check_call(&self, name: &str, provided: &[(&str, &Value)]) -> Result<&Signature, Error> {
        let signature = self.get(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message("capability not registered")
                .with_function(name)
        })?;
        let declared = match &signature.arguments {
            ArgumentMode::Variadic => return Ok(signature),
            ArgumentMode::None => &[][..],
            ArgumentMode::Fixed(declared) => declared.as_slice(),
        };
        for (argument, value) in provided {
            let Some((_, ty)) = declared.iter().find(|(declared, _)| declared.as_str() == *argument) else {
                return Err(Error::new(ErrorKind::Argument)
                    .with_message("unexpected argument")
                    .with_function(name)
                    .with_argument(*argument));
            };
            if value.ty() != *ty {
                return Err(Error::new(ErrorKind::Argument)
                    .with_message(format!("expected {ty}, got {}", value.ty()))
                    .with_function(name)
                    .with_argument(*argument));
            }
        }
        for (argument, _) in declared {
            if !provided.iter().any(|(given, _)| *given == argument.as_str()) {
                return Err(Error::new(ErrorKind::Argument)
                    .with_message("missing argument")
                    .with_function(name)
                    .with_argument(argument.as_str()));
            }
        }
        Ok(signature)
    }
}
