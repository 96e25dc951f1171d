//! Purpose: Host-side harness for exercising a plugin through its C ABI.
//! Exports: `SymbolTable`, `DynamicLibrary`, `StaticSymbols`, `LoadedPlugin`, `ReadyPlugin`,
//! `InitFailure`, `PluginInfo`, `ConformanceReport`, `run_conformance`.
//! Role: Backs the conformance CLI; not needed by hosts that only load the plugin.
mod library;
mod plugin;
mod report;

pub use library::{DynamicLibrary, StaticSymbols, SymbolTable};
pub use plugin::{InitFailure, LoadedPlugin, PluginInfo, ReadyPlugin};
pub use report::{Check, ConformanceReport, MALFORMED_ARGUMENTS, Outcome, run_conformance};
