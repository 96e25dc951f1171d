//! Purpose: Rust plugin for libcollections hosts, plus the bridge and harness behind it.
//! Exports: `abi` (exported C symbols), `bridge` (native handle marshaling), `core`
//! (types, descriptor, registry, errors), `decode`, `diag`, `host` (conformance harness).
//! Role: Built as a `cdylib` for hosts and as an `rlib` for the CLI and tests.
//! Invariants: Only `abi` exports unmangled symbols; everything else is plain Rust.
//! Invariants: Modules prefer explicit inputs/outputs over hidden state.
pub mod abi;
pub mod bridge;
pub mod core;
pub mod decode;
pub mod diag;
pub mod host;
