// Core modules: type vocabulary, API descriptor, capability registry, errors.
pub mod api;
pub mod error;
pub mod registry;
pub mod types;
