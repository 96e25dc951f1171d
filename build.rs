//! Purpose: Configure linkage against the external libcollections shared library.
//! Role: Cargo build-script; only emits link directives when `libcollections` is enabled.
//! Invariants: Library search path comes from `COLLECTIONS_LIB_DIR` (default `/usr/local/lib`).
//! Invariants: `cargo:rerun-if-env-changed` covers every env var read here.
//! Invariants: Uses only Cargo-provided env vars plus `COLLECTIONS_LIB_DIR`.
use std::env;
use std::path::PathBuf;

const DEFAULT_LIB_DIR: &str = "/usr/local/lib";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=COLLECTIONS_LIB_DIR");

    if env::var_os("CARGO_FEATURE_LIBCOLLECTIONS").is_none() {
        return;
    }

    let lib_dir = env::var_os("COLLECTIONS_LIB_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LIB_DIR));

    if !lib_dir.is_dir() {
        println!(
            "cargo:warning=libcollections search path {} does not exist; set COLLECTIONS_LIB_DIR",
            lib_dir.display()
        );
    }

    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    println!("cargo:rustc-link-lib=dylib=collections");
}
