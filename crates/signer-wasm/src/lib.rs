//! WebAssembly bindings for the Bitcoin scratch-off signer.
//!
//! This crate provides JavaScript-accessible APIs for:
//! - Creating keys from hex, WIF or fresh randomness
//! - Fetching previous transactions from a block explorer
//! - Signing and verifying transaction inputs
//! - Broadcasting signed transactions

use wasm_bindgen::prelude::*;

pub mod api;
pub mod signer;
pub mod state;

// Re-export main types for JS access
pub use api::TxApi;
pub use signer::Signer;

/// Initialize the WASM module with better panic messages.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
