//! Report structs handed to JavaScript.

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Convert a report to a JS value.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {:?}", e)))
}

/// Public details of the signer's key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Network name.
    pub network: String,
    /// Compressed SEC public key, hex.
    pub public_key: String,
    /// Base58 P2PKH address.
    pub address: String,
    /// Native segwit (P2WPKH) address.
    pub segwit_address: String,
}

impl KeyInfo {
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Outcome of signing one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignReport {
    /// Input that was signed.
    pub index: usize,
    /// Whether the signed input verifies.
    pub verified: bool,
    /// Transaction id after signing.
    pub txid: String,
    /// Signed raw transaction, hex.
    pub raw_tx: String,
}

impl SignReport {
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Verification status of one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputStatus {
    pub index: usize,
    /// Spend type, e.g. `p2pkh` or `p2sh-p2wpkh`.
    pub kind: String,
    pub verified: bool,
}

/// Verification of a whole transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    pub txid: String,
    /// Fee in satoshis; negative when outputs exceed inputs.
    pub fee: i64,
    pub inputs: Vec<InputStatus>,
    /// Non-negative fee and every input verified.
    pub valid: bool,
}

impl VerifyReport {
    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

