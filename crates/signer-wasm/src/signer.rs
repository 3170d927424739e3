//! Key holder and input signer for the WASM signer.

use wasm_bindgen::prelude::*;
use signer_core::address::segwit_address;
use signer_core::{Error, Network, PrivateKey, Tx, TxCache, TxLookup};
use crate::state::{InputStatus, KeyInfo, SignReport, VerifyReport};

/// Map a core error to a JS error string.
fn js_error(context: &str, err: impl core::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

fn parse_network(network: &str) -> Result<Network, JsValue> {
    Network::from_str(network).ok_or_else(|| JsValue::from_str("Invalid network"))
}

/// A private key plus the previous transactions needed to sign with it.
#[wasm_bindgen]
pub struct Signer {
    key: PrivateKey,
    network: Network,
    /// Previous transactions referenced by inputs being signed or verified.
    cache: TxCache,
}

#[wasm_bindgen]
impl Signer {
    /// Create a signer from a 32-byte hex secret.
    ///
    /// # Arguments
    /// * `secret_hex` - The private key as 64 hex digits
    /// * `network` - The network ("mainnet" or "testnet")
    #[wasm_bindgen(constructor)]
    pub fn new(secret_hex: &str, network: &str) -> Result<Signer, JsValue> {
        let network = parse_network(network)?;
        let key = key_from_hex(secret_hex).map_err(|e| js_error("Invalid secret", e))?;
        Ok(Signer::with_key(key, network))
    }

    /// Create a signer from a WIF string; the network comes from its prefix.
    pub fn from_wif(wif: &str) -> Result<Signer, JsValue> {
        let decoded = PrivateKey::from_wif(wif).map_err(|e| js_error("Invalid WIF", e))?;
        Ok(Signer::with_key(decoded.key, decoded.network))
    }

    /// Create a signer with a fresh random key.
    pub fn random(network: &str) -> Result<Signer, JsValue> {
        let network = parse_network(network)?;
        loop {
            let mut secret = [0u8; 32];
            getrandom::getrandom(&mut secret).map_err(|e| js_error("Randomness unavailable", e))?;
            // Rejects only zero and values at or above the group order.
            if let Ok(key) = PrivateKey::from_bytes(&secret) {
                return Ok(Signer::with_key(key, network));
            }
        }
    }

    /// Get the network name.
    #[wasm_bindgen(getter)]
    pub fn network(&self) -> String {
        self.network.name().to_string()
    }

    /// Base58 P2PKH address of the compressed key.
    #[wasm_bindgen(getter)]
    pub fn address(&self) -> String {
        self.key.point().address(true, self.network)
    }

    /// Native segwit address of the compressed key.
    pub fn segwit_address(&self) -> Result<String, JsValue> {
        self.p2wpkh_address().map_err(|e| js_error("Address error", e))
    }

    /// The key as compressed WIF.
    pub fn wif(&self) -> String {
        self.key.wif(true, self.network)
    }

    /// Public key details for display.
    pub fn key_info(&self) -> Result<JsValue, JsValue> {
        let info = KeyInfo {
            network: self.network(),
            public_key: hex::encode(self.key.point().sec(true)),
            address: self.address(),
            segwit_address: self.segwit_address()?,
        };
        info.to_js()
    }

    /// Add a raw previous transaction fetched for `txid`.
    pub fn add_prev_tx(&mut self, txid: &str, raw_hex: &str) -> Result<(), JsValue> {
        self.cache
            .insert_raw(txid, raw_hex)
            .map_err(|e| js_error("Rejected previous transaction", e))
    }

    /// Replace the previous-transaction cache with a JSON dump.
    pub fn load_cache(&mut self, json: &str) -> Result<(), JsValue> {
        self.cache = TxCache::load_json(json).map_err(|e| js_error("Invalid cache", e))?;
        Ok(())
    }

    /// Dump the previous-transaction cache as JSON.
    pub fn dump_cache(&self) -> Result<String, JsValue> {
        self.cache.dump_json().map_err(|e| js_error("Cache error", e))
    }

    /// Previous transaction ids the cache still needs before `tx_hex` can be signed.
    pub fn missing_prev_txs(&self, tx_hex: &str) -> Result<js_sys::Array, JsValue> {
        let tx = Tx::from_hex(tx_hex).map_err(|e| js_error("Invalid transaction", e))?;
        Ok(self.missing(&tx).into_iter().map(JsValue::from).collect())
    }

    /// Sign a legacy P2PKH input.
    pub fn sign_input(&self, tx_hex: &str, index: usize) -> Result<JsValue, JsValue> {
        self.sign(tx_hex, index, false)
            .map_err(|e| js_error("Signing failed", e))?
            .to_js()
    }

    /// Sign a P2WPKH input, native or nested in P2SH.
    pub fn sign_input_p2wpkh(&self, tx_hex: &str, index: usize) -> Result<JsValue, JsValue> {
        self.sign(tx_hex, index, true)
            .map_err(|e| js_error("Signing failed", e))?
            .to_js()
    }

    /// Verify a single input.
    pub fn verify_input(&self, tx_hex: &str, index: usize) -> Result<bool, JsValue> {
        let tx = Tx::from_hex(tx_hex).map_err(|e| js_error("Invalid transaction", e))?;
        tx.verify_input(index, &self.cache)
            .map_err(|e| js_error("Verification failed", e))
    }

    /// Verify every input and the fee.
    pub fn verify(&self, tx_hex: &str) -> Result<JsValue, JsValue> {
        self.verify_report(tx_hex)
            .map_err(|e| js_error("Verification failed", e))?
            .to_js()
    }
}

impl Signer {
    fn with_key(key: PrivateKey, network: Network) -> Self {
        Signer { key, network, cache: TxCache::new() }
    }

    fn p2wpkh_address(&self) -> Result<String, Error> {
        Ok(segwit_address(0, &self.key.point().hash160(true), self.network)?)
    }

    fn missing(&self, tx: &Tx) -> Vec<String> {
        let mut missing: Vec<String> = tx
            .inputs
            .iter()
            .filter(|tx_in| self.cache.fetch(&tx_in.prev_tx).is_none())
            .map(|tx_in| tx_in.prev_tx_id())
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    fn sign(&self, tx_hex: &str, index: usize, p2wpkh: bool) -> Result<SignReport, Error> {
        let mut tx = Tx::from_hex(tx_hex)?;
        let verified = if p2wpkh {
            tx.sign_input_p2wpkh(index, &self.key, &self.cache)?
        } else {
            tx.sign_input(index, &self.key, &self.cache)?
        };
        Ok(SignReport {
            index,
            verified,
            txid: tx.id()?,
            raw_tx: hex::encode(tx.serialize()?),
        })
    }

    fn verify_report(&self, tx_hex: &str) -> Result<VerifyReport, Error> {
        let tx = Tx::from_hex(tx_hex)?;
        let fee = tx.fee(&self.cache)?;
        let mut inputs = Vec::with_capacity(tx.inputs.len());
        for index in 0..tx.inputs.len() {
            inputs.push(InputStatus {
                index,
                kind: tx.classify_input(index, &self.cache)?.name().to_string(),
                verified: tx.verify_input(index, &self.cache)?,
            });
        }
        let valid = fee >= 0 && inputs.iter().all(|input| input.verified);
        Ok(VerifyReport { txid: tx.id()?, fee, inputs, valid })
    }
}

/// Decode a 64-digit hex secret.
fn key_from_hex(secret_hex: &str) -> Result<PrivateKey, Error> {
    let bytes = hex::decode(secret_hex.trim()).map_err(|_| signer_core::EncodingError::InvalidHex)?;
    let len = bytes.len();
    let secret: [u8; 32] = bytes
        .try_into()
        .map_err(|_| signer_core::EncodingError::InvalidLength(len))?;
    Ok(PrivateKey::from_bytes(&secret)?)
}

/// Log to the browser console.
#[wasm_bindgen]
pub fn console_log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use signer_core::script::p2pkh_script;
    use signer_core::{TxIn, TxOut};

    const SECRET: &str = "0000000000000000000000000000000000000000000000000000000000003039";

    fn signer() -> Signer {
        Signer::with_key(key_from_hex(SECRET).unwrap(), Network::Testnet)
    }

    /// Unsigned spend of a cached funding output, as hex.
    fn unsigned_spend(signer: &mut Signer) -> String {
        let h160 = signer.key.point().hash160(true);
        let funding = Tx::new(1, vec![TxIn::new([0x07; 32], 0)], vec![TxOut::new(10_000, p2pkh_script(&h160))], 0);
        let txid = funding.hash().unwrap();
        signer.cache.insert(txid, funding).unwrap();

        let spend = Tx::new(1, vec![TxIn::new(txid, 0)], vec![TxOut::new(9_000, p2pkh_script(&h160))], 0);
        hex::encode(spend.serialize().unwrap())
    }

    #[test]
    fn test_key_from_hex() {
        assert_eq!(key_from_hex(SECRET).unwrap().hex(), SECRET);
        assert!(key_from_hex("abcd").is_err());
        assert!(key_from_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_sign_and_verify_report() {
        let mut signer = signer();
        let unsigned = unsigned_spend(&mut signer);
        assert!(signer.missing(&Tx::from_hex(&unsigned).unwrap()).is_empty());

        let report = signer.sign(&unsigned, 0, false).unwrap();
        assert!(report.verified);

        let verify = signer.verify_report(&report.raw_tx).unwrap();
        assert!(verify.valid);
        assert_eq!(verify.fee, 1_000);
        assert_eq!(verify.inputs[0].kind, "legacy");
        assert_eq!(verify.txid, report.txid);
    }

    #[test]
    fn test_missing_prev_txs() {
        let signer = signer();
        let tx = Tx::new(1, vec![TxIn::new([0xab; 32], 0), TxIn::new([0xab; 32], 1)], Vec::new(), 0);
        assert_eq!(signer.missing(&tx), vec!["ab".repeat(32)]);
    }

    #[test]
    fn test_segwit_address_matches_network() {
        assert!(signer().p2wpkh_address().unwrap().starts_with("tb1q"));
    }
}
