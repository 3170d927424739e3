//! Previous-transaction lookup and an in-memory cache with a JSON form.
//!
//! The cache is an explicit value handed to whatever needs previous outputs.
//! Fetching over the network is the caller's job (see the wasm bindings).

use alloc::collections::BTreeMap;
use alloc::string::String;
use crate::error::{EncodingError, TxError};
use crate::tx::Tx;

/// Resolves a transaction id (display byte order) to a transaction.
pub trait TxLookup {
    fn fetch(&self, txid: &[u8; 32]) -> Option<&Tx>;
}

/// Transactions keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxCache {
    txs: BTreeMap<[u8; 32], Tx>,
}

impl TxCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Insert a transaction fetched as `txid`, rejecting it when its computed
    /// id differs.
    pub fn insert(&mut self, txid: [u8; 32], tx: Tx) -> Result<(), TxError> {
        let computed = tx.hash()?;
        if computed != txid {
            let err = TxError::IdMismatch {
                computed: hex::encode(computed),
                expected: hex::encode(txid),
            };
            tracing::warn!(%err, "rejected cache entry");
            return Err(err);
        }
        tracing::trace!(txid = %hex::encode(txid), "cached transaction");
        self.txs.insert(txid, tx);
        Ok(())
    }

    /// Parse raw hex for `txid_hex` and insert it.
    pub fn insert_raw(&mut self, txid_hex: &str, raw_hex: &str) -> Result<(), TxError> {
        let txid = decode_txid(txid_hex)?;
        self.insert(txid, Tx::from_hex(raw_hex)?)
    }

    /// Load a JSON object of `txid -> raw tx hex`.
    pub fn load_json(json: &str) -> Result<Self, TxError> {
        let entries: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|_| TxError::InvalidCache)?;
        let mut cache = TxCache::new();
        for (txid_hex, raw_hex) in &entries {
            cache.insert_raw(txid_hex, raw_hex)?;
        }
        tracing::debug!(entries = cache.len(), "loaded transaction cache");
        Ok(cache)
    }

    /// Dump as a JSON object of `txid -> raw tx hex`, sorted by id.
    pub fn dump_json(&self) -> Result<String, TxError> {
        let mut entries = BTreeMap::new();
        for (txid, tx) in &self.txs {
            entries.insert(hex::encode(txid), hex::encode(tx.serialize()?));
        }
        serde_json::to_string_pretty(&entries).map_err(|_| TxError::InvalidCache)
    }

    /// Load a cache file written by [`TxCache::dump_file`].
    #[cfg(feature = "std")]
    pub fn load_file(path: impl AsRef<std::path::Path>) -> Result<Self, TxError> {
        let json = std::fs::read_to_string(path).map_err(|_| TxError::CacheIo)?;
        Self::load_json(&json)
    }

    #[cfg(feature = "std")]
    pub fn dump_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), TxError> {
        std::fs::write(path, self.dump_json()?).map_err(|_| TxError::CacheIo)
    }
}

impl TxLookup for TxCache {
    fn fetch(&self, txid: &[u8; 32]) -> Option<&Tx> {
        self.txs.get(txid)
    }
}

/// Decode a 64-digit display-hex transaction id.
pub fn decode_txid(txid_hex: &str) -> Result<[u8; 32], TxError> {
    let bytes = hex::decode(txid_hex.trim()).map_err(|_| EncodingError::InvalidHex)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| EncodingError::InvalidLength(len).into())
}
