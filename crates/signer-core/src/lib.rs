//! Core Bitcoin signing logic for the scratch-off signer application.
//!
//! This crate provides pure Rust implementations of:
//! - secp256k1 field and curve arithmetic with ECDSA over SEC/DER encodings
//! - RFC6979 deterministic signing and WIF private keys
//! - Bitcoin Script parsing and evaluation, including P2SH and segwit v0
//! - Transaction parsing, legacy and BIP143 signature hashes, input signing
//!   and verification against a previous-transaction lookup
//! - Base58Check and bech32 address encoding

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod address;
pub mod base58;
pub mod error;
pub mod fetcher;
pub mod field;
pub mod hash;
pub mod network;
pub mod op;
pub mod point;
pub mod private_key;
pub mod s256;
pub mod script;
pub mod signature;
pub mod tx;
pub mod varint;

pub use address::{address_to_script, validate_address, AddressType, ValidatedAddress};
pub use error::{EccError, EncodingError, Error, Result, ScriptError, SignatureError, TxError};
pub use fetcher::{TxCache, TxLookup};
pub use field::FieldElement;
pub use network::Network;
pub use op::Opcode;
pub use point::Point;
pub use private_key::{PrivateKey, WifKey};
pub use s256::S256Point;
pub use script::{Command, Script};
pub use signature::Signature;
pub use tx::{SegwitHashes, SpendKind, Tx, TxIn, TxOut, SIGHASH_ALL};
