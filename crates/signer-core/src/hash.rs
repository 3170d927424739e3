//! Hash primitives used throughout key, script and transaction handling.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
///
/// This is used for transaction IDs, signature hashes and base58 checksums.
#[inline]
pub fn hash256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Single SHA256 hash.
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

/// RIPEMD160(SHA256(data)), the hash behind P2PKH and P2SH.
#[inline]
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// Single RIPEMD160 hash.
#[inline]
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let hash = Ripemd160::digest(data);
    let mut result = [0u8; 20];
    result.copy_from_slice(&hash);
    result
}

/// Single SHA1 hash (only reachable through `OP_SHA1`).
#[inline]
pub fn sha1(data: &[u8]) -> [u8; 20] {
    let hash = Sha1::digest(data);
    let mut result = [0u8; 20];
    result.copy_from_slice(&hash);
    result
}

/// HMAC-SHA256 over the concatenation of `parts`.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("hmac accepts keys of any length"),
    };
    for part in parts {
        mac.update(part);
    }
    let mut result = [0u8; 32];
    result.copy_from_slice(&mac.finalize().into_bytes());
    result
}

/// Reverse the byte order of a 32-byte array.
///
/// Bitcoin displays transaction ids in reverse byte order.
#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// Convert a hash to its display format (reversed hex).
pub fn hash_to_display_hex(hash: &[u8; 32]) -> alloc::string::String {
    hex::encode(reverse_bytes(hash))
}
