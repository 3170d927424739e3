//! Private keys, deterministic ECDSA signing and WIF encoding.

use alloc::string::String;
use alloc::vec::Vec;
use num_bigint::BigUint;
use num_traits::Zero;
use crate::base58::{decode_base58_check, encode_base58_check};
use crate::error::{EccError, EncodingError, Error};
use crate::hash::hmac_sha256;
use crate::network::Network;
use crate::s256::{inverse_mod_n, order, to_bytes32, S256Point};
use crate::signature::Signature;

/// A secret scalar in `[1, N-1]` together with its public point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKey {
    secret: BigUint,
    point: S256Point,
}

/// Result of decoding a WIF string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifKey {
    pub key: PrivateKey,
    pub network: Network,
    pub compressed: bool,
}

impl PrivateKey {
    /// Create a key, deriving `secret * G`.
    pub fn new(secret: BigUint) -> Result<Self, EccError> {
        if secret.is_zero() || secret >= order() {
            return Err(EccError::InvalidSecretKey);
        }
        let point = S256Point::mul_generator(&secret);
        Ok(PrivateKey { secret, point })
    }

    /// Create a key from 32 big-endian bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, EccError> {
        Self::new(BigUint::from_bytes_be(bytes))
    }

    pub fn secret(&self) -> &BigUint {
        &self.secret
    }

    /// The public point.
    pub fn point(&self) -> &S256Point {
        &self.point
    }

    /// The secret as 64 hex digits.
    pub fn hex(&self) -> String {
        hex::encode(to_bytes32(&self.secret))
    }

    /// Deterministic nonce for digest `z` (RFC 6979 with HMAC-SHA256).
    pub fn deterministic_k(&self, z: &BigUint) -> BigUint {
        let n = order();
        let z = if *z > n { z - &n } else { z.clone() };
        let z_bytes = to_bytes32(&z);
        let secret_bytes = to_bytes32(&self.secret);

        let mut k = [0u8; 32];
        let mut v = [1u8; 32];

        k = hmac_sha256(&k, &[&v, &[0x00], &secret_bytes, &z_bytes]);
        v = hmac_sha256(&k, &[&v]);
        k = hmac_sha256(&k, &[&v, &[0x01], &secret_bytes, &z_bytes]);
        v = hmac_sha256(&k, &[&v]);

        loop {
            v = hmac_sha256(&k, &[&v]);
            let candidate = BigUint::from_bytes_be(&v);
            if !candidate.is_zero() && candidate < n {
                return candidate;
            }
            k = hmac_sha256(&k, &[&v, &[0x00]]);
            v = hmac_sha256(&k, &[&v]);
        }
    }

    /// Sign digest `z`, producing a low-s signature.
    pub fn sign(&self, z: &BigUint) -> Signature {
        let n = order();
        let k = self.deterministic_k(z);
        // k is in [1, N-1], so k*G is never the point at infinity.
        let r = S256Point::mul_generator(&k).x().cloned().unwrap_or_default();
        let k_inv = inverse_mod_n(&k);
        let mut s = ((z + &r * &self.secret) * k_inv) % &n;

        // Low-s keeps the signature non-malleable.
        if s > &n >> 1 {
            s = &n - s;
        }

        Signature::new(r, s)
    }

    /// Wallet Import Format: `prefix ‖ secret ‖ [0x01]`, base58check-encoded.
    pub fn wif(&self, compressed: bool, network: Network) -> String {
        let mut payload = Vec::with_capacity(34);
        payload.push(network.wif_prefix());
        payload.extend_from_slice(&to_bytes32(&self.secret));
        if compressed {
            payload.push(0x01);
        }
        encode_base58_check(&payload)
    }

    /// Decode a WIF string.
    pub fn from_wif(wif: &str) -> Result<WifKey, Error> {
        let payload = decode_base58_check(wif)?;
        let compressed = match payload.len() {
            33 => false,
            34 if payload[33] == 0x01 => true,
            len => return Err(EncodingError::InvalidLength(len).into()),
        };
        let network = Network::from_wif_prefix(payload[0])
            .ok_or(EncodingError::UnknownVersion(payload[0]))?;
        let key = PrivateKey::new(BigUint::from_bytes_be(&payload[1..33]))?;
        Ok(WifKey { key, network, compressed })
    }
}
