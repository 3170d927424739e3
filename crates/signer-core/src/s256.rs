//! secp256k1: the generic curve fixed to `a = 0`, `b = 7` over
//! `p = 2^256 - 2^32 - 977`, with SEC encoding, addresses and ECDSA verify.

use alloc::string::String;
use alloc::vec::Vec;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use crate::base58::encode_base58_check;
use crate::error::EccError;
use crate::field::FieldElement;
use crate::hash::hash160;
use crate::network::Network;
use crate::point::Point;
use crate::signature::Signature;

const P_HEX: &[u8] = b"fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f";
const N_HEX: &[u8] = b"fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";
const GX_HEX: &[u8] = b"79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
const GY_HEX: &[u8] = b"483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

fn from_hex(digits: &[u8]) -> BigUint {
    BigUint::parse_bytes(digits, 16).unwrap_or_default()
}

/// The field prime `p`.
pub fn prime() -> BigUint {
    from_hex(P_HEX)
}

/// The group order `N`.
pub fn order() -> BigUint {
    from_hex(N_HEX)
}

/// An element of the secp256k1 base field, reducing `num` mod `p`.
pub fn s256_field(num: &BigUint) -> FieldElement {
    FieldElement::reduce(num, &prime())
}

/// Square root in the base field: `w^((p+1)/4)`, valid because `p ≡ 3 mod 4`.
///
/// The result is only a root when `w` is a quadratic residue; callers check.
pub fn sqrt(w: &FieldElement) -> FieldElement {
    let exponent = (prime() + BigUint::one()) >> 2;
    w.pow_u(&exponent)
}

/// `a^(N-2) mod N`.
pub fn inverse_mod_n(a: &BigUint) -> BigUint {
    let n = order();
    a.modpow(&(&n - BigUint::from(2u8)), &n)
}

/// Serialize an integer as 32 big-endian bytes.
pub fn to_bytes32(num: &BigUint) -> [u8; 32] {
    let bytes = num.to_bytes_be();
    let mut out = [0u8; 32];
    let len = bytes.len().min(32);
    out[32 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    out
}

/// A point on secp256k1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S256Point(Point);

impl S256Point {
    fn curve_a() -> FieldElement {
        s256_field(&BigUint::zero())
    }

    fn curve_b() -> FieldElement {
        s256_field(&BigUint::from(7u8))
    }

    /// Create a point from affine coordinates; values at or above `p` are rejected.
    pub fn new(x: &BigUint, y: &BigUint) -> Result<Self, EccError> {
        let p = prime();
        if *x >= p || *y >= p {
            return Err(EccError::OutOfRange);
        }
        Point::new(s256_field(x), s256_field(y), Self::curve_a(), Self::curve_b()).map(S256Point)
    }

    /// The point at infinity.
    pub fn infinity() -> Self {
        S256Point(Point::infinity(Self::curve_a(), Self::curve_b()))
    }

    /// The generator `G`.
    pub fn generator() -> Self {
        let x = s256_field(&from_hex(GX_HEX));
        let y = s256_field(&from_hex(GY_HEX));
        S256Point(match Point::new(x, y, Self::curve_a(), Self::curve_b()) {
            Ok(point) => point,
            Err(_) => unreachable!("generator is on the curve"),
        })
    }

    pub fn is_infinity(&self) -> bool {
        self.0.is_infinity()
    }

    pub fn x(&self) -> Option<&BigUint> {
        self.0.x().map(FieldElement::num)
    }

    pub fn y(&self) -> Option<&BigUint> {
        self.0.y().map(FieldElement::num)
    }

    /// Access the generic point.
    pub fn as_point(&self) -> &Point {
        &self.0
    }

    pub fn add(&self, other: &Self) -> Self {
        // Both operands share the fixed curve parameters.
        S256Point(match self.0.add(&other.0) {
            Ok(point) => point,
            Err(_) => unreachable!("secp256k1 points share a curve"),
        })
    }

    /// `k * self`, with `k` first reduced mod `N`.
    pub fn mul(&self, k: &BigUint) -> Self {
        let k = k % order();
        S256Point(match self.0.scalar_mul(&k) {
            Ok(point) => point,
            Err(_) => unreachable!("secp256k1 points share a curve"),
        })
    }

    /// `k * G`.
    pub fn mul_generator(k: &BigUint) -> Self {
        Self::generator().mul(k)
    }

    /// SEC encoding: 33 bytes compressed, 65 bytes uncompressed.
    ///
    /// The point at infinity has no SEC form and encodes as an empty vector.
    pub fn sec(&self, compressed: bool) -> Vec<u8> {
        let (x, y) = match (self.x(), self.y()) {
            (Some(x), Some(y)) => (x, y),
            _ => return Vec::new(),
        };
        let mut out = Vec::with_capacity(65);
        if compressed {
            out.push(if y.bit(0) { 0x03 } else { 0x02 });
            out.extend_from_slice(&to_bytes32(x));
        } else {
            out.push(0x04);
            out.extend_from_slice(&to_bytes32(x));
            out.extend_from_slice(&to_bytes32(y));
        }
        out
    }

    /// Decode a SEC-encoded public key.
    pub fn parse(sec: &[u8]) -> Result<Self, EccError> {
        match (sec.first(), sec.len()) {
            (Some(0x04), 65) => {
                let x = BigUint::from_bytes_be(&sec[1..33]);
                let y = BigUint::from_bytes_be(&sec[33..65]);
                Self::new(&x, &y).map_err(|_| EccError::InvalidSec)
            }
            (Some(prefix @ (0x02 | 0x03)), 33) => {
                let x_num = BigUint::from_bytes_be(&sec[1..]);
                if x_num >= prime() {
                    return Err(EccError::InvalidSec);
                }
                let x = s256_field(&x_num);
                // alpha = x^3 + 7
                let alpha = x.mul(&x)?.mul(&x)?.add(&Self::curve_b())?;
                let beta = sqrt(&alpha);
                let want_even = *prefix == 0x02;
                let y = if beta.is_even() == want_even { beta } else { beta.neg() };
                Point::new(x, y, Self::curve_a(), Self::curve_b())
                    .map(S256Point)
                    .map_err(|_| EccError::InvalidSec)
            }
            _ => Err(EccError::InvalidSec),
        }
    }

    /// RIPEMD160(SHA256(SEC)).
    pub fn hash160(&self, compressed: bool) -> [u8; 20] {
        hash160(&self.sec(compressed))
    }

    /// Base58check P2PKH address for this key.
    pub fn address(&self, compressed: bool, network: Network) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(network.p2pkh_version());
        payload.extend_from_slice(&self.hash160(compressed));
        encode_base58_check(&payload)
    }

    /// ECDSA verification of `sig` over digest `z`.
    ///
    /// Accepts iff `(z/s)*G + (r/s)*P` has x-coordinate `r`. Signatures with
    /// `r` or `s` outside `[1, N-1]` and results at infinity are rejected.
    pub fn verify(&self, z: &BigUint, sig: &Signature) -> bool {
        let n = order();
        if self.is_infinity() {
            return false;
        }
        if sig.r.is_zero() || sig.r >= n || sig.s.is_zero() || sig.s >= n {
            tracing::trace!("signature component out of range");
            return false;
        }
        let s_inv = inverse_mod_n(&sig.s);
        let u = (z * &s_inv) % &n;
        let v = (&sig.r * &s_inv) % &n;
        let total = Self::mul_generator(&u).add(&self.mul(&v));
        match total.x() {
            Some(x) => *x == sig.r,
            None => false,
        }
    }
}

impl core::fmt::Display for S256Point {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match (self.x(), self.y()) {
            (Some(x), Some(y)) => write!(f, "S256Point({:064x}, {:064x})", x, y),
            _ => write!(f, "S256Point(infinity)"),
        }
    }
}
