//! ECDSA signatures and their DER encoding.

use alloc::vec::Vec;
use num_bigint::BigUint;
use crate::error::SignatureError;

const SEQUENCE_TAG: u8 = 0x30;
const INTEGER_TAG: u8 = 0x02;

/// An `(r, s)` ECDSA signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: BigUint,
    pub s: BigUint,
}

impl Signature {
    pub fn new(r: BigUint, s: BigUint) -> Self {
        Signature { r, s }
    }

    /// DER encoding: `30 len 02 rlen r 02 slen s`.
    pub fn der(&self) -> Vec<u8> {
        let r = encode_integer(&self.r);
        let s = encode_integer(&self.s);
        let mut out = Vec::with_capacity(2 + r.len() + s.len());
        out.push(SEQUENCE_TAG);
        out.push((r.len() + s.len()) as u8);
        out.extend_from_slice(&r);
        out.extend_from_slice(&s);
        out
    }

    /// Strict inverse of [`Signature::der`].
    pub fn parse(der: &[u8]) -> Result<Self, SignatureError> {
        let (&tag, rest) = der.split_first().ok_or(SignatureError::Malformed("empty signature"))?;
        if tag != SEQUENCE_TAG {
            return Err(SignatureError::Malformed("bad sequence tag"));
        }
        let (&length, body) = rest.split_first().ok_or(SignatureError::Malformed("missing length"))?;
        if length as usize != body.len() {
            return Err(SignatureError::Malformed("bad signature length"));
        }

        let (r, body) = decode_integer(body)?;
        let (s, body) = decode_integer(body)?;
        if !body.is_empty() {
            return Err(SignatureError::Malformed("signature too long"));
        }
        Ok(Signature { r, s })
    }
}

impl core::fmt::Display for Signature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Signature({:x},{:x})", self.r, self.s)
    }
}

/// INTEGER TLV: minimal big-endian bytes, with a `0x00` pad when the high bit is set.
fn encode_integer(num: &BigUint) -> Vec<u8> {
    let stripped = num.to_bytes_be();

    let mut out = Vec::with_capacity(3 + stripped.len());
    out.push(INTEGER_TAG);
    if stripped[0] & 0x80 != 0 {
        out.push(stripped.len() as u8 + 1);
        out.push(0x00);
    } else {
        out.push(stripped.len() as u8);
    }
    out.extend_from_slice(&stripped);
    out
}

fn decode_integer(data: &[u8]) -> Result<(BigUint, &[u8]), SignatureError> {
    match data {
        [INTEGER_TAG, len, rest @ ..] => {
            let len = *len as usize;
            if len == 0 || len > 33 {
                return Err(SignatureError::Malformed("bad integer length"));
            }
            if rest.len() < len {
                return Err(SignatureError::Malformed("signature too short"));
            }
            let (bytes, rest) = rest.split_at(len);
            match bytes {
                [first, ..] if first & 0x80 != 0 => {
                    return Err(SignatureError::Malformed("negative integer"));
                }
                [0x00, second, ..] if second & 0x80 == 0 => {
                    return Err(SignatureError::Malformed("non-minimal integer"));
                }
                // 33 bytes only for a zero pad in front of a 32-byte value.
                [first, ..] if len == 33 && *first != 0x00 => {
                    return Err(SignatureError::Malformed("integer too large"));
                }
                _ => {}
            }
            Ok((BigUint::from_bytes_be(bytes), rest))
        }
        [_, _, ..] => Err(SignatureError::Malformed("bad integer tag")),
        _ => Err(SignatureError::Malformed("signature too short")),
    }
}
