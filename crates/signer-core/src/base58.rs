//! Base58 and Base58Check encoding.

use alloc::string::String;
use alloc::vec::Vec;
use crate::error::EncodingError;
use crate::hash::hash256;

const BASE58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Encode bytes as base58. Each leading zero byte becomes a leading '1'.
pub fn encode_base58(input: &[u8]) -> String {
    let leading_zeros = input.iter().take_while(|&&b| b == 0).count();

    // Base-58 digits, least significant first
    let mut digits: Vec<u8> = Vec::with_capacity(input.len() * 138 / 100 + 1);
    for &byte in &input[leading_zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            let temp = (*digit as u32) * 256 + carry;
            *digit = (temp % 58) as u8;
            carry = temp / 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut result = String::with_capacity(leading_zeros + digits.len());
    for _ in 0..leading_zeros {
        result.push('1');
    }
    for &digit in digits.iter().rev() {
        result.push(BASE58_ALPHABET[digit as usize] as char);
    }
    result
}

/// Encode `payload ‖ hash256(payload)[..4]` as base58.
pub fn encode_base58_check(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 4);
    data.extend_from_slice(payload);
    data.extend_from_slice(&hash256(payload)[..4]);
    encode_base58(&data)
}

/// Decode a base58 string.
pub fn decode_base58(input: &str) -> Result<Vec<u8>, EncodingError> {
    let mut result = Vec::new();

    // Count leading '1's (they become leading zeros)
    let leading_zeros = input.chars().take_while(|&c| c == '1').count();

    for c in input.chars().skip(leading_zeros) {
        let value = BASE58_ALPHABET
            .iter()
            .position(|&x| x as char == c)
            .ok_or(EncodingError::InvalidBase58Char(c))? as u32;

        // Multiply result by 58 and add value
        let mut carry = value;
        for byte in result.iter_mut().rev() {
            let temp = (*byte as u32) * 58 + carry;
            *byte = (temp & 0xFF) as u8;
            carry = temp >> 8;
        }

        while carry > 0 {
            result.insert(0, (carry & 0xFF) as u8);
            carry >>= 8;
        }
    }

    let mut final_result = alloc::vec![0u8; leading_zeros];
    final_result.extend(result);

    Ok(final_result)
}

/// Decode a base58check string and return the payload without its checksum.
pub fn decode_base58_check(input: &str) -> Result<Vec<u8>, EncodingError> {
    let mut decoded = decode_base58(input)?;

    if decoded.len() < 5 {
        return Err(EncodingError::InvalidLength(decoded.len()));
    }

    let split = decoded.len() - 4;
    if decoded[split..] != hash256(&decoded[..split])[..4] {
        return Err(EncodingError::InvalidChecksum);
    }

    decoded.truncate(split);
    Ok(decoded)
}
