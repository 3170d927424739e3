//! Bitcoin address encoding, decoding and scriptPubKey construction.
//!
//! Supports:
//! - P2PKH (Pay to Public Key Hash) - Base58Check, version 0x00 / 0x6f
//! - P2SH (Pay to Script Hash) - Base58Check, version 0x05 / 0xc4
//! - P2WPKH / P2WSH - SegWit v0, Bech32 (20- or 32-byte program)
//! - P2TR and later witness versions - Bech32m

use alloc::string::String;
use alloc::vec::Vec;
use crate::base58::{decode_base58_check, encode_base58_check};
use crate::error::EncodingError;
use crate::network::Network;
use crate::op::Opcode;
use crate::script::{p2pkh_script, p2sh_script, Command, Script};

/// Bitcoin address type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    /// Legacy P2PKH: OP_DUP OP_HASH160 <20-byte-hash> OP_EQUALVERIFY OP_CHECKSIG
    P2PKH,
    /// P2SH: OP_HASH160 <20-byte-hash> OP_EQUAL
    P2SH,
    /// Native SegWit v0 P2WPKH: OP_0 <20-byte-hash>
    P2WPKH,
    /// Native SegWit v0 P2WSH: OP_0 <32-byte-hash>
    P2WSH,
    /// Any witness version 1..=16 program, e.g. Taproot
    WitnessV1Plus,
}

impl AddressType {
    /// Get the display name for this address type.
    pub fn name(&self) -> &'static str {
        match self {
            AddressType::P2PKH => "P2PKH",
            AddressType::P2SH => "P2SH",
            AddressType::P2WPKH => "P2WPKH",
            AddressType::P2WSH => "P2WSH",
            AddressType::WitnessV1Plus => "witness",
        }
    }
}

/// A decoded address with the scriptPubKey it pays to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAddress {
    pub address_type: AddressType,
    pub network: Network,
    pub script_pubkey: Script,
}

/// Base58Check P2PKH address for a 20-byte hash.
pub fn h160_to_p2pkh_address(h160: &[u8; 20], network: Network) -> String {
    with_version(network.p2pkh_version(), h160)
}

/// Base58Check P2SH address for a 20-byte script hash.
pub fn h160_to_p2sh_address(h160: &[u8; 20], network: Network) -> String {
    with_version(network.p2sh_version(), h160)
}

fn with_version(version: u8, h160: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(h160);
    encode_base58_check(&payload)
}

/// Bech32 (v0) or Bech32m (v1+) address for a witness program.
pub fn segwit_address(version: u8, program: &[u8], network: Network) -> Result<String, EncodingError> {
    check_witness_program(version, program)?;

    let mut data = Vec::with_capacity(1 + (program.len() * 8).div_ceil(5));
    data.push(version);
    data.extend(convert_bits(program, 8, 5, true)?);

    let variant = if version == 0 { Bech32Variant::Bech32 } else { Bech32Variant::Bech32m };
    Ok(bech32_encode(network.bech32_hrp(), &data, variant))
}

/// Decode an address for `expected_network` and build its scriptPubKey.
pub fn validate_address(address: &str, expected_network: Network) -> Result<ValidatedAddress, EncodingError> {
    let trimmed = address.trim();
    let lower = trimmed.to_lowercase();

    if lower.starts_with("bc1") || lower.starts_with("tb1") {
        return validate_bech32_address(trimmed, expected_network);
    }
    validate_base58_address(trimmed, expected_network)
}

/// The scriptPubKey an address pays to.
pub fn address_to_script(address: &str, network: Network) -> Result<Script, EncodingError> {
    validate_address(address, network).map(|validated| validated.script_pubkey)
}

fn check_network(network: Network, expected: Network) -> Result<(), EncodingError> {
    if network != expected {
        return Err(EncodingError::NetworkMismatch {
            expected: expected.name(),
            got: network.name(),
        });
    }
    Ok(())
}

fn validate_base58_address(address: &str, expected_network: Network) -> Result<ValidatedAddress, EncodingError> {
    let payload = decode_base58_check(address)?;
    if payload.len() != 21 {
        return Err(EncodingError::InvalidLength(payload.len()));
    }

    let version = payload[0];
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);

    let (address_type, network) = match version {
        0x00 => (AddressType::P2PKH, Network::Mainnet),
        0x05 => (AddressType::P2SH, Network::Mainnet),
        0x6f => (AddressType::P2PKH, Network::Testnet),
        0xc4 => (AddressType::P2SH, Network::Testnet),
        other => return Err(EncodingError::UnknownVersion(other)),
    };
    check_network(network, expected_network)?;

    let script_pubkey = match address_type {
        AddressType::P2PKH => p2pkh_script(&hash),
        _ => p2sh_script(&hash),
    };

    Ok(ValidatedAddress { address_type, network, script_pubkey })
}

fn validate_bech32_address(address: &str, expected_network: Network) -> Result<ValidatedAddress, EncodingError> {
    let (hrp, data, variant) = bech32_decode(address)?;

    let network = Network::from_bech32_hrp(&hrp).ok_or(EncodingError::InvalidBech32("unknown hrp"))?;
    check_network(network, expected_network)?;

    let (&witness_version, words) = data.split_first().ok_or(EncodingError::InvalidBech32("empty data"))?;
    let program = convert_bits(words, 5, 8, false)?;

    match (witness_version, variant) {
        (0, Bech32Variant::Bech32) | (1..=16, Bech32Variant::Bech32m) => {}
        (0, _) => return Err(EncodingError::InvalidBech32("segwit v0 must use bech32")),
        (1..=16, _) => return Err(EncodingError::InvalidBech32("segwit v1+ must use bech32m")),
        (other, _) => return Err(EncodingError::UnknownVersion(other)),
    }
    check_witness_program(witness_version, &program)?;

    let address_type = match (witness_version, program.len()) {
        (0, 20) => AddressType::P2WPKH,
        (0, _) => AddressType::P2WSH,
        _ => AddressType::WitnessV1Plus,
    };

    // OP_0 = 0x00, OP_1 = 0x51, OP_2 = 0x52, etc.
    let version_opcode = if witness_version == 0 { 0x00 } else { 0x50 + witness_version };
    let script_pubkey = Script::new(alloc::vec![
        Command::Op(Opcode::from_byte(version_opcode)),
        Command::Data(program),
    ]);

    Ok(ValidatedAddress { address_type, network, script_pubkey })
}

fn check_witness_program(version: u8, program: &[u8]) -> Result<(), EncodingError> {
    if version > 16 {
        return Err(EncodingError::UnknownVersion(version));
    }
    match (version, program.len()) {
        (0, 20 | 32) => Ok(()),
        (1..=16, 2..=40) => Ok(()),
        (_, len) => Err(EncodingError::InvalidLength(len)),
    }
}

// ============================================================================
// Bech32/Bech32m Implementation
// ============================================================================

const BECH32_CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const BECH32M_CONST: u32 = 0x2bc830a3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bech32Variant {
    Bech32,
    Bech32m,
}

impl Bech32Variant {
    fn constant(self) -> u32 {
        match self {
            Bech32Variant::Bech32 => 1,
            Bech32Variant::Bech32m => BECH32M_CONST,
        }
    }
}

fn bech32_encode(hrp: &str, data: &[u8], variant: Bech32Variant) -> String {
    let mut padded = Vec::with_capacity(data.len() + 6);
    padded.extend_from_slice(data);
    padded.extend_from_slice(&[0u8; 6]);
    let polymod = bech32_polymod(&hrp_expand(hrp), &padded) ^ variant.constant();

    let mut result = String::with_capacity(hrp.len() + 1 + data.len() + 6);
    result.push_str(hrp);
    result.push('1');
    for &value in data {
        result.push(BECH32_CHARSET[value as usize] as char);
    }
    for i in 0..6 {
        let value = (polymod >> (5 * (5 - i))) & 31;
        result.push(BECH32_CHARSET[value as usize] as char);
    }
    result
}

fn bech32_decode(input: &str) -> Result<(String, Vec<u8>, Bech32Variant), EncodingError> {
    if input.chars().any(|c| c.is_ascii_lowercase()) && input.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(EncodingError::InvalidBech32("mixed case"));
    }
    let input_lower = input.to_lowercase();

    let sep_pos = input_lower.rfind('1').ok_or(EncodingError::InvalidBech32("no separator found"))?;
    if sep_pos == 0 || sep_pos + 7 > input_lower.len() {
        return Err(EncodingError::InvalidBech32("invalid separator position"));
    }

    let hrp = &input_lower[..sep_pos];
    let data_part = &input_lower[sep_pos + 1..];

    let mut data = Vec::with_capacity(data_part.len());
    for c in data_part.bytes() {
        let idx = BECH32_CHARSET
            .iter()
            .position(|&x| x == c)
            .ok_or(EncodingError::InvalidBech32("invalid character"))?;
        data.push(idx as u8);
    }

    let checksum = bech32_polymod(&hrp_expand(hrp), &data);
    let variant = if checksum == Bech32Variant::Bech32.constant() {
        Bech32Variant::Bech32
    } else if checksum == Bech32Variant::Bech32m.constant() {
        Bech32Variant::Bech32m
    } else {
        return Err(EncodingError::InvalidChecksum);
    };

    // Remove checksum from data (last 6 characters)
    data.truncate(data.len() - 6);

    Ok((String::from(hrp), data, variant))
}

fn hrp_expand(hrp: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(hrp.len() * 2 + 1);
    result.extend(hrp.bytes().map(|c| c >> 5));
    result.push(0);
    result.extend(hrp.bytes().map(|c| c & 31));
    result
}

fn bech32_polymod(hrp: &[u8], data: &[u8]) -> u32 {
    const GEN: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];

    let mut chk: u32 = 1;
    for &value in hrp.iter().chain(data.iter()) {
        let top = chk >> 25;
        chk = ((chk & 0x1ffffff) << 5) ^ (value as u32);
        for (i, &g) in GEN.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

fn convert_bits(data: &[u8], from_bits: u8, to_bits: u8, pad: bool) -> Result<Vec<u8>, EncodingError> {
    let mut acc: u32 = 0;
    let mut bits: u8 = 0;
    let mut result = Vec::new();
    let max_value = (1u32 << to_bits) - 1;

    for &value in data {
        if (value as u32) >> from_bits != 0 {
            return Err(EncodingError::InvalidBech32("invalid value in data"));
        }
        acc = (acc << from_bits) | (value as u32);
        bits += from_bits;

        while bits >= to_bits {
            bits -= to_bits;
            result.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            result.push(((acc << (to_bits - bits)) & max_value) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & max_value) != 0 {
        return Err(EncodingError::InvalidBech32("invalid padding"));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_p2pkh_mainnet() {
        let address = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";
        let result = validate_address(address, Network::Mainnet).unwrap();

        assert_eq!(result.address_type, AddressType::P2PKH);
        assert_eq!(result.network, Network::Mainnet);
        assert!(result.script_pubkey.is_p2pkh());
        assert_eq!(result.script_pubkey.address(Network::Mainnet).unwrap(), address);
    }

    #[test]
    fn test_p2sh_mainnet() {
        let address = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";
        let result = validate_address(address, Network::Mainnet).unwrap();

        assert_eq!(result.address_type, AddressType::P2SH);
        assert_eq!(result.script_pubkey.raw_serialize().unwrap().len(), 23);
        assert_eq!(result.script_pubkey.address(Network::Mainnet).unwrap(), address);
    }

    #[test]
    fn test_p2wpkh_mainnet() {
        let address = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";
        let result = validate_address(address, Network::Mainnet).unwrap();

        assert_eq!(result.address_type, AddressType::P2WPKH);
        let raw = result.script_pubkey.raw_serialize().unwrap();
        assert_eq!(raw.len(), 22);
        assert_eq!(&raw[..2], &[0x00, 0x14]);
        assert_eq!(result.script_pubkey.address(Network::Mainnet).unwrap(), address);
    }

    #[test]
    fn test_p2wsh_roundtrip() {
        let address = "bc1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3";
        let result = validate_address(address, Network::Mainnet).unwrap();
        assert_eq!(result.address_type, AddressType::P2WSH);
        assert_eq!(result.script_pubkey.address(Network::Mainnet).unwrap(), address);
    }

    #[test]
    fn test_p2tr_mainnet() {
        let address = "bc1p5cyxnuxmeuwuvkwfem96lqzszd02n6xdcjrs20cac6yqjjwudpxqkedrcr";
        let result = validate_address(address, Network::Mainnet).unwrap();

        assert_eq!(result.address_type, AddressType::WitnessV1Plus);
        let raw = result.script_pubkey.raw_serialize().unwrap();
        assert_eq!(&raw[..2], &[0x51, 0x20]);

        let program = &raw[2..];
        assert_eq!(segwit_address(1, program, Network::Mainnet).unwrap(), address);
    }

    #[test]
    fn test_segwit_address_encode() {
        let program = hex::decode("751e76e8199196d454941c45d1b3a323f1433bd6").unwrap();
        assert_eq!(
            segwit_address(0, &program, Network::Mainnet).unwrap(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
        assert_eq!(
            segwit_address(0, &program, Network::Testnet).unwrap(),
            "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx"
        );
        assert_eq!(segwit_address(0, &program[..19], Network::Mainnet), Err(EncodingError::InvalidLength(19)));
        assert_eq!(segwit_address(17, &program, Network::Mainnet), Err(EncodingError::UnknownVersion(17)));
    }

    #[test]
    fn test_h160_addresses() {
        let h160 = [0u8; 20];
        assert_eq!(h160_to_p2pkh_address(&h160, Network::Mainnet), "1111111111111111111114oLvT2");
        assert!(h160_to_p2sh_address(&h160, Network::Testnet).starts_with('2'));
    }

    #[test]
    fn test_testnet_address() {
        let address = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
        let result = validate_address(address, Network::Testnet).unwrap();

        assert_eq!(result.address_type, AddressType::P2WPKH);
        assert_eq!(result.network, Network::Testnet);
    }

    #[test]
    fn test_network_mismatch() {
        let address = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";
        let result = address_to_script(address, Network::Testnet);

        assert_eq!(
            result,
            Err(EncodingError::NetworkMismatch { expected: "testnet", got: "mainnet" })
        );
    }

    #[test]
    fn test_invalid_checksum() {
        // Changed last char
        let address = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN3";
        assert_eq!(validate_address(address, Network::Mainnet), Err(EncodingError::InvalidChecksum));

        let address = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdr";
        assert_eq!(validate_address(address, Network::Mainnet), Err(EncodingError::InvalidChecksum));
    }

    #[test]
    fn test_mixed_case_rejected() {
        let address = "bc1qAr0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";
        assert_eq!(
            validate_address(address, Network::Mainnet),
            Err(EncodingError::InvalidBech32("mixed case"))
        );
    }
}
