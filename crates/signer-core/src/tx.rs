//! Transactions: wire codec, signature hashes, input verification and signing.
//!
//! Previous outputs are resolved through a [`TxLookup`] passed in by the
//! caller; nothing here performs I/O.

use alloc::string::String;
use alloc::vec::Vec;
use num_bigint::BigUint;
use crate::error::{EncodingError, TxError};
use crate::fetcher::TxLookup;
use crate::hash::{hash256, hash_to_display_hex, reverse_bytes};
use crate::private_key::PrivateKey;
use crate::script::{p2pkh_script, p2wpkh_script, Command, Script};
use crate::varint::{encode_varint, ByteReader};

pub const SIGHASH_ALL: u32 = 1;
pub const SIGHASH_NONE: u32 = 2;
pub const SIGHASH_SINGLE: u32 = 3;

const DEFAULT_SEQUENCE: u32 = 0xffff_ffff;
const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    /// Id of the previous transaction, in display byte order.
    pub prev_tx: [u8; 32],
    pub prev_index: u32,
    pub script_sig: Script,
    pub sequence: u32,
    /// Witness stack; empty for legacy inputs.
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    /// Input spending `prev_tx:prev_index` with an empty scriptSig.
    pub fn new(prev_tx: [u8; 32], prev_index: u32) -> Self {
        TxIn {
            prev_tx,
            prev_index,
            script_sig: Script::default(),
            sequence: DEFAULT_SEQUENCE,
            witness: Vec::new(),
        }
    }

    fn parse(reader: &mut ByteReader<'_>) -> Result<Self, TxError> {
        let prev_tx = reverse_bytes(&reader.read_array::<32>()?);
        let prev_index = reader.read_u32_le()?;
        let script_sig = Script::parse(reader)?;
        let sequence = reader.read_u32_le()?;
        Ok(TxIn { prev_tx, prev_index, script_sig, sequence, witness: Vec::new() })
    }

    /// Outpoint: previous id in wire order then the 4-byte index.
    fn outpoint(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&reverse_bytes(&self.prev_tx));
        out.extend_from_slice(&self.prev_index.to_le_bytes());
    }

    fn serialize_with(&self, script_sig: &Script, out: &mut Vec<u8>) -> Result<(), TxError> {
        self.outpoint(out);
        out.extend_from_slice(&script_sig.serialize()?);
        out.extend_from_slice(&self.sequence.to_le_bytes());
        Ok(())
    }

    pub fn serialize(&self) -> Result<Vec<u8>, TxError> {
        let mut out = Vec::new();
        self.serialize_with(&self.script_sig, &mut out)?;
        Ok(out)
    }

    /// Previous transaction id as display hex.
    pub fn prev_tx_id(&self) -> String {
        hex::encode(self.prev_tx)
    }

    /// The output this input spends.
    pub fn prev_output<'a>(&self, lookup: &'a impl TxLookup) -> Result<&'a TxOut, TxError> {
        let prev = lookup
            .fetch(&self.prev_tx)
            .ok_or_else(|| TxError::MissingPrevTx(self.prev_tx_id()))?;
        prev.outputs
            .get(self.prev_index as usize)
            .ok_or(TxError::OutputOutOfRange(self.prev_index))
    }

    /// Amount of the spent output, in satoshis.
    pub fn value(&self, lookup: &impl TxLookup) -> Result<u64, TxError> {
        Ok(self.prev_output(lookup)?.amount)
    }

    /// Locking script of the spent output.
    pub fn script_pubkey<'a>(&self, lookup: &'a impl TxLookup) -> Result<&'a Script, TxError> {
        Ok(&self.prev_output(lookup)?.script_pubkey)
    }
}

impl core::fmt::Display for TxIn {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.prev_tx_id(), self.prev_index)
    }
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Value in satoshis.
    pub amount: u64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(amount: u64, script_pubkey: Script) -> Self {
        TxOut { amount, script_pubkey }
    }

    fn parse(reader: &mut ByteReader<'_>) -> Result<Self, TxError> {
        let amount = reader.read_u64_le()?;
        let script_pubkey = Script::parse(reader)?;
        Ok(TxOut { amount, script_pubkey })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, TxError> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.amount.to_le_bytes());
        out.extend_from_slice(&self.script_pubkey.serialize()?);
        Ok(out)
    }
}

impl core::fmt::Display for TxOut {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.amount, self.script_pubkey)
    }
}

/// How an input is spent, decided from the previous output's script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendKind {
    /// Bare script, typically P2PKH: legacy digest, no witness.
    Legacy,
    /// P2SH with a non-witness redeem script.
    P2sh,
    P2wpkh,
    P2wsh,
    /// P2WPKH nested in P2SH.
    P2shP2wpkh,
    /// P2WSH nested in P2SH.
    P2shP2wsh,
}

impl SpendKind {
    pub fn name(self) -> &'static str {
        match self {
            SpendKind::Legacy => "legacy",
            SpendKind::P2sh => "p2sh",
            SpendKind::P2wpkh => "p2wpkh",
            SpendKind::P2wsh => "p2wsh",
            SpendKind::P2shP2wpkh => "p2sh-p2wpkh",
            SpendKind::P2shP2wsh => "p2sh-p2wsh",
        }
    }

    pub fn is_segwit(self) -> bool {
        !matches!(self, SpendKind::Legacy | SpendKind::P2sh)
    }
}

/// BIP143 intermediate hashes, shared by every input of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegwitHashes {
    pub prevouts: [u8; 32],
    pub sequences: [u8; 32],
    pub outputs: [u8; 32],
}

impl SegwitHashes {
    pub fn new(tx: &Tx) -> Result<Self, TxError> {
        let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
        let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
        for tx_in in &tx.inputs {
            tx_in.outpoint(&mut prevouts);
            sequences.extend_from_slice(&tx_in.sequence.to_le_bytes());
        }

        let mut outputs = Vec::new();
        for tx_out in &tx.outputs {
            outputs.extend_from_slice(&tx_out.serialize()?);
        }

        Ok(SegwitHashes {
            prevouts: hash256(&prevouts),
            sequences: hash256(&sequences),
            outputs: hash256(&outputs),
        })
    }
}

/// A Bitcoin transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub locktime: u32,
    /// Serialize with the segwit marker and witness stacks.
    pub segwit: bool,
}

impl Tx {
    pub fn new(version: u32, inputs: Vec<TxIn>, outputs: Vec<TxOut>, locktime: u32) -> Self {
        Tx { version, inputs, outputs, locktime, segwit: false }
    }

    /// Parse a transaction, detecting the segwit marker after the version.
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self, TxError> {
        let version = reader.read_u32_le()?;

        let segwit = reader.peek(0) == Some(SEGWIT_MARKER);
        if segwit {
            reader.read_u8()?;
            let flag = reader.read_u8()?;
            if flag != SEGWIT_FLAG {
                return Err(EncodingError::InvalidSegwitFlag(flag).into());
            }
        }

        let num_inputs = reader.read_varint()?;
        let mut inputs = Vec::new();
        for _ in 0..num_inputs {
            inputs.push(TxIn::parse(reader)?);
        }

        let num_outputs = reader.read_varint()?;
        let mut outputs = Vec::new();
        for _ in 0..num_outputs {
            outputs.push(TxOut::parse(reader)?);
        }

        if segwit {
            for tx_in in &mut inputs {
                let num_items = reader.read_varint()?;
                for _ in 0..num_items {
                    let len = reader.read_varint()? as usize;
                    tx_in.witness.push(reader.read_bytes(len)?.to_vec());
                }
            }
        }

        let locktime = reader.read_u32_le()?;
        Ok(Tx { version, inputs, outputs, locktime, segwit })
    }

    /// Parse a complete raw transaction; trailing bytes are an error.
    pub fn parse_bytes(raw: &[u8]) -> Result<Self, TxError> {
        let mut reader = ByteReader::new(raw);
        let tx = Self::parse(&mut reader)?;
        if !reader.is_empty() {
            return Err(EncodingError::InvalidLength(reader.remaining()).into());
        }
        Ok(tx)
    }

    /// Parse a raw transaction from hex.
    pub fn from_hex(raw_hex: &str) -> Result<Self, TxError> {
        let raw = hex::decode(raw_hex.trim()).map_err(|_| EncodingError::InvalidHex)?;
        Self::parse_bytes(&raw)
    }

    /// Wire form: segwit when `self.segwit`, legacy otherwise.
    pub fn serialize(&self) -> Result<Vec<u8>, TxError> {
        if !self.segwit {
            return self.serialize_legacy();
        }

        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.push(SEGWIT_MARKER);
        out.push(SEGWIT_FLAG);
        self.serialize_body(&mut out, |_, tx_in| &tx_in.script_sig)?;
        for tx_in in &self.inputs {
            encode_varint(tx_in.witness.len() as u64, &mut out);
            for item in &tx_in.witness {
                encode_varint(item.len() as u64, &mut out);
                out.extend_from_slice(item);
            }
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
        Ok(out)
    }

    /// Legacy wire form, without marker or witnesses.
    pub fn serialize_legacy(&self) -> Result<Vec<u8>, TxError> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        self.serialize_body(&mut out, |_, tx_in| &tx_in.script_sig)?;
        out.extend_from_slice(&self.locktime.to_le_bytes());
        Ok(out)
    }

    /// Inputs then outputs, with each input's scriptSig chosen by `script_for`.
    fn serialize_body<'a>(
        &'a self,
        out: &mut Vec<u8>,
        script_for: impl Fn(usize, &'a TxIn) -> &'a Script,
    ) -> Result<(), TxError> {
        encode_varint(self.inputs.len() as u64, out);
        for (i, tx_in) in self.inputs.iter().enumerate() {
            tx_in.serialize_with(script_for(i, tx_in), out)?;
        }
        encode_varint(self.outputs.len() as u64, out);
        for tx_out in &self.outputs {
            out.extend_from_slice(&tx_out.serialize()?);
        }
        Ok(())
    }

    /// Transaction hash in display byte order: reversed hash256 of the legacy form.
    pub fn hash(&self) -> Result<[u8; 32], TxError> {
        Ok(reverse_bytes(&hash256(&self.serialize_legacy()?)))
    }

    /// Transaction id as display hex.
    pub fn id(&self) -> Result<String, TxError> {
        Ok(hash_to_display_hex(&hash256(&self.serialize_legacy()?)))
    }

    /// Sum of spent amounts minus sum of output amounts.
    pub fn fee(&self, lookup: &impl TxLookup) -> Result<i64, TxError> {
        let mut input_sum: u128 = 0;
        for tx_in in &self.inputs {
            input_sum = input_sum
                .checked_add(u128::from(tx_in.value(lookup)?))
                .ok_or(TxError::AmountOverflow)?;
        }
        let mut output_sum: u128 = 0;
        for tx_out in &self.outputs {
            output_sum = output_sum
                .checked_add(u128::from(tx_out.amount))
                .ok_or(TxError::AmountOverflow)?;
        }
        let fee = if input_sum >= output_sum {
            i64::try_from(input_sum - output_sum)
        } else {
            i64::try_from(output_sum - input_sum).map(|deficit| -deficit)
        };
        fee.map_err(|_| TxError::AmountOverflow)
    }

    fn input(&self, index: usize) -> Result<&TxIn, TxError> {
        self.inputs.get(index).ok_or(TxError::InputOutOfRange(index))
    }

    /// Legacy SIGHASH_ALL digest for input `index`.
    ///
    /// The signed input carries `redeem_script` when given, otherwise the
    /// previous output's scriptPubKey. All other scriptSigs are blanked.
    pub fn sig_hash(
        &self,
        index: usize,
        redeem_script: Option<&Script>,
        lookup: &impl TxLookup,
    ) -> Result<BigUint, TxError> {
        let signed_script = match redeem_script {
            Some(script) => script,
            None => self.input(index)?.script_pubkey(lookup)?,
        };
        let empty = Script::default();

        let mut preimage = Vec::new();
        preimage.extend_from_slice(&self.version.to_le_bytes());
        self.serialize_body(&mut preimage, |i, _| if i == index { signed_script } else { &empty })?;
        preimage.extend_from_slice(&self.locktime.to_le_bytes());
        preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());

        Ok(BigUint::from_bytes_be(&hash256(&preimage)))
    }

    /// BIP143 SIGHASH_ALL digest for witness input `index`.
    pub fn sig_hash_bip143(
        &self,
        index: usize,
        hashes: &SegwitHashes,
        script_code: &Script,
        lookup: &impl TxLookup,
    ) -> Result<BigUint, TxError> {
        let tx_in = self.input(index)?;
        let amount = tx_in.value(lookup)?;

        let mut preimage = Vec::new();
        preimage.extend_from_slice(&self.version.to_le_bytes());
        preimage.extend_from_slice(&hashes.prevouts);
        preimage.extend_from_slice(&hashes.sequences);
        tx_in.outpoint(&mut preimage);
        preimage.extend_from_slice(&script_code.serialize()?);
        preimage.extend_from_slice(&amount.to_le_bytes());
        preimage.extend_from_slice(&tx_in.sequence.to_le_bytes());
        preimage.extend_from_slice(&hashes.outputs);
        preimage.extend_from_slice(&self.locktime.to_le_bytes());
        preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());

        Ok(BigUint::from_bytes_be(&hash256(&preimage)))
    }

    /// Classify input `index` by its previous output and scriptSig.
    pub fn classify_input(&self, index: usize, lookup: &impl TxLookup) -> Result<SpendKind, TxError> {
        let tx_in = self.input(index)?;
        let script_pubkey = tx_in.script_pubkey(lookup)?;

        if script_pubkey.is_p2sh() {
            let redeem = redeem_script(tx_in)?;
            return Ok(if redeem.is_p2wpkh() {
                SpendKind::P2shP2wpkh
            } else if redeem.is_p2wsh() {
                SpendKind::P2shP2wsh
            } else {
                SpendKind::P2sh
            });
        }
        Ok(if script_pubkey.is_p2wpkh() {
            SpendKind::P2wpkh
        } else if script_pubkey.is_p2wsh() {
            SpendKind::P2wsh
        } else {
            SpendKind::Legacy
        })
    }

    /// Verify input `index`.
    pub fn verify_input(&self, index: usize, lookup: &impl TxLookup) -> Result<bool, TxError> {
        let hashes = SegwitHashes::new(self)?;
        self.verify_input_with(index, lookup, &hashes)
    }

    fn verify_input_with(
        &self,
        index: usize,
        lookup: &impl TxLookup,
        hashes: &SegwitHashes,
    ) -> Result<bool, TxError> {
        let tx_in = self.input(index)?;
        let script_pubkey = tx_in.script_pubkey(lookup)?;
        let kind = self.classify_input(index, lookup)?;
        tracing::debug!(index, ?kind, "verifying input");

        let z = match kind {
            SpendKind::Legacy => self.sig_hash(index, None, lookup)?,
            SpendKind::P2sh => self.sig_hash(index, Some(&redeem_script(tx_in)?), lookup)?,
            SpendKind::P2wpkh | SpendKind::P2shP2wpkh => {
                let program = match kind {
                    SpendKind::P2wpkh => script_pubkey.p2wpkh_hash(),
                    _ => redeem_script(tx_in)?.p2wpkh_hash(),
                };
                let h160 = program.ok_or(TxError::NoRedeemScript)?;
                self.sig_hash_bip143(index, hashes, &p2pkh_script(&h160), lookup)?
            }
            SpendKind::P2wsh | SpendKind::P2shP2wsh => {
                let witness_script = witness_script(tx_in)?;
                self.sig_hash_bip143(index, hashes, &witness_script, lookup)?
            }
        };

        let witness = kind.is_segwit().then_some(tx_in.witness.as_slice());
        let combined = tx_in.script_sig.combine(script_pubkey);
        let verified = combined.evaluate(&z, witness)?;
        if !verified {
            tracing::debug!(index, "input failed verification");
        }
        Ok(verified)
    }

    /// Verify the whole transaction: non-negative fee and every input valid.
    pub fn verify(&self, lookup: &impl TxLookup) -> Result<bool, TxError> {
        if self.fee(lookup)? < 0 {
            tracing::debug!("outputs exceed inputs");
            return Ok(false);
        }
        let hashes = SegwitHashes::new(self)?;
        for index in 0..self.inputs.len() {
            if !self.verify_input_with(index, lookup, &hashes)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Sign a legacy P2PKH input with a compressed-key scriptSig, then verify it.
    pub fn sign_input(&mut self, index: usize, key: &PrivateKey, lookup: &impl TxLookup) -> Result<bool, TxError> {
        let z = self.sig_hash(index, None, lookup)?;
        let sig = signature_with_type(key, &z);
        let sec = key.point().sec(true);

        let tx_in = self.inputs.get_mut(index).ok_or(TxError::InputOutOfRange(index))?;
        tx_in.script_sig = Script::new(alloc::vec![Command::Data(sig), Command::Data(sec)]);
        tracing::debug!(index, "signed legacy input");

        self.verify_input(index, lookup)
    }

    /// Sign a P2WPKH input, native or nested in P2SH, then verify it.
    ///
    /// Nested inputs get the redeem script as their scriptSig; native ones an
    /// empty scriptSig. The witness becomes `[signature, sec]`.
    pub fn sign_input_p2wpkh(
        &mut self,
        index: usize,
        key: &PrivateKey,
        lookup: &impl TxLookup,
    ) -> Result<bool, TxError> {
        let h160 = key.point().hash160(true);
        let nested = self.input(index)?.script_pubkey(lookup)?.is_p2sh();

        let script_sig = if nested {
            let redeem = p2wpkh_script(&h160).raw_serialize()?;
            Script::new(alloc::vec![Command::Data(redeem)])
        } else {
            Script::default()
        };

        let hashes = SegwitHashes::new(self)?;
        let z = self.sig_hash_bip143(index, &hashes, &p2pkh_script(&h160), lookup)?;
        let sig = signature_with_type(key, &z);

        let tx_in = self.inputs.get_mut(index).ok_or(TxError::InputOutOfRange(index))?;
        tx_in.script_sig = script_sig;
        tx_in.witness = alloc::vec![sig, key.point().sec(true)];
        self.segwit = true;
        tracing::debug!(index, nested, "signed p2wpkh input");

        self.verify_input_with(index, lookup, &hashes)
    }
}

/// DER signature over `z` followed by the SIGHASH_ALL byte.
fn signature_with_type(key: &PrivateKey, z: &BigUint) -> Vec<u8> {
    let mut sig = key.sign(z).der();
    sig.push(SIGHASH_ALL as u8);
    sig
}

/// The redeem script: the last data push of a P2SH scriptSig.
fn redeem_script(tx_in: &TxIn) -> Result<Script, TxError> {
    match tx_in.script_sig.cmds().last() {
        Some(Command::Data(raw)) => Ok(Script::parse_raw(raw)?),
        _ => Err(TxError::NoRedeemScript),
    }
}

/// The witness script: the last witness item of a P2WSH input.
fn witness_script(tx_in: &TxIn) -> Result<Script, TxError> {
    match tx_in.witness.last() {
        Some(raw) => Ok(Script::parse_raw(raw)?),
        None => Err(TxError::NoWitnessScript),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeMap;
    use alloc::vec;
    use crate::hash::hash160;
    use crate::script::p2sh_script;

    const RAW_TX: &str = "0100000001813f79011acb80925dfe69b3def355fe914bd1d96a3f5f71bf8303c6a989c7d1000000006b483045022100ed81ff192e75a3fd2304004dcadb746fa5e24c5031ccfcf21320b0277457c98f02207a986d955c6e0cb35d446a89d3f56100f4d7f67801c31967743a9c8e10615bed01210349fc4e631e3624a545de3f89f5d8684c7b8138bd94bdd531d2e213bf016b278afeffffff02a135ef01000000001976a914bc3b654dca7e56b04dca18f2566cdaf02e8d9ada88ac99c39800000000001976a9141c4bc762dd5423e332166702cb75f40df79fea1288ac19430600";

    /// Lookup keyed by arbitrary ids, for vectors whose previous
    /// transactions are not available.
    struct FixedLookup(BTreeMap<[u8; 32], Tx>);

    impl TxLookup for FixedLookup {
        fn fetch(&self, txid: &[u8; 32]) -> Option<&Tx> {
            self.0.get(txid)
        }
    }

    /// A previous transaction paying `outputs` at consecutive indices.
    fn funding_tx(outputs: Vec<TxOut>) -> Tx {
        Tx::new(1, vec![TxIn::new([0x11; 32], 0)], outputs, 0)
    }

    #[test]
    fn test_parse_legacy() {
        let tx = Tx::from_hex(RAW_TX).unwrap();
        assert_eq!(tx.version, 1);
        assert!(!tx.segwit);
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(
            tx.inputs[0].prev_tx_id(),
            "d1c789a9c60383bf715f3f6ad9d14b91fe55f3deb369fe5d9280cb1a01793f81"
        );
        assert_eq!(tx.inputs[0].prev_index, 0);
        assert_eq!(tx.inputs[0].sequence, 0xfffffffe);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].amount, 32454049);
        assert_eq!(tx.outputs[1].amount, 10011545);
        assert!(tx.outputs[0].script_pubkey.is_p2pkh());
        assert_eq!(tx.locktime, 410393);
    }

    #[test]
    fn test_serialize_and_id() {
        let tx = Tx::from_hex(RAW_TX).unwrap();
        assert_eq!(hex::encode(tx.serialize().unwrap()), RAW_TX);
        assert_eq!(tx.id().unwrap(), "452c629d67e41baec3ac6f04fe744b4b9617f8f859c63b3002f8684e7a4fee03");
        assert_eq!(hex::encode(tx.hash().unwrap()), tx.id().unwrap());
    }

    #[test]
    fn test_parse_rejects_trailing_bytes() {
        let mut raw = hex::decode(RAW_TX).unwrap();
        raw.push(0x00);
        assert_eq!(Tx::parse_bytes(&raw), Err(TxError::Encoding(EncodingError::InvalidLength(1))));
        assert_eq!(Tx::from_hex("zz"), Err(TxError::Encoding(EncodingError::InvalidHex)));
    }

    #[test]
    fn test_segwit_roundtrip() {
        let mut tx = Tx::from_hex(RAW_TX).unwrap();
        let legacy_id = tx.id().unwrap();
        tx.inputs[0].witness = vec![vec![0xaa; 3], Vec::new()];
        tx.segwit = true;

        let raw = tx.serialize().unwrap();
        assert_eq!(&raw[4..6], &[SEGWIT_MARKER, SEGWIT_FLAG]);
        let parsed = Tx::parse_bytes(&raw).unwrap();
        assert_eq!(parsed, tx);
        // The id ignores witness data
        assert_eq!(parsed.id().unwrap(), legacy_id);
    }

    #[test]
    fn test_parse_rejects_bad_segwit_flag() {
        let mut raw = hex::decode(RAW_TX).unwrap();
        raw.splice(4..4, [SEGWIT_MARKER, 0x02]);
        assert_eq!(
            Tx::parse_bytes(&raw),
            Err(TxError::Encoding(EncodingError::InvalidSegwitFlag(0x02)))
        );
    }

    #[test]
    fn test_fee_with_large_amounts() {
        let prev = funding_tx(vec![TxOut::new(u64::MAX, Script::default()), TxOut::new(1, Script::default())]);
        let prev_id = prev.hash().unwrap();
        let lookup = FixedLookup([(prev_id, prev)].into_iter().collect());

        // Sums above i64::MAX still net out to a small fee
        let big = i64::MAX as u64;
        let tx = Tx::new(
            1,
            vec![TxIn::new(prev_id, 0)],
            vec![TxOut::new(big, Script::default()), TxOut::new(big, Script::default())],
            0,
        );
        assert_eq!(tx.fee(&lookup).unwrap(), 1);
        assert!(!tx.verify(&lookup).unwrap());

        // A deficit beyond i64 is an error, not a wrapped value
        let overdrawn = Tx::new(
            1,
            vec![TxIn::new(prev_id, 1)],
            vec![TxOut::new(u64::MAX, Script::default()), TxOut::new(u64::MAX, Script::default())],
            0,
        );
        assert_eq!(overdrawn.fee(&lookup), Err(TxError::AmountOverflow));
        assert_eq!(overdrawn.verify(&lookup), Err(TxError::AmountOverflow));
    }

    #[test]
    fn test_bip143_native_p2wpkh_vector() {
        let tx = Tx::from_hex("0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f0000000000eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a0100000000ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac11000000").unwrap();

        let hashes = SegwitHashes::new(&tx).unwrap();
        assert_eq!(hex::encode(hashes.prevouts), "96b827c8483d4e9b96712b6713a7b68d6e8003a781feba36c31143470b4efd37");
        assert_eq!(hex::encode(hashes.sequences), "52b0a642eea2fb7ae638c36f6252b6750293dbe574a806984b8e4d8548339a3b");
        assert_eq!(hex::encode(hashes.outputs), "863ef3e1a92afbfdb97f31ad0fc7683ee943e9abcf2501590ff8f6551f47e5e5");

        let h160: [u8; 20] = hex::decode("1d0f172a0ecb48aee1be1f2687d2963ae33f71a1").unwrap().try_into().unwrap();
        let prev = Tx::new(
            1,
            Vec::new(),
            vec![TxOut::new(0, Script::default()), TxOut::new(600_000_000, p2wpkh_script(&h160))],
            0,
        );
        let lookup = FixedLookup([(tx.inputs[1].prev_tx, prev)].into_iter().collect());

        let z = tx.sig_hash_bip143(1, &hashes, &p2pkh_script(&h160), &lookup).unwrap();
        assert_eq!(
            hex::encode(crate::s256::to_bytes32(&z)),
            "c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670"
        );
        assert_eq!(tx.classify_input(1, &lookup).unwrap(), SpendKind::P2wpkh);
    }

    #[test]
    fn test_bip143_p2sh_p2wpkh_vector() {
        let tx = Tx::from_hex("0100000001db6b1b20aa0fd7b23880be2ecbd4a98130974cf4748fb66092ac4d3ceb1a54770100000000feffffff02b8b4eb0b000000001976a914a457b684d7f0d539a46a45bbc043f35b59d0d96388ac0008af2f000000001976a914fd270b1ee6abcaea97fea7ad0402e8bd8ad6d77c88ac92040000").unwrap();
        let redeem_h160: [u8; 20] = hex::decode("4733f37cf4db86fbc2efed2500b4f4e49f312023").unwrap().try_into().unwrap();
        let key_h160: [u8; 20] = hex::decode("79091972186c449eb1ded22b78e40d009bdf0089").unwrap().try_into().unwrap();

        let prev = Tx::new(
            1,
            Vec::new(),
            vec![TxOut::new(0, Script::default()), TxOut::new(1_000_000_000, p2sh_script(&redeem_h160))],
            0,
        );
        let lookup = FixedLookup([(tx.inputs[0].prev_tx, prev)].into_iter().collect());

        let hashes = SegwitHashes::new(&tx).unwrap();
        let z = tx.sig_hash_bip143(0, &hashes, &p2pkh_script(&key_h160), &lookup).unwrap();
        assert_eq!(
            hex::encode(crate::s256::to_bytes32(&z)),
            "64f3b0f4dd2bb3aa1ce8566d220cc74dda9df97d8490cc81d89d735c92e59fb6"
        );
    }

    #[test]
    fn test_sign_and_verify_legacy_input() {
        let key = PrivateKey::new(BigUint::from(8675309u32)).unwrap();
        let prev = funding_tx(vec![TxOut::new(50_000, p2pkh_script(&key.point().hash160(true)))]);
        let prev_id = prev.hash().unwrap();
        let lookup = FixedLookup([(prev_id, prev)].into_iter().collect());

        let mut tx = Tx::new(
            1,
            vec![TxIn::new(prev_id, 0)],
            vec![TxOut::new(40_000, p2pkh_script(&hash160(b"recipient")))],
            0,
        );
        assert!(!tx.verify_input(0, &lookup).unwrap());
        assert!(tx.sign_input(0, &key, &lookup).unwrap());
        assert!(tx.verify(&lookup).unwrap());
        assert_eq!(tx.fee(&lookup).unwrap(), 10_000);

        // Changing an output invalidates the signature
        tx.outputs[0].amount = 45_000;
        assert!(!tx.verify_input(0, &lookup).unwrap());
    }

    #[test]
    fn test_sign_with_wrong_key_fails() {
        let owner = PrivateKey::new(BigUint::from(1234u32)).unwrap();
        let thief = PrivateKey::new(BigUint::from(4321u32)).unwrap();
        let prev = funding_tx(vec![TxOut::new(1_000, p2pkh_script(&owner.point().hash160(true)))]);
        let prev_id = prev.hash().unwrap();
        let lookup = FixedLookup([(prev_id, prev)].into_iter().collect());

        let mut tx = Tx::new(1, vec![TxIn::new(prev_id, 0)], Vec::new(), 0);
        assert!(!tx.sign_input(0, &thief, &lookup).unwrap());
    }

    #[test]
    fn test_negative_fee_fails_verify() {
        let key = PrivateKey::new(BigUint::from(77u32)).unwrap();
        let prev = funding_tx(vec![TxOut::new(500, p2pkh_script(&key.point().hash160(true)))]);
        let prev_id = prev.hash().unwrap();
        let lookup = FixedLookup([(prev_id, prev)].into_iter().collect());

        let mut tx = Tx::new(1, vec![TxIn::new(prev_id, 0)], vec![TxOut::new(600, Script::default())], 0);
        assert!(tx.sign_input(0, &key, &lookup).unwrap());
        assert_eq!(tx.fee(&lookup).unwrap(), -100);
        assert!(!tx.verify(&lookup).unwrap());
    }

    #[test]
    fn test_sign_p2wpkh_native_and_nested() {
        let key = PrivateKey::new(BigUint::from(99_999u32)).unwrap();
        let h160 = key.point().hash160(true);
        let nested_hash = hash160(&p2wpkh_script(&h160).raw_serialize().unwrap());
        let prev = funding_tx(vec![
            TxOut::new(20_000, p2wpkh_script(&h160)),
            TxOut::new(30_000, p2sh_script(&nested_hash)),
        ]);
        let prev_id = prev.hash().unwrap();
        let lookup = FixedLookup([(prev_id, prev)].into_iter().collect());

        let mut tx = Tx::new(
            2,
            vec![TxIn::new(prev_id, 0), TxIn::new(prev_id, 1)],
            vec![TxOut::new(49_000, p2wpkh_script(&hash160(b"change")))],
            0,
        );
        assert!(tx.sign_input_p2wpkh(0, &key, &lookup).unwrap());
        assert!(tx.sign_input_p2wpkh(1, &key, &lookup).unwrap());
        assert_eq!(tx.classify_input(1, &lookup).unwrap(), SpendKind::P2shP2wpkh);
        assert!(tx.inputs[0].script_sig.is_empty());
        assert!(tx.verify(&lookup).unwrap());

        // Witness data survives a wire round trip
        let reparsed = Tx::parse_bytes(&tx.serialize().unwrap()).unwrap();
        assert!(reparsed.verify(&lookup).unwrap());

        // Tampered witness signature
        let mut tampered = tx.clone();
        tampered.inputs[0].witness[0][10] ^= 0x01;
        assert!(!tampered.verify_input(0, &lookup).unwrap());
    }

    #[test]
    fn test_missing_previous_transaction() {
        let lookup = FixedLookup(BTreeMap::new());
        let tx = Tx::from_hex(RAW_TX).unwrap();
        assert_eq!(
            tx.verify_input(0, &lookup),
            Err(TxError::MissingPrevTx(
                "d1c789a9c60383bf715f3f6ad9d14b91fe55f3deb369fe5d9280cb1a01793f81".into()
            ))
        );
        assert_eq!(tx.verify_input(5, &lookup), Err(TxError::InputOutOfRange(5)));
    }

    #[test]
    fn test_sig_hash_depends_on_input() {
        let key = PrivateKey::new(BigUint::from(5u8)).unwrap();
        let script = p2pkh_script(&key.point().hash160(true));
        let prev = funding_tx(vec![TxOut::new(1, script.clone()), TxOut::new(2, script)]);
        let prev_id = prev.hash().unwrap();
        let lookup = FixedLookup([(prev_id, prev)].into_iter().collect());

        let tx = Tx::new(1, vec![TxIn::new(prev_id, 0), TxIn::new(prev_id, 1)], Vec::new(), 0);
        let z0 = tx.sig_hash(0, None, &lookup).unwrap();
        let z1 = tx.sig_hash(1, None, &lookup).unwrap();
        assert_ne!(z0, z1);
        assert_eq!(tx.sig_hash(2, None, &lookup), Err(TxError::InputOutOfRange(2)));
    }
}
