//! Bitcoin Script: parsing, serialization, standard templates and evaluation.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use num_bigint::BigUint;
use crate::address::{h160_to_p2pkh_address, h160_to_p2sh_address, segwit_address};
use crate::error::ScriptError;
use crate::hash::{hash160, sha256};
use crate::network::Network;
use crate::op::{self, Opcode, Stack};
use crate::varint::{encode_varint, ByteReader};

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;

/// Largest data element a script may push.
pub const MAX_PUSH_SIZE: usize = 520;

/// One script command: an opcode or a data push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Op(Opcode),
    Data(Vec<u8>),
}

/// An ordered list of commands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    cmds: Vec<Command>,
}

/// Witness program found on the stack after a data push.
enum WitnessProgram {
    KeyHash([u8; 20]),
    ScriptHash([u8; 32]),
}

impl Script {
    pub fn new(cmds: Vec<Command>) -> Self {
        Script { cmds }
    }

    pub fn cmds(&self) -> &[Command] {
        &self.cmds
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Parse a varint-length-prefixed script.
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self, ScriptError> {
        let length = reader.read_varint()?;
        let start = reader.position();
        let mut cmds = Vec::new();

        while ((reader.position() - start) as u64) < length {
            let current = reader.read_u8()?;
            match current {
                1..=75 => {
                    let data = reader.read_bytes(current as usize)?;
                    cmds.push(Command::Data(data.to_vec()));
                }
                OP_PUSHDATA1 => {
                    let len = reader.read_u8()? as usize;
                    cmds.push(Command::Data(reader.read_bytes(len)?.to_vec()));
                }
                OP_PUSHDATA2 => {
                    let len = reader.read_u16_le()? as usize;
                    cmds.push(Command::Data(reader.read_bytes(len)?.to_vec()));
                }
                byte => cmds.push(Command::Op(Opcode::from_byte(byte))),
            }
        }

        let consumed = (reader.position() - start) as u64;
        if consumed != length {
            return Err(ScriptError::LengthMismatch { declared: length, consumed });
        }
        Ok(Script { cmds })
    }

    /// Parse a script from raw bytes without a length prefix.
    pub fn parse_raw(raw: &[u8]) -> Result<Self, ScriptError> {
        let mut prefixed = Vec::with_capacity(raw.len() + 9);
        encode_varint(raw.len() as u64, &mut prefixed);
        prefixed.extend_from_slice(raw);
        Self::parse(&mut ByteReader::new(&prefixed))
    }

    /// Serialize the commands without the length prefix, choosing the
    /// smallest push encoding for each data element.
    pub fn raw_serialize(&self) -> Result<Vec<u8>, ScriptError> {
        let mut result = Vec::new();
        for cmd in &self.cmds {
            match cmd {
                Command::Op(op) => result.push(op.to_byte()),
                Command::Data(data) => {
                    let len = data.len();
                    match len {
                        0..=75 => result.push(len as u8),
                        76..=255 => {
                            result.push(OP_PUSHDATA1);
                            result.push(len as u8);
                        }
                        256..=MAX_PUSH_SIZE => {
                            result.push(OP_PUSHDATA2);
                            result.extend_from_slice(&(len as u16).to_le_bytes());
                        }
                        _ => return Err(ScriptError::PushTooLong(len)),
                    }
                    result.extend_from_slice(data);
                }
            }
        }
        Ok(result)
    }

    /// Varint length followed by the raw commands.
    pub fn serialize(&self) -> Result<Vec<u8>, ScriptError> {
        let raw = self.raw_serialize()?;
        let mut result = Vec::with_capacity(raw.len() + 9);
        encode_varint(raw.len() as u64, &mut result);
        result.extend_from_slice(&raw);
        Ok(result)
    }

    /// `self` followed by `other`, e.g. scriptSig then scriptPubKey.
    pub fn combine(&self, other: &Script) -> Script {
        let mut cmds = Vec::with_capacity(self.cmds.len() + other.cmds.len());
        cmds.extend_from_slice(&self.cmds);
        cmds.extend_from_slice(&other.cmds);
        Script { cmds }
    }

    /// Run the script against digest `z`.
    ///
    /// `Ok(false)` means the script failed. Malformed nested scripts and
    /// unsupported opcodes are errors. `witness` feeds the witness-program
    /// rewrites; `None` behaves as an empty witness.
    pub fn evaluate(&self, z: &BigUint, witness: Option<&[Vec<u8>]>) -> Result<bool, ScriptError> {
        let witness = witness.unwrap_or(&[]);
        let mut cmds: VecDeque<Command> = self.cmds.iter().cloned().collect();
        let mut stack = Stack::new();
        let mut altstack = Stack::new();
        let mut redeemed = false;
        let mut witness_used = false;

        while let Some(cmd) = cmds.pop_front() {
            let data = match cmd {
                Command::Op(op) => {
                    if !op::execute(op, &mut stack, &mut altstack, &mut cmds, z)? {
                        tracing::debug!(opcode = %op, "script operation failed");
                        return Ok(false);
                    }
                    continue;
                }
                Command::Data(data) => data,
            };

            if !redeemed {
                if let Some(expected) = p2sh_tail(&cmds) {
                    // The pushed redeem script is hashed and consumed, never left on the stack.
                    redeemed = true;
                    cmds.clear();
                    if hash160(&data) != expected {
                        tracing::debug!("redeem script hash mismatch");
                        return Ok(false);
                    }
                    tracing::trace!("p2sh rewrite");
                    cmds.extend(Script::parse_raw(&data)?.cmds);
                    continue;
                }
            }
            stack.push(data);

            if witness_used {
                continue;
            }
            match witness_program(&stack) {
                Some(WitnessProgram::KeyHash(h160)) => {
                    witness_used = true;
                    stack.clear();
                    tracing::trace!("p2wpkh rewrite");
                    cmds.extend(witness.iter().cloned().map(Command::Data));
                    cmds.extend(p2pkh_script(&h160).cmds);
                }
                Some(WitnessProgram::ScriptHash(digest)) => {
                    witness_used = true;
                    stack.clear();
                    let Some((witness_script, items)) = witness.split_last() else {
                        tracing::debug!("p2wsh program without witness script");
                        return Ok(false);
                    };
                    cmds.extend(items.iter().cloned().map(Command::Data));
                    if sha256(witness_script) != digest {
                        tracing::debug!("witness script hash mismatch");
                        return Ok(false);
                    }
                    tracing::trace!("p2wsh rewrite");
                    cmds.extend(Script::parse_raw(witness_script)?.cmds);
                }
                None => {}
            }
        }

        Ok(match stack.last() {
            Some(top) => !top.is_empty(),
            None => false,
        })
    }

    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn is_p2pkh(&self) -> bool {
        self.p2pkh_hash().is_some()
    }

    /// `OP_HASH160 <20 bytes> OP_EQUAL`
    pub fn is_p2sh(&self) -> bool {
        self.p2sh_hash().is_some()
    }

    /// `OP_0 <20 bytes>`
    pub fn is_p2wpkh(&self) -> bool {
        self.p2wpkh_hash().is_some()
    }

    /// `OP_0 <32 bytes>`
    pub fn is_p2wsh(&self) -> bool {
        self.p2wsh_hash().is_some()
    }

    pub fn p2pkh_hash(&self) -> Option<[u8; 20]> {
        match self.cmds.as_slice() {
            [Command::Op(Opcode::OP_DUP), Command::Op(Opcode::OP_HASH160), Command::Data(h), Command::Op(Opcode::OP_EQUALVERIFY), Command::Op(Opcode::OP_CHECKSIG)] => {
                h.as_slice().try_into().ok()
            }
            _ => None,
        }
    }

    pub fn p2sh_hash(&self) -> Option<[u8; 20]> {
        match self.cmds.as_slice() {
            [Command::Op(Opcode::OP_HASH160), Command::Data(h), Command::Op(Opcode::OP_EQUAL)] => {
                h.as_slice().try_into().ok()
            }
            _ => None,
        }
    }

    pub fn p2wpkh_hash(&self) -> Option<[u8; 20]> {
        match self.cmds.as_slice() {
            [Command::Op(Opcode::OP_0), Command::Data(h)] => h.as_slice().try_into().ok(),
            _ => None,
        }
    }

    pub fn p2wsh_hash(&self) -> Option<[u8; 32]> {
        match self.cmds.as_slice() {
            [Command::Op(Opcode::OP_0), Command::Data(h)] => h.as_slice().try_into().ok(),
            _ => None,
        }
    }

    /// The address this script pays to.
    pub fn address(&self, network: Network) -> Result<String, ScriptError> {
        if let Some(h160) = self.p2pkh_hash() {
            return Ok(h160_to_p2pkh_address(&h160, network));
        }
        if let Some(h160) = self.p2sh_hash() {
            return Ok(h160_to_p2sh_address(&h160, network));
        }
        if let Some(h160) = self.p2wpkh_hash() {
            return Ok(segwit_address(0, &h160, network)?);
        }
        if let Some(h256) = self.p2wsh_hash() {
            return Ok(segwit_address(0, &h256, network)?);
        }
        Err(ScriptError::UnknownPattern)
    }
}

impl core::fmt::Display for Script {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, cmd) in self.cmds.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match cmd {
                Command::Op(op) => write!(f, "{}", op)?,
                Command::Data(data) => f.write_str(&hex::encode(data))?,
            }
        }
        Ok(())
    }
}

/// The 20-byte hash if exactly `OP_HASH160 <20 bytes> OP_EQUAL` remains.
fn p2sh_tail(cmds: &VecDeque<Command>) -> Option<[u8; 20]> {
    if cmds.len() != 3 {
        return None;
    }
    match (&cmds[0], &cmds[1], &cmds[2]) {
        (Command::Op(Opcode::OP_HASH160), Command::Data(h), Command::Op(Opcode::OP_EQUAL)) => {
            h.as_slice().try_into().ok()
        }
        _ => None,
    }
}

/// A stack of exactly `[empty, program]` with a 20- or 32-byte program.
fn witness_program(stack: &Stack) -> Option<WitnessProgram> {
    match stack.as_slice() {
        [version, program] if version.is_empty() => {
            if let Ok(h160) = <[u8; 20]>::try_from(program.as_slice()) {
                Some(WitnessProgram::KeyHash(h160))
            } else if let Ok(digest) = <[u8; 32]>::try_from(program.as_slice()) {
                Some(WitnessProgram::ScriptHash(digest))
            } else {
                None
            }
        }
        _ => None,
    }
}

pub fn p2pkh_script(h160: &[u8; 20]) -> Script {
    Script::new(alloc::vec![
        Command::Op(Opcode::OP_DUP),
        Command::Op(Opcode::OP_HASH160),
        Command::Data(h160.to_vec()),
        Command::Op(Opcode::OP_EQUALVERIFY),
        Command::Op(Opcode::OP_CHECKSIG),
    ])
}

pub fn p2sh_script(h160: &[u8; 20]) -> Script {
    Script::new(alloc::vec![
        Command::Op(Opcode::OP_HASH160),
        Command::Data(h160.to_vec()),
        Command::Op(Opcode::OP_EQUAL),
    ])
}

pub fn p2wpkh_script(h160: &[u8; 20]) -> Script {
    Script::new(alloc::vec![Command::Op(Opcode::OP_0), Command::Data(h160.to_vec())])
}

pub fn p2wsh_script(h256: &[u8; 32]) -> Script {
    Script::new(alloc::vec![Command::Op(Opcode::OP_0), Command::Data(h256.to_vec())])
}
