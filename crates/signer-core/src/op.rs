//! Script opcodes and their stack operations.
//!
//! Each supported opcode is a variant of [`Opcode`]; bytes outside the table
//! decode to [`Opcode::Unsupported`]. Operations return `false` when the
//! script must fail, mirroring the consensus "script failed" result.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use num_bigint::BigUint;
use crate::error::ScriptError;
use crate::hash::{hash160, hash256, ripemd160, sha1, sha256};
use crate::s256::S256Point;
use crate::script::Command;
use crate::signature::Signature;
use crate::tx::SIGHASH_ALL;

/// The operand and alt stacks hold opaque byte strings.
pub type Stack = Vec<Vec<u8>>;

/// Numeric operands longer than this fail the operation.
const MAX_NUM_SIZE: usize = 4;

/// CHECKMULTISIG accepts at most this many public keys.
const MAX_MULTISIG_KEYS: i64 = 20;

macro_rules! opcodes {
    ($($variant:ident = $byte:literal,)*) => {
        /// A Script opcode.
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant,)*
            /// A byte with no operation in this engine.
            Unsupported(u8),
        }

        impl Opcode {
            /// Decode an opcode byte.
            pub fn from_byte(byte: u8) -> Self {
                match byte {
                    $($byte => Opcode::$variant,)*
                    other => Opcode::Unsupported(other),
                }
            }

            /// The wire byte for this opcode.
            pub fn to_byte(self) -> u8 {
                match self {
                    $(Opcode::$variant => $byte,)*
                    Opcode::Unsupported(byte) => byte,
                }
            }

            /// Canonical name such as `OP_DUP`, or `None` for unsupported bytes.
            pub fn name(self) -> Option<&'static str> {
                match self {
                    $(Opcode::$variant => Some(stringify!($variant)),)*
                    Opcode::Unsupported(_) => None,
                }
            }
        }
    };
}

opcodes! {
    OP_0 = 0x00,
    OP_1NEGATE = 0x4f,
    OP_1 = 0x51,
    OP_2 = 0x52,
    OP_3 = 0x53,
    OP_4 = 0x54,
    OP_5 = 0x55,
    OP_6 = 0x56,
    OP_7 = 0x57,
    OP_8 = 0x58,
    OP_9 = 0x59,
    OP_10 = 0x5a,
    OP_11 = 0x5b,
    OP_12 = 0x5c,
    OP_13 = 0x5d,
    OP_14 = 0x5e,
    OP_15 = 0x5f,
    OP_16 = 0x60,
    OP_NOP = 0x61,
    OP_IF = 0x63,
    OP_NOTIF = 0x64,
    OP_ELSE = 0x67,
    OP_ENDIF = 0x68,
    OP_VERIFY = 0x69,
    OP_RETURN = 0x6a,
    OP_TOALTSTACK = 0x6b,
    OP_FROMALTSTACK = 0x6c,
    OP_2DROP = 0x6d,
    OP_2DUP = 0x6e,
    OP_3DUP = 0x6f,
    OP_2OVER = 0x70,
    OP_2ROT = 0x71,
    OP_2SWAP = 0x72,
    OP_IFDUP = 0x73,
    OP_DEPTH = 0x74,
    OP_DROP = 0x75,
    OP_DUP = 0x76,
    OP_NIP = 0x77,
    OP_OVER = 0x78,
    OP_PICK = 0x79,
    OP_ROLL = 0x7a,
    OP_ROT = 0x7b,
    OP_SWAP = 0x7c,
    OP_TUCK = 0x7d,
    OP_SIZE = 0x82,
    OP_EQUAL = 0x87,
    OP_EQUALVERIFY = 0x88,
    OP_1ADD = 0x8b,
    OP_1SUB = 0x8c,
    OP_NEGATE = 0x8f,
    OP_ABS = 0x90,
    OP_NOT = 0x91,
    OP_0NOTEQUAL = 0x92,
    OP_ADD = 0x93,
    OP_SUB = 0x94,
    OP_MUL = 0x95,
    OP_BOOLAND = 0x9a,
    OP_BOOLOR = 0x9b,
    OP_NUMEQUAL = 0x9c,
    OP_NUMEQUALVERIFY = 0x9d,
    OP_NUMNOTEQUAL = 0x9e,
    OP_LESSTHAN = 0x9f,
    OP_GREATERTHAN = 0xa0,
    OP_LESSTHANOREQUAL = 0xa1,
    OP_GREATERTHANOREQUAL = 0xa2,
    OP_MIN = 0xa3,
    OP_MAX = 0xa4,
    OP_WITHIN = 0xa5,
    OP_RIPEMD160 = 0xa6,
    OP_SHA1 = 0xa7,
    OP_SHA256 = 0xa8,
    OP_HASH160 = 0xa9,
    OP_HASH256 = 0xaa,
    OP_CHECKSIG = 0xac,
    OP_CHECKSIGVERIFY = 0xad,
    OP_CHECKMULTISIG = 0xae,
    OP_CHECKMULTISIGVERIFY = 0xaf,
}

impl Opcode {
    /// The value pushed by `OP_1`..`OP_16`.
    pub fn small_int(self) -> Option<i64> {
        match self.to_byte() {
            byte @ 0x51..=0x60 => Some(i64::from(byte) - 0x50),
            _ => None,
        }
    }
}

impl core::fmt::Display for Opcode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "OP_[{}]", self.to_byte()),
        }
    }
}

/// Encode a script number: little-endian magnitude, sign in the top bit.
pub fn encode_num(num: i64) -> Vec<u8> {
    if num == 0 {
        return Vec::new();
    }
    let negative = num < 0;
    let mut magnitude = num.unsigned_abs();
    let mut result = Vec::with_capacity(9);
    while magnitude > 0 {
        result.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }
    let last = result.len() - 1;
    if result[last] & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        result[last] |= 0x80;
    }
    result
}

/// Decode a script number. Intended for elements of at most 8 bytes.
pub fn decode_num(element: &[u8]) -> i64 {
    let Some((&last, rest)) = element.split_last() else {
        return 0;
    };
    let negative = last & 0x80 != 0;
    let mut result = i64::from(last & 0x7f);
    for &byte in rest.iter().rev() {
        result = (result << 8) | i64::from(byte);
    }
    if negative {
        result.wrapping_neg()
    } else {
        result
    }
}

/// Truthiness of a stack element: any nonzero byte, ignoring a negative-zero sign bit.
pub fn cast_to_bool(element: &[u8]) -> bool {
    match element.split_last() {
        None => false,
        Some((&last, rest)) => rest.iter().any(|&b| b != 0) || (last & 0x7f) != 0,
    }
}

fn push_bool(stack: &mut Stack, flag: bool) {
    stack.push(encode_num(i64::from(flag)));
}

fn pop_num(stack: &mut Stack) -> Option<i64> {
    let element = stack.pop()?;
    if element.len() > MAX_NUM_SIZE {
        return None;
    }
    Some(decode_num(&element))
}

/// Run one opcode against the machine state.
///
/// `Ok(false)` fails the script. `Err` is reserved for opcodes this engine
/// does not implement.
pub(crate) fn execute(
    op: Opcode,
    stack: &mut Stack,
    altstack: &mut Stack,
    cmds: &mut VecDeque<Command>,
    z: &BigUint,
) -> Result<bool, ScriptError> {
    if let Some(n) = op.small_int() {
        stack.push(encode_num(n));
        return Ok(true);
    }

    let ok = match op {
        Opcode::OP_0 => {
            stack.push(Vec::new());
            true
        }
        Opcode::OP_1NEGATE => {
            stack.push(encode_num(-1));
            true
        }
        Opcode::OP_NOP => true,
        Opcode::OP_IF => op_if(stack, cmds, false),
        Opcode::OP_NOTIF => op_if(stack, cmds, true),
        // Reached only when unbalanced; a matched branch consumes them.
        Opcode::OP_ELSE | Opcode::OP_ENDIF => false,
        Opcode::OP_VERIFY => op_verify(stack),
        Opcode::OP_RETURN => false,
        Opcode::OP_TOALTSTACK => move_top(stack, altstack),
        Opcode::OP_FROMALTSTACK => move_top(altstack, stack),
        Opcode::OP_2DROP => op_2drop(stack),
        Opcode::OP_2DUP => dup_n(stack, 2),
        Opcode::OP_3DUP => dup_n(stack, 3),
        Opcode::OP_2OVER => op_2over(stack),
        Opcode::OP_2ROT => op_2rot(stack),
        Opcode::OP_2SWAP => op_2swap(stack),
        Opcode::OP_IFDUP => op_ifdup(stack),
        Opcode::OP_DEPTH => {
            let depth = stack.len() as i64;
            stack.push(encode_num(depth));
            true
        }
        Opcode::OP_DROP => stack.pop().is_some(),
        Opcode::OP_DUP => dup_n(stack, 1),
        Opcode::OP_NIP => op_nip(stack),
        Opcode::OP_OVER => op_over(stack),
        Opcode::OP_PICK => op_pick(stack, false),
        Opcode::OP_ROLL => op_pick(stack, true),
        Opcode::OP_ROT => op_rot(stack),
        Opcode::OP_SWAP => op_swap(stack),
        Opcode::OP_TUCK => op_tuck(stack),
        Opcode::OP_SIZE => op_size(stack),
        Opcode::OP_EQUAL => op_equal(stack),
        Opcode::OP_EQUALVERIFY => op_equal(stack) && op_verify(stack),
        Opcode::OP_1ADD => unary_num(stack, |a| a + 1),
        Opcode::OP_1SUB => unary_num(stack, |a| a - 1),
        Opcode::OP_NEGATE => unary_num(stack, |a| -a),
        Opcode::OP_ABS => unary_num(stack, i64::abs),
        Opcode::OP_NOT => unary_num(stack, |a| i64::from(a == 0)),
        Opcode::OP_0NOTEQUAL => unary_num(stack, |a| i64::from(a != 0)),
        Opcode::OP_ADD => binary_num(stack, |a, b| a + b),
        Opcode::OP_SUB => binary_num(stack, |a, b| a - b),
        Opcode::OP_MUL => binary_num(stack, |a, b| a * b),
        Opcode::OP_BOOLAND => binary_num(stack, |a, b| i64::from(a != 0 && b != 0)),
        Opcode::OP_BOOLOR => binary_num(stack, |a, b| i64::from(a != 0 || b != 0)),
        Opcode::OP_NUMEQUAL => binary_num(stack, |a, b| i64::from(a == b)),
        Opcode::OP_NUMEQUALVERIFY => {
            binary_num(stack, |a, b| i64::from(a == b)) && op_verify(stack)
        }
        Opcode::OP_NUMNOTEQUAL => binary_num(stack, |a, b| i64::from(a != b)),
        Opcode::OP_LESSTHAN => binary_num(stack, |a, b| i64::from(a < b)),
        Opcode::OP_GREATERTHAN => binary_num(stack, |a, b| i64::from(a > b)),
        Opcode::OP_LESSTHANOREQUAL => binary_num(stack, |a, b| i64::from(a <= b)),
        Opcode::OP_GREATERTHANOREQUAL => binary_num(stack, |a, b| i64::from(a >= b)),
        Opcode::OP_MIN => binary_num(stack, i64::min),
        Opcode::OP_MAX => binary_num(stack, i64::max),
        Opcode::OP_WITHIN => op_within(stack),
        Opcode::OP_RIPEMD160 => hash_top(stack, |data| ripemd160(data).to_vec()),
        Opcode::OP_SHA1 => hash_top(stack, |data| sha1(data).to_vec()),
        Opcode::OP_SHA256 => hash_top(stack, |data| sha256(data).to_vec()),
        Opcode::OP_HASH160 => hash_top(stack, |data| hash160(data).to_vec()),
        Opcode::OP_HASH256 => hash_top(stack, |data| hash256(data).to_vec()),
        Opcode::OP_CHECKSIG => op_checksig(stack, z),
        Opcode::OP_CHECKSIGVERIFY => op_checksig(stack, z) && op_verify(stack),
        Opcode::OP_CHECKMULTISIG => op_checkmultisig(stack, z),
        Opcode::OP_CHECKMULTISIGVERIFY => op_checkmultisig(stack, z) && op_verify(stack),
        Opcode::Unsupported(byte) => return Err(ScriptError::UnsupportedOpcode(byte)),
        // OP_1..OP_16 are handled above.
        _ => false,
    };
    Ok(ok)
}

// Flow control

/// Split the remaining commands at the matching ELSE/ENDIF and requeue the
/// branch selected by the popped condition.
fn op_if(stack: &mut Stack, cmds: &mut VecDeque<Command>, negate: bool) -> bool {
    if stack.is_empty() {
        return false;
    }

    let mut true_branch = Vec::new();
    let mut false_branch = Vec::new();
    let mut in_else = false;
    let mut depth = 1usize;
    let mut found = false;

    while let Some(cmd) = cmds.pop_front() {
        let target = if in_else { &mut false_branch } else { &mut true_branch };
        match cmd {
            Command::Op(Opcode::OP_IF | Opcode::OP_NOTIF) => {
                depth += 1;
                target.push(cmd);
            }
            Command::Op(Opcode::OP_ELSE) if depth == 1 => in_else = true,
            Command::Op(Opcode::OP_ENDIF) => {
                if depth == 1 {
                    found = true;
                    break;
                }
                depth -= 1;
                target.push(cmd);
            }
            other => target.push(other),
        }
    }

    if !found {
        return false;
    }

    let condition = stack.pop().is_some_and(|element| cast_to_bool(&element));
    let branch = if condition != negate { true_branch } else { false_branch };
    for cmd in branch.into_iter().rev() {
        cmds.push_front(cmd);
    }
    true
}

fn op_verify(stack: &mut Stack) -> bool {
    match stack.pop() {
        Some(element) => cast_to_bool(&element),
        None => false,
    }
}

// Stack manipulation

fn move_top(from: &mut Stack, to: &mut Stack) -> bool {
    match from.pop() {
        Some(element) => {
            to.push(element);
            true
        }
        None => false,
    }
}

fn op_2drop(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    stack.truncate(stack.len() - 2);
    true
}

/// Duplicate the top `n` elements, preserving order.
fn dup_n(stack: &mut Stack, n: usize) -> bool {
    if stack.len() < n {
        return false;
    }
    let start = stack.len() - n;
    stack.extend_from_within(start..);
    true
}

fn op_2over(stack: &mut Stack) -> bool {
    if stack.len() < 4 {
        return false;
    }
    let start = stack.len() - 4;
    stack.extend_from_within(start..start + 2);
    true
}

fn op_2rot(stack: &mut Stack) -> bool {
    if stack.len() < 6 {
        return false;
    }
    let start = stack.len() - 6;
    let moved: Vec<_> = stack.drain(start..start + 2).collect();
    stack.extend(moved);
    true
}

fn op_2swap(stack: &mut Stack) -> bool {
    if stack.len() < 4 {
        return false;
    }
    let start = stack.len() - 4;
    stack[start..].rotate_left(2);
    true
}

fn op_ifdup(stack: &mut Stack) -> bool {
    match stack.last() {
        Some(top) => {
            if cast_to_bool(top) {
                let top = top.clone();
                stack.push(top);
            }
            true
        }
        None => false,
    }
}

fn op_nip(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let index = stack.len() - 2;
    stack.remove(index);
    true
}

fn op_over(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let second = stack[stack.len() - 2].clone();
    stack.push(second);
    true
}

/// PICK copies, ROLL moves, the element `n` deep.
fn op_pick(stack: &mut Stack, remove: bool) -> bool {
    let n = match pop_num(stack) {
        Some(n) if n >= 0 => n as usize,
        _ => return false,
    };
    if stack.len() < n + 1 {
        return false;
    }
    let index = stack.len() - 1 - n;
    let element = if remove {
        stack.remove(index)
    } else {
        stack[index].clone()
    };
    stack.push(element);
    true
}

fn op_rot(stack: &mut Stack) -> bool {
    if stack.len() < 3 {
        return false;
    }
    let index = stack.len() - 3;
    let third = stack.remove(index);
    stack.push(third);
    true
}

fn op_swap(stack: &mut Stack) -> bool {
    let len = stack.len();
    if len < 2 {
        return false;
    }
    stack.swap(len - 1, len - 2);
    true
}

fn op_tuck(stack: &mut Stack) -> bool {
    let len = stack.len();
    if len < 2 {
        return false;
    }
    let top = stack[len - 1].clone();
    stack.insert(len - 2, top);
    true
}

fn op_size(stack: &mut Stack) -> bool {
    match stack.last() {
        Some(top) => {
            let size = top.len() as i64;
            stack.push(encode_num(size));
            true
        }
        None => false,
    }
}

// Comparison and arithmetic

fn op_equal(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let a = stack.pop();
    let b = stack.pop();
    push_bool(stack, a == b);
    true
}

fn unary_num(stack: &mut Stack, f: impl Fn(i64) -> i64) -> bool {
    match pop_num(stack) {
        Some(a) => {
            stack.push(encode_num(f(a)));
            true
        }
        None => false,
    }
}

/// Pops `b` then `a` and pushes `f(a, b)`.
fn binary_num(stack: &mut Stack, f: impl Fn(i64, i64) -> i64) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let (Some(b), Some(a)) = (pop_num(stack), pop_num(stack)) else {
        return false;
    };
    stack.push(encode_num(f(a, b)));
    true
}

fn op_within(stack: &mut Stack) -> bool {
    if stack.len() < 3 {
        return false;
    }
    let (Some(max), Some(min), Some(x)) = (pop_num(stack), pop_num(stack), pop_num(stack)) else {
        return false;
    };
    push_bool(stack, min <= x && x < max);
    true
}

// Crypto

fn hash_top(stack: &mut Stack, digest: impl Fn(&[u8]) -> Vec<u8>) -> bool {
    match stack.pop() {
        Some(element) => {
            stack.push(digest(&element));
            true
        }
        None => false,
    }
}

/// Check a `DER ‖ sighash-type` signature against a SEC key.
///
/// Malformed encodings and any sighash type other than ALL do not verify.
fn check_signature(sig: &[u8], sec: &[u8], z: &BigUint) -> bool {
    let Some((&hash_type, der)) = sig.split_last() else {
        return false;
    };
    if u32::from(hash_type) != SIGHASH_ALL {
        tracing::debug!(hash_type, "unsupported sighash type");
        return false;
    }
    let (Ok(point), Ok(signature)) = (S256Point::parse(sec), Signature::parse(der)) else {
        tracing::debug!("malformed signature or public key");
        return false;
    };
    point.verify(z, &signature)
}

fn op_checksig(stack: &mut Stack, z: &BigUint) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let (Some(sec), Some(sig)) = (stack.pop(), stack.pop()) else {
        return false;
    };
    push_bool(stack, check_signature(&sig, &sec, z));
    true
}

/// m-of-n CHECKMULTISIG, including the extra element popped by the
/// historical off-by-one.
fn op_checkmultisig(stack: &mut Stack, z: &BigUint) -> bool {
    let n = match pop_num(stack) {
        Some(n) if (0..=MAX_MULTISIG_KEYS).contains(&n) => n as usize,
        _ => return false,
    };
    if stack.len() < n + 1 {
        return false;
    }
    let secs = stack.split_off(stack.len() - n);

    let m = match pop_num(stack) {
        Some(m) if m >= 0 && m as usize <= n => m as usize,
        _ => return false,
    };
    if stack.len() < m + 1 {
        return false;
    }
    let sigs = stack.split_off(stack.len() - m);
    stack.pop();

    // Signatures must appear in the same order as their keys.
    let mut keys = secs.iter();
    let all_valid = sigs.iter().all(|sig| keys.any(|sec| check_signature(sig, sec, z)));
    push_bool(stack, all_valid);
    true
}
