//! Error types for signer-core operations.
//!
//! Parsing and decoding failures are errors. A signature or script that is
//! well-formed but does not check out is a plain `false`, never an error.

use thiserror::Error;

/// Top-level error type wrapping every per-concern error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Field or curve arithmetic failed.
    #[error("ecc error: {0}")]
    Ecc(#[from] EccError),
    /// DER signature decoding failed.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),
    /// Byte-level decoding failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
    /// Script parsing or serialization failed.
    #[error("script error: {0}")]
    Script(#[from] ScriptError),
    /// Transaction-level operation failed.
    #[error("transaction error: {0}")]
    Tx(#[from] TxError),
}

/// Errors from prime-field and elliptic-curve arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EccError {
    /// Field value is not in `[0, prime)`.
    #[error("value is outside of the field range [0, prime)")]
    OutOfRange,
    /// Operands belong to different fields.
    #[error("cannot combine elements from different fields")]
    FieldMismatch,
    /// Points lie on different curves.
    #[error("points are not on the same curve")]
    CurveMismatch,
    /// Coordinates do not satisfy the curve equation.
    #[error("point is not on the curve")]
    NotOnCurve,
    /// Inverse of zero was requested.
    #[error("division by zero")]
    DivisionByZero,
    /// Secret scalar is not in `[1, N-1]`.
    #[error("secret key is outside [1, N-1]")]
    InvalidSecretKey,
    /// SEC public key bytes are malformed.
    #[error("invalid SEC public key encoding")]
    InvalidSec,
}

/// Errors from DER signature decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The DER structure is violated; the message names the violation.
    #[error("malformed signature: {0}")]
    Malformed(&'static str),
}

/// Errors from the byte-level codecs (varint, base58, bech32).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Input ended before the value was complete.
    #[error("unexpected end of input")]
    UnexpectedEnd,
    /// Character outside the base58 alphabet.
    #[error("invalid base58 character: {0}")]
    InvalidBase58Char(char),
    /// Checksum does not match the payload.
    #[error("invalid checksum")]
    InvalidChecksum,
    /// Decoded payload has the wrong length.
    #[error("invalid length: {0}")]
    InvalidLength(usize),
    /// Bech32 string is malformed.
    #[error("invalid bech32 encoding: {0}")]
    InvalidBech32(&'static str),
    /// Version byte or HRP does not belong to a known network.
    #[error("unknown version prefix: {0:#04x}")]
    UnknownVersion(u8),
    /// Encoded for a different network than expected.
    #[error("network mismatch: expected {expected}, got {got}")]
    NetworkMismatch {
        /// Network the caller asked for.
        expected: &'static str,
        /// Network the data encodes.
        got: &'static str,
    },
    /// Hex text could not be decoded.
    #[error("invalid hex")]
    InvalidHex,
    /// Segwit marker followed by a flag other than `0x01`.
    #[error("invalid segwit flag: {0:#04x}")]
    InvalidSegwitFlag(u8),
}

/// Errors from script parsing, serialization and evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// Bytes consumed by the commands disagree with the declared length.
    #[error("script parsing failed: declared {declared} bytes, consumed {consumed}")]
    LengthMismatch {
        /// Length prefix read from the stream.
        declared: u64,
        /// Bytes actually consumed.
        consumed: u64,
    },
    /// Data push longer than 520 bytes.
    #[error("command is too long: {0} bytes")]
    PushTooLong(usize),
    /// Opcode outside the supported table.
    #[error("unsupported opcode: {0:#04x}")]
    UnsupportedOpcode(u8),
    /// Script matches no known output template.
    #[error("unknown script pattern")]
    UnknownPattern,
    /// Underlying byte decoding failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Errors from transaction parsing, signing and verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    /// Input index is past the end of the input list.
    #[error("input index {0} out of range")]
    InputOutOfRange(usize),
    /// Previous output index is past the end of the output list.
    #[error("output index {0} out of range")]
    OutputOutOfRange(u32),
    /// Previous transaction is not available from the lookup.
    #[error("previous transaction {0} not found")]
    MissingPrevTx(alloc::string::String),
    /// Computed transaction id disagrees with the expected id.
    #[error("different ids: {computed} != {expected}")]
    IdMismatch {
        /// Id computed from the bytes.
        computed: alloc::string::String,
        /// Id the caller supplied.
        expected: alloc::string::String,
    },
    /// P2SH input has no redeem script in its scriptSig.
    #[error("p2sh input has no redeem script")]
    NoRedeemScript,
    /// Witness input has no witness script.
    #[error("witness input has no witness script")]
    NoWitnessScript,
    /// Input or output amounts sum outside the representable range.
    #[error("amount overflow")]
    AmountOverflow,
    /// Cache file content is not valid JSON.
    #[error("invalid cache json")]
    InvalidCache,
    /// Cache file could not be read or written.
    #[error("cache i/o failed")]
    CacheIo,
    /// Underlying byte decoding failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// Script parsing failed.
    #[error(transparent)]
    Script(#[from] ScriptError),
    /// Key or curve arithmetic failed.
    #[error(transparent)]
    Ecc(#[from] EccError),
    /// DER signature decoding failed.
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
