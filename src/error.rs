//! Error types for the primitive layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrimitiveError {
    #[error("Field element {num} not in range 0 to {prime} (exclusive)")]
    FieldRange { num: String, prime: String },

    #[error("Invalid field operation: {0}")]
    InvalidFieldOperation(String),

    #[error("Point ({x}, {y}) is not on the curve")]
    PointNotOnCurve { x: String, y: String },

    #[error("Points are not on the same curve: {0}")]
    CurveMismatch(String),

    #[error("Secret out of range [1, N-1]")]
    InvalidSecret,

    #[error("Varint overflow: {0} does not fit in 8 bytes")]
    VarintOverflow(u128),

    #[error("Script parse failed: {0}")]
    ScriptParse(String),

    #[error("Script push too long: {0} bytes")]
    ScriptTooLong(usize),

    #[error("Bad signature encoding: {0}")]
    SignatureFormat(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Base58 decoding failed: {0}")]
    Base58(String),

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Input index {index} out of range for {len} inputs")]
    InputIndex { index: usize, len: usize },

    #[error("Output {index} of transaction {tx_id} does not exist ({len} outputs)")]
    OutputIndex { tx_id: String, index: u32, len: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PrimitiveError>;
