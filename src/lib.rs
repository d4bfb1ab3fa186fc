//! # UTXO Primitives
//!
//! Cryptographic and wire-format building blocks of a UTXO ledger: prime-field
//! and elliptic-curve arithmetic, secp256k1 ECDSA with deterministic nonces,
//! the DER, SEC, Base58Check and varint encodings, a script VM with
//! pay-to-script-hash support, and the transaction model.
//!
//! ## Architecture
//!
//! Each layer only depends on the ones listed before it:
//! - `field`, `curve`: generic arithmetic, parameterized by value
//! - `s256`: the secp256k1 parameters
//! - `signature`, `keys`: ECDSA, DER and SEC
//! - `codec`: hashing, Base58Check, varints
//! - `op`, `script`: the opcode table and the VM that dispatches through it
//! - `transaction`: wire format, signature hashing, signing and verification
//!
//! ## Design Principles
//!
//! 1. **Immutable values**: arithmetic returns new values and never mutates operands
//! 2. **Deterministic signing**: RFC 6979 nonces, no randomness source
//! 3. **Rejection is not an error**: a failing script yields an [`EvalResult`], malformed input yields an `Err`
//! 4. **Exact Version Pinning**: hashing dependencies pinned to exact versions
//!
//! ## Usage
//!
//! ```rust
//! use num_bigint::BigUint;
//! use utxo_primitives::codec::hash160;
//! use utxo_primitives::script::{p2pkh_script, Command, Script};
//! use utxo_primitives::PrivateKey;
//!
//! let key = PrivateKey::new(BigUint::from(8675309u32)).unwrap();
//! let z = BigUint::from(1234u32);
//!
//! let mut sig = key.sign(&z).unwrap().der();
//! sig.push(0x01);
//! let sec = key.public_key().sec(true);
//!
//! let script_sig = Script::new(vec![Command::Data(sig), Command::Data(sec.clone())]);
//! let result = (script_sig + p2pkh_script(&hash160(&sec))).evaluate(&z);
//! assert!(result.is_valid());
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod codec;
pub mod field;
pub mod curve;
pub mod s256;
pub mod signature;
pub mod keys;
pub mod op;
pub mod script;
pub mod transaction;

// Re-export commonly used types
pub use types::*;
pub use error::{PrimitiveError, Result};
pub use field::FieldElement;
pub use curve::CurvePoint;
pub use s256::{Secp256k1, SECP256K1};
pub use signature::Signature;
pub use keys::{PrivateKey, PublicKey};
pub use op::{OpcodeTable, Operation, StandardOpcodes};
pub use script::{Command, EvalResult, Script, ScriptFailure};
pub use transaction::{MemoryStore, Transaction, TransactionStore, TxIn, TxOut};
